use std::collections::HashMap;

use anyhow::Result;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::notifications::{NewNotification, NotificationService};
use crate::app::shoutouts::preview;
use crate::app::users::map_user_summary_prefixed;
use crate::domain::engagement::{CommentView, ReactionSummary, REACTION_KINDS};
use crate::domain::moderation::CommentReport;
use crate::domain::user::{User, UserSummary};
use crate::infra::db::Db;

#[derive(Debug)]
pub enum CreateCommentOutcome {
    ShoutoutNotFound,
    Created(Box<CommentView>),
}

#[derive(Debug)]
pub enum AddReactionOutcome {
    ShoutoutNotFound,
    /// Same kind already present; nothing changed and nobody is notified.
    NoOp,
    /// A different kind existed and was overwritten.
    Replaced,
    Added,
}

#[derive(Debug)]
pub enum ReportCommentOutcome {
    CommentNotFound,
    OwnComment,
    AlreadyReported,
    Reported(CommentReport),
}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Add a comment. Mentions come from the explicit id list when given,
    /// otherwise from `@[display](uuid)` markup in the content. Notifies
    /// the shoutout sender, the other tagged recipients, and every
    /// mentioned user, never the comment author.
    pub async fn create_comment(
        &self,
        author: &User,
        shoutout_id: Uuid,
        content: &str,
        explicit_mentions: Option<Vec<Uuid>>,
    ) -> Result<CreateCommentOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let sender_id: Option<Uuid> =
            sqlx::query_scalar("SELECT sender_id FROM shoutouts WHERE id = $1")
                .bind(shoutout_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(sender_id) = sender_id else {
            return Ok(CreateCommentOutcome::ShoutoutNotFound);
        };

        let comment_id: Uuid = sqlx::query_scalar(
            "INSERT INTO comments (shoutout_id, user_id, content) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(shoutout_id)
        .bind(author.id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        let candidate_ids = match explicit_mentions {
            Some(ids) if !ids.is_empty() => ids,
            _ => parse_mention_markup(content),
        };
        let mentioned_ids: Vec<Uuid> = if candidate_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1)")
                .bind(&candidate_ids)
                .fetch_all(&mut *tx)
                .await?
        };
        for user_id in &mentioned_ids {
            sqlx::query(
                "INSERT INTO comment_mentions (comment_id, user_id) \
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        let content_preview = preview(content);
        let payload = json!({
            "shoutout_id": shoutout_id,
            "comment_id": comment_id,
            "redirect_url": "/feed",
        });

        if sender_id != author.id {
            NotificationService::create_with_tx(
                &mut tx,
                NewNotification {
                    user_id: sender_id,
                    actor_id: Some(author.id),
                    event_type: "comment.new".to_string(),
                    title: format!("{} commented on your shoutout", author.name),
                    message: Some(content_preview.clone()),
                    reference_type: Some("comment".to_string()),
                    reference_id: Some(comment_id),
                    payload: Some(payload.clone()),
                },
            )
            .await?;
        }

        let recipient_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT recipient_id FROM shoutout_recipients WHERE shoutout_id = $1",
        )
        .bind(shoutout_id)
        .fetch_all(&mut *tx)
        .await?;
        let mut already_notified = vec![author.id, sender_id];
        for recipient_id in recipient_ids {
            if already_notified.contains(&recipient_id) {
                continue;
            }
            NotificationService::create_with_tx(
                &mut tx,
                NewNotification {
                    user_id: recipient_id,
                    actor_id: Some(author.id),
                    event_type: "comment.new".to_string(),
                    title: "New comment on a shoutout you're tagged in".to_string(),
                    message: Some(content_preview.clone()),
                    reference_type: Some("comment".to_string()),
                    reference_id: Some(comment_id),
                    payload: Some(payload.clone()),
                },
            )
            .await?;
            already_notified.push(recipient_id);
        }

        for user_id in &mentioned_ids {
            if *user_id == author.id {
                continue;
            }
            NotificationService::create_with_tx(
                &mut tx,
                NewNotification {
                    user_id: *user_id,
                    actor_id: Some(author.id),
                    event_type: "comment.mention".to_string(),
                    title: format!("{} mentioned you in a comment", author.name),
                    message: Some(content_preview.clone()),
                    reference_type: Some("comment".to_string()),
                    reference_id: Some(comment_id),
                    payload: Some(payload.clone()),
                },
            )
            .await?;
        }

        tx.commit().await?;

        let view = self
            .get_comment_view(comment_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("comment vanished after insert"))?;
        Ok(CreateCommentOutcome::Created(Box::new(view)))
    }

    pub async fn list_comments(&self, shoutout_id: Uuid) -> Result<Vec<CommentView>> {
        let rows = sqlx::query(
            "SELECT c.id FROM comments c WHERE c.shoutout_id = $1 ORDER BY c.created_at ASC",
        )
        .bind(shoutout_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            if let Some(view) = self.get_comment_view(id).await? {
                comments.push(view);
            }
        }
        Ok(comments)
    }

    pub async fn get_comment_view(&self, comment_id: Uuid) -> Result<Option<CommentView>> {
        let row = sqlx::query(
            "SELECT c.id, c.shoutout_id, c.user_id, c.content, c.created_at, c.updated_at, \
                    u.id AS a_id, u.name AS a_name, u.email AS a_email, \
                    u.department AS a_department, u.avatar_url AS a_avatar_url \
             FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.id = $1",
        )
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mention_rows = sqlx::query(
            "SELECT u.id AS m_id, u.name AS m_name, u.email AS m_email, \
                    u.department AS m_department, u.avatar_url AS m_avatar_url \
             FROM comment_mentions cm JOIN users u ON u.id = cm.user_id \
             WHERE cm.comment_id = $1 \
             ORDER BY u.name ASC",
        )
        .bind(comment_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(Some(CommentView {
            id: row.get("id"),
            shoutout_id: row.get("shoutout_id"),
            user_id: row.get("user_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            user: map_user_summary_prefixed(&row, "a_"),
            mentions: mention_rows
                .iter()
                .map(|row| map_user_summary_prefixed(row, "m_"))
                .collect(),
        }))
    }

    pub async fn get_comment_author(&self, comment_id: Uuid) -> Result<Option<(Uuid, Uuid)>> {
        let row = sqlx::query("SELECT user_id, shoutout_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|row| (row.get("user_id"), row.get("shoutout_id"))))
    }

    pub async fn update_comment(&self, comment_id: Uuid, content: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE comments SET content = $1, updated_at = now() WHERE id = $2")
                .bind(content)
                .bind(comment_id)
                .execute(self.db.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// File a comment report. One report per (comment, reporter); the
    /// unique constraint backs the duplicate check.
    pub async fn report_comment(
        &self,
        reporter: &User,
        comment_id: Uuid,
        reason: &str,
    ) -> Result<ReportCommentOutcome> {
        let comment = sqlx::query("SELECT user_id, shoutout_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?;
        let Some(comment) = comment else {
            return Ok(ReportCommentOutcome::CommentNotFound);
        };
        let author_id: Uuid = comment.get("user_id");
        if author_id == reporter.id {
            return Ok(ReportCommentOutcome::OwnComment);
        }
        let shoutout_id: Uuid = comment.get("shoutout_id");

        let row = sqlx::query(
            "INSERT INTO comment_reports (comment_id, shoutout_id, reported_by, reason, status) \
             VALUES ($1, $2, $3, $4, 'pending') \
             ON CONFLICT (comment_id, reported_by) DO NOTHING \
             RETURNING id, comment_id, shoutout_id, reported_by, reason, status, created_at",
        )
        .bind(comment_id)
        .bind(shoutout_id)
        .bind(reporter.id)
        .bind(reason.trim())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(ReportCommentOutcome::Reported(map_comment_report(&row))),
            None => Ok(ReportCommentOutcome::AlreadyReported),
        }
    }

    /// Reaction upsert: first reaction inserts and notifies, a different
    /// kind overwrites the existing row, the same kind again is a no-op.
    pub async fn add_reaction(
        &self,
        user: &User,
        shoutout_id: Uuid,
        kind: &str,
    ) -> Result<AddReactionOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let sender_id: Option<Uuid> =
            sqlx::query_scalar("SELECT sender_id FROM shoutouts WHERE id = $1")
                .bind(shoutout_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(sender_id) = sender_id else {
            return Ok(AddReactionOutcome::ShoutoutNotFound);
        };

        let existing = sqlx::query(
            "SELECT id, kind FROM reactions WHERE shoutout_id = $1 AND user_id = $2",
        )
        .bind(shoutout_id)
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            let existing_kind: String = existing.get("kind");
            if existing_kind == kind {
                return Ok(AddReactionOutcome::NoOp);
            }
            sqlx::query("UPDATE reactions SET kind = $1 WHERE id = $2")
                .bind(kind)
                .bind(existing.get::<Uuid, _>("id"))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(AddReactionOutcome::Replaced);
        }

        sqlx::query(
            "INSERT INTO reactions (shoutout_id, user_id, kind) VALUES ($1, $2, $3)",
        )
        .bind(shoutout_id)
        .bind(user.id)
        .bind(kind)
        .execute(&mut *tx)
        .await?;

        let mut to_notify = Vec::new();
        if sender_id != user.id {
            to_notify.push(sender_id);
        }
        let recipient_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT recipient_id FROM shoutout_recipients WHERE shoutout_id = $1",
        )
        .bind(shoutout_id)
        .fetch_all(&mut *tx)
        .await?;
        for recipient_id in recipient_ids {
            if recipient_id != user.id && !to_notify.contains(&recipient_id) {
                to_notify.push(recipient_id);
            }
        }

        let mut kind_label: String = kind.to_string();
        if let Some(first) = kind_label.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        for user_id in to_notify {
            NotificationService::create_with_tx(
                &mut tx,
                NewNotification {
                    user_id,
                    actor_id: Some(user.id),
                    event_type: "reaction.new".to_string(),
                    title: format!("{} reacted to a shoutout", user.name),
                    message: Some(format!("Reaction: {}", kind_label)),
                    reference_type: Some("shoutout".to_string()),
                    reference_id: Some(shoutout_id),
                    payload: Some(json!({
                        "shoutout_id": shoutout_id,
                        "redirect_url": "/feed",
                    })),
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(AddReactionOutcome::Added)
    }

    pub async fn remove_reaction(
        &self,
        user_id: Uuid,
        shoutout_id: Uuid,
        kind: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM reactions WHERE shoutout_id = $1 AND user_id = $2 AND kind = $3",
        )
        .bind(shoutout_id)
        .bind(user_id)
        .bind(kind)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Counts for every kind plus the reacting users, optionally narrowed
    /// to one kind. None when the shoutout does not exist.
    pub async fn reaction_summary(
        &self,
        shoutout_id: Uuid,
        kind_filter: Option<&str>,
    ) -> Result<Option<ReactionSummary>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shoutouts WHERE id = $1)")
                .bind(shoutout_id)
                .fetch_one(self.db.pool())
                .await?;
        if !exists {
            return Ok(None);
        }

        let count_rows = sqlx::query(
            "SELECT kind, COUNT(*) AS count FROM reactions WHERE shoutout_id = $1 GROUP BY kind",
        )
        .bind(shoutout_id)
        .fetch_all(self.db.pool())
        .await?;
        let mut counts = HashMap::new();
        for row in count_rows {
            counts.insert(row.get::<String, _>("kind"), row.get::<i64, _>("count"));
        }

        let kinds: Vec<&str> = match kind_filter {
            Some(kind) => vec![kind],
            None => REACTION_KINDS.to_vec(),
        };

        let mut users: HashMap<String, Vec<UserSummary>> = HashMap::new();
        for kind in kinds {
            let rows = sqlx::query(
                "SELECT u.id AS u_id, u.name AS u_name, u.email AS u_email, \
                        u.department AS u_department, u.avatar_url AS u_avatar_url \
                 FROM reactions r JOIN users u ON u.id = r.user_id \
                 WHERE r.shoutout_id = $1 AND r.kind = $2 \
                 ORDER BY u.name ASC",
            )
            .bind(shoutout_id)
            .bind(kind)
            .fetch_all(self.db.pool())
            .await?;
            users.insert(
                kind.to_string(),
                rows.iter()
                    .map(|row| map_user_summary_prefixed(row, "u_"))
                    .collect(),
            );
        }

        Ok(Some(ReactionSummary {
            shoutout_id,
            counts,
            users,
        }))
    }
}

/// Extract mention ids from `@[display](uuid)` markup.
fn parse_mention_markup(content: &str) -> Vec<Uuid> {
    let mut ids = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("@[") {
        rest = &rest[start + 2..];
        let Some(close) = rest.find("](") else {
            break;
        };
        let after = &rest[close + 2..];
        let Some(end) = after.find(')') else {
            break;
        };
        if let Ok(id) = Uuid::parse_str(&after[..end]) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        rest = &after[end + 1..];
    }
    ids
}

pub(crate) fn map_comment_report(row: &PgRow) -> CommentReport {
    CommentReport {
        id: row.get("id"),
        comment_id: row.get("comment_id"),
        shoutout_id: row.get("shoutout_id"),
        reported_by: row.get("reported_by"),
        reason: row.get("reason"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        comment_content: None,
        comment_author: None,
        reporter: None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_mention_markup;
    use uuid::Uuid;

    #[test]
    fn parses_mention_markup_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let content = format!("hey @[Ana]({a}) and @[Bo]({b})!");
        assert_eq!(parse_mention_markup(&content), vec![a, b]);
    }

    #[test]
    fn ignores_malformed_markup() {
        assert!(parse_mention_markup("@[Ana](not-a-uuid) plain @text").is_empty());
        assert!(parse_mention_markup("no mentions here").is_empty());
    }

    #[test]
    fn dedupes_repeated_mentions() {
        let a = Uuid::new_v4();
        let content = format!("@[Ana]({a}) again @[Ana]({a})");
        assert_eq!(parse_mention_markup(&content), vec![a]);
    }
}

use std::collections::HashMap;

use anyhow::Result;
use serde_json::json;
use sqlx::{QueryBuilder, Row};
use time::Date;
use uuid::Uuid;

use crate::app::notifications::{NewNotification, NotificationService};
use crate::app::users::map_user_summary_prefixed;
use crate::domain::shoutout::{Attachment, ShoutoutView};
use crate::domain::user::{User, UserSummary};
use crate::infra::db::Db;

/// Attachment metadata for a file already written under uploads/.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub url: String,
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Default)]
pub struct ShoutoutFilters {
    pub skip: i64,
    pub limit: i64,
    pub department: Option<String>,
    pub sender_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub all_departments: bool,
}

#[derive(Debug)]
pub enum CreateShoutoutOutcome {
    Created(Box<ShoutoutView>),
    RecipientNotFound(Uuid),
    SelfRecipient,
    DepartmentMismatch,
}

#[derive(Clone)]
pub struct ShoutoutService {
    db: Db,
}

impl ShoutoutService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a shoutout with its recipients and attachments, notifying
    /// every tagged recipient. Recipients must exist, differ from the
    /// sender, and share the sender's department.
    pub async fn create(
        &self,
        sender: &User,
        message: &str,
        recipient_ids: &[Uuid],
        attachments: &[NewAttachment],
    ) -> Result<CreateShoutoutOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let shoutout_id: Uuid = sqlx::query_scalar(
            "INSERT INTO shoutouts (sender_id, message) VALUES ($1, $2) RETURNING id",
        )
        .bind(sender.id)
        .bind(message)
        .fetch_one(&mut *tx)
        .await?;

        let mut notified = Vec::new();
        for recipient_id in recipient_ids {
            let row = sqlx::query("SELECT id, name, department FROM users WHERE id = $1")
                .bind(recipient_id)
                .fetch_optional(&mut *tx)
                .await?;
            let Some(row) = row else {
                return Ok(CreateShoutoutOutcome::RecipientNotFound(*recipient_id));
            };
            if *recipient_id == sender.id {
                return Ok(CreateShoutoutOutcome::SelfRecipient);
            }
            let department: Option<String> = row.get("department");
            if department != sender.department {
                return Ok(CreateShoutoutOutcome::DepartmentMismatch);
            }

            sqlx::query(
                "INSERT INTO shoutout_recipients (shoutout_id, recipient_id) \
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(shoutout_id)
            .bind(recipient_id)
            .execute(&mut *tx)
            .await?;

            if !notified.contains(recipient_id) {
                notified.push(*recipient_id);
            }
        }

        for attachment in attachments {
            sqlx::query(
                "INSERT INTO shoutout_attachments (shoutout_id, url, name, content_type, size) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(shoutout_id)
            .bind(&attachment.url)
            .bind(&attachment.name)
            .bind(&attachment.content_type)
            .bind(attachment.size)
            .execute(&mut *tx)
            .await?;
        }

        let message_preview = preview(message);
        for recipient_id in notified {
            NotificationService::create_with_tx(
                &mut tx,
                NewNotification {
                    user_id: recipient_id,
                    actor_id: Some(sender.id),
                    event_type: "shoutout.received".to_string(),
                    title: format!("{} recognized you", sender.name),
                    message: Some(message_preview.clone()),
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

        let view = self
            .get_view(shoutout_id, sender.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("shoutout vanished after insert"))?;
        Ok(CreateShoutoutOutcome::Created(Box::new(view)))
    }

    /// Feed query. Without `all_departments` the feed is scoped to
    /// shoutouts whose recipients sit in the viewer's department.
    pub async fn list(&self, viewer: &User, filters: &ShoutoutFilters) -> Result<Vec<ShoutoutView>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT DISTINCT s.id, s.created_at FROM shoutouts s");

        if !filters.all_departments {
            builder.push(
                " JOIN shoutout_recipients sr ON sr.shoutout_id = s.id \
                  JOIN users ru ON ru.id = sr.recipient_id",
            );
        } else if filters.recipient_id.is_some() {
            builder.push(" JOIN shoutout_recipients sr ON sr.shoutout_id = s.id");
        }
        if filters.department.is_some() {
            builder.push(" JOIN users su ON su.id = s.sender_id");
        }

        builder.push(" WHERE TRUE");
        if !filters.all_departments {
            builder.push(" AND ru.department IS NOT DISTINCT FROM ");
            builder.push_bind(viewer.department.clone());
        }
        if let Some(department) = &filters.department {
            builder.push(" AND su.department = ");
            builder.push_bind(department.clone());
        }
        if let Some(recipient_id) = filters.recipient_id {
            builder.push(" AND sr.recipient_id = ");
            builder.push_bind(recipient_id);
        }
        if let Some(sender_id) = filters.sender_id {
            builder.push(" AND s.sender_id = ");
            builder.push_bind(sender_id);
        }
        if let Some(start_date) = filters.start_date {
            builder.push(" AND s.created_at::date >= ");
            builder.push_bind(start_date);
        }
        if let Some(end_date) = filters.end_date {
            builder.push(" AND s.created_at::date <= ");
            builder.push_bind(end_date);
        }

        builder.push(" ORDER BY s.created_at DESC OFFSET ");
        builder.push_bind(filters.skip);
        builder.push(" LIMIT ");
        builder.push_bind(filters.limit);

        let rows = builder.build().fetch_all(self.db.pool()).await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            if let Some(view) = self.get_view(id, viewer.id).await? {
                views.push(view);
            }
        }
        Ok(views)
    }

    /// Assemble the full feed view for one shoutout: sender, recipients,
    /// reaction rollup, the viewer's reactions, comment count, attachments.
    pub async fn get_view(&self, shoutout_id: Uuid, viewer_id: Uuid) -> Result<Option<ShoutoutView>> {
        let row = sqlx::query(
            "SELECT s.id, s.sender_id, s.message, s.created_at, s.updated_at, \
                    u.id AS sender_user_id, u.name AS sender_name, u.email AS sender_email, \
                    u.department AS sender_department, u.avatar_url AS sender_avatar_url \
             FROM shoutouts s JOIN users u ON u.id = s.sender_id \
             WHERE s.id = $1",
        )
        .bind(shoutout_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sender = UserSummary {
            id: row.get("sender_user_id"),
            name: row.get("sender_name"),
            email: row.get("sender_email"),
            department: row.get("sender_department"),
            avatar_url: row.get("sender_avatar_url"),
        };

        let recipient_rows = sqlx::query(
            "SELECT u.id AS r_id, u.name AS r_name, u.email AS r_email, \
                    u.department AS r_department, u.avatar_url AS r_avatar_url \
             FROM shoutout_recipients sr JOIN users u ON u.id = sr.recipient_id \
             WHERE sr.shoutout_id = $1 \
             ORDER BY sr.created_at ASC",
        )
        .bind(shoutout_id)
        .fetch_all(self.db.pool())
        .await?;
        let recipients = recipient_rows
            .iter()
            .map(|row| map_user_summary_prefixed(row, "r_"))
            .collect();

        let count_rows = sqlx::query(
            "SELECT kind, COUNT(*) AS count FROM reactions WHERE shoutout_id = $1 GROUP BY kind",
        )
        .bind(shoutout_id)
        .fetch_all(self.db.pool())
        .await?;
        let mut reaction_counts = HashMap::new();
        for row in count_rows {
            reaction_counts.insert(row.get::<String, _>("kind"), row.get::<i64, _>("count"));
        }

        let user_reactions: Vec<String> = sqlx::query_scalar(
            "SELECT kind FROM reactions WHERE shoutout_id = $1 AND user_id = $2",
        )
        .bind(shoutout_id)
        .bind(viewer_id)
        .fetch_all(self.db.pool())
        .await?;

        let comment_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE shoutout_id = $1")
                .bind(shoutout_id)
                .fetch_one(self.db.pool())
                .await?;

        let attachment_rows = sqlx::query(
            "SELECT url, name, content_type, size FROM shoutout_attachments \
             WHERE shoutout_id = $1 ORDER BY created_at ASC",
        )
        .bind(shoutout_id)
        .fetch_all(self.db.pool())
        .await?;
        let attachments = attachment_rows
            .iter()
            .map(|row| Attachment {
                url: row.get("url"),
                name: row.get("name"),
                content_type: row.get("content_type"),
                size: row.get("size"),
            })
            .collect();

        Ok(Some(ShoutoutView {
            id: row.get("id"),
            sender_id: row.get("sender_id"),
            message: row.get("message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            sender,
            recipients,
            reaction_counts,
            comment_count,
            user_reactions,
            attachments,
        }))
    }

    pub async fn get_sender(&self, shoutout_id: Uuid) -> Result<Option<Uuid>> {
        let sender_id: Option<Uuid> =
            sqlx::query_scalar("SELECT sender_id FROM shoutouts WHERE id = $1")
                .bind(shoutout_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(sender_id)
    }

    /// True when at least one recipient of the shoutout belongs to the
    /// given department.
    pub async fn has_department_access(
        &self,
        shoutout_id: Uuid,
        department: Option<&str>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                 SELECT 1 FROM shoutout_recipients sr \
                 JOIN users u ON u.id = sr.recipient_id \
                 WHERE sr.shoutout_id = $1 AND u.department IS NOT DISTINCT FROM $2)",
        )
        .bind(shoutout_id)
        .bind(department)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    pub async fn update_message(&self, shoutout_id: Uuid, message: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE shoutouts SET message = $1, updated_at = now() WHERE id = $2",
        )
        .bind(message)
        .bind(shoutout_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a shoutout. Comments, reactions, reports, and attachment
    /// rows go with it via FK cascades; the attachment URLs are returned
    /// so the caller can unlink the files.
    pub async fn delete(&self, shoutout_id: Uuid) -> Result<Option<Vec<String>>> {
        let mut tx = self.db.pool().begin().await?;

        let urls: Vec<String> =
            sqlx::query_scalar("SELECT url FROM shoutout_attachments WHERE shoutout_id = $1")
                .bind(shoutout_id)
                .fetch_all(&mut *tx)
                .await?;

        let result = sqlx::query("DELETE FROM shoutouts WHERE id = $1")
            .bind(shoutout_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(urls))
    }
}

/// 160-character notification preview with a trailing ellipsis.
pub(crate) fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 160 {
        let head: String = trimmed.chars().take(157).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::moderation::{AdminLogEntry, CommentReport, Report};
use crate::domain::user::UserSummary;
use crate::infra::db::Db;

#[derive(Debug)]
pub enum ResolveOutcome {
    NotFound,
    AlreadyProcessed,
    Resolved,
}

#[derive(Clone)]
pub struct ModerationService {
    db: Db,
}

impl ModerationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// File a report against a shoutout. None when the shoutout is gone.
    pub async fn report_shoutout(
        &self,
        reporter_id: Uuid,
        shoutout_id: Uuid,
        reason: &str,
    ) -> Result<Option<Report>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shoutouts WHERE id = $1)")
                .bind(shoutout_id)
                .fetch_one(self.db.pool())
                .await?;
        if !exists {
            return Ok(None);
        }

        let row = sqlx::query(
            "INSERT INTO reports (shoutout_id, reported_by, reason, status) \
             VALUES ($1, $2, $3, 'pending') \
             RETURNING id, shoutout_id, reported_by, reason, status, created_at",
        )
        .bind(shoutout_id)
        .bind(reporter_id)
        .bind(reason)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Some(map_report(&row)))
    }

    pub async fn list_reports(&self, status: Option<&str>) -> Result<Vec<Report>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT id, shoutout_id, reported_by, reason, status, created_at \
                     FROM reports WHERE status = $1 ORDER BY created_at DESC",
                )
                .bind(status)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, shoutout_id, reported_by, reason, status, created_at \
                     FROM reports ORDER BY created_at DESC",
                )
                .fetch_all(self.db.pool())
                .await?
            }
        };
        Ok(rows.iter().map(map_report).collect())
    }

    pub async fn list_comment_reports(&self, status: Option<&str>) -> Result<Vec<CommentReport>> {
        let base = "SELECT cr.id, cr.comment_id, cr.shoutout_id, cr.reported_by, cr.reason, \
                           cr.status, cr.created_at, \
                           c.content AS comment_content, \
                           ca.id AS ca_id, ca.name AS ca_name, ca.email AS ca_email, \
                           ca.department AS ca_department, ca.avatar_url AS ca_avatar_url, \
                           rp.id AS rp_id, rp.name AS rp_name, rp.email AS rp_email, \
                           rp.department AS rp_department, rp.avatar_url AS rp_avatar_url \
                    FROM comment_reports cr \
                    LEFT JOIN comments c ON c.id = cr.comment_id \
                    LEFT JOIN users ca ON ca.id = c.user_id \
                    LEFT JOIN users rp ON rp.id = cr.reported_by";

        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "{base} WHERE cr.status = $1 ORDER BY cr.created_at DESC"
                ))
                .bind(status)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!("{base} ORDER BY cr.created_at DESC"))
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        Ok(rows.iter().map(map_comment_report_row).collect())
    }

    /// Resolve a shoutout report. Pending reports only; a decided report
    /// stays decided.
    pub async fn resolve_report(
        &self,
        admin_id: Uuid,
        report_id: Uuid,
        action: &str,
    ) -> Result<ResolveOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM reports WHERE id = $1")
                .bind(report_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(status) = status else {
            return Ok(ResolveOutcome::NotFound);
        };
        if status != "pending" {
            return Ok(ResolveOutcome::AlreadyProcessed);
        }

        sqlx::query("UPDATE reports SET status = $1 WHERE id = $2")
            .bind(action)
            .bind(report_id)
            .execute(&mut *tx)
            .await?;

        log_action_with_tx(
            &mut tx,
            admin_id,
            &format!("Resolved report {} with action: {}", report_id, action),
            Some(report_id),
            Some("report"),
        )
        .await?;

        tx.commit().await?;
        Ok(ResolveOutcome::Resolved)
    }

    pub async fn resolve_comment_report(
        &self,
        admin_id: Uuid,
        report_id: Uuid,
        action: &str,
    ) -> Result<ResolveOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM comment_reports WHERE id = $1")
                .bind(report_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(status) = status else {
            return Ok(ResolveOutcome::NotFound);
        };
        if status != "pending" {
            return Ok(ResolveOutcome::AlreadyProcessed);
        }

        sqlx::query("UPDATE comment_reports SET status = $1 WHERE id = $2")
            .bind(action)
            .bind(report_id)
            .execute(&mut *tx)
            .await?;

        log_action_with_tx(
            &mut tx,
            admin_id,
            &format!("Resolved comment report {} with action: {}", report_id, action),
            Some(report_id),
            Some("comment_report"),
        )
        .await?;

        tx.commit().await?;
        Ok(ResolveOutcome::Resolved)
    }

    /// Admin takedown of a shoutout: audit entry plus the cascade delete.
    /// Returns the attachment URLs for file cleanup, None when missing.
    pub async fn admin_delete_shoutout(
        &self,
        admin_id: Uuid,
        shoutout_id: Uuid,
    ) -> Result<Option<Vec<String>>> {
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

        log_action_with_tx(
            &mut tx,
            admin_id,
            &format!("Deleted shoutout {}", shoutout_id),
            Some(shoutout_id),
            Some("shoutout"),
        )
        .await?;

        tx.commit().await?;
        Ok(Some(urls))
    }

    pub async fn list_admin_logs(&self, limit: i64, offset: i64) -> Result<Vec<AdminLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, admin_id, action, target_id, target_type, created_at \
             FROM admin_logs ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(map_admin_log).collect())
    }
}

pub(crate) async fn log_action_with_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    admin_id: Uuid,
    action: &str,
    target_id: Option<Uuid>,
    target_type: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO admin_logs (admin_id, action, target_id, target_type) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(admin_id)
    .bind(action)
    .bind(target_id)
    .bind(target_type)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) fn map_report(row: &PgRow) -> Report {
    Report {
        id: row.get("id"),
        shoutout_id: row.get("shoutout_id"),
        reported_by: row.get("reported_by"),
        reason: row.get("reason"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}

pub(crate) fn map_admin_log(row: &PgRow) -> AdminLogEntry {
    AdminLogEntry {
        id: row.get("id"),
        admin_id: row.get("admin_id"),
        action: row.get("action"),
        target_id: row.get("target_id"),
        target_type: row.get("target_type"),
        created_at: row.get("created_at"),
    }
}

fn map_comment_report_row(row: &PgRow) -> CommentReport {
    let comment_author = row
        .get::<Option<Uuid>, _>("ca_id")
        .map(|id| UserSummary {
            id,
            name: row.get("ca_name"),
            email: row.get("ca_email"),
            department: row.get("ca_department"),
            avatar_url: row.get("ca_avatar_url"),
        });
    let reporter = row
        .get::<Option<Uuid>, _>("rp_id")
        .map(|id| UserSummary {
            id,
            name: row.get("rp_name"),
            email: row.get("rp_email"),
            department: row.get("rp_department"),
            avatar_url: row.get("rp_avatar_url"),
        });

    CommentReport {
        id: row.get("id"),
        comment_id: row.get("comment_id"),
        shoutout_id: row.get("shoutout_id"),
        reported_by: row.get("reported_by"),
        reason: row.get("reason"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        comment_content: row.get("comment_content"),
        comment_author,
        reporter,
    }
}

use anyhow::Result;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::notification::Notification;
use crate::domain::user::UserSummary;
use crate::infra::db::Db;

/// Everything needed to persist one notification row. Centralizes the
/// metadata the frontend expects on every notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub event_type: String,
    pub title: String,
    pub message: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub payload: Option<Value>,
}

/// A notification addressed to every qualifying admin instead of a single
/// user.
#[derive(Debug, Clone)]
pub struct AdminBroadcast {
    pub actor_id: Option<Uuid>,
    pub event_type: String,
    pub title: String,
    pub message: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub payload: Option<Value>,
}

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, notification: NewNotification) -> Result<Uuid> {
        let mut tx = self.db.pool().begin().await?;
        let id = Self::create_with_tx(&mut tx, notification).await?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn create_with_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        notification: NewNotification,
    ) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO notifications \
                 (user_id, actor_id, event_type, title, message, reference_type, reference_id, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(notification.user_id)
        .bind(notification.actor_id)
        .bind(&notification.event_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.reference_type)
        .bind(notification.reference_id)
        .bind(&notification.payload)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Broadcast to every active, company-verified administrator (matched
    /// by role or the legacy flag), skipping the acting user. One row per
    /// admin; no special rollback beyond the surrounding transaction.
    pub async fn notify_admins_with_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        broadcast: AdminBroadcast,
    ) -> Result<u64> {
        let admin_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users \
             WHERE (role = 'admin' OR is_admin) AND is_active AND company_verified",
        )
        .fetch_all(&mut **tx)
        .await?;

        let mut created = 0;
        for admin_id in admin_ids {
            if Some(admin_id) == broadcast.actor_id {
                continue;
            }
            Self::create_with_tx(
                tx,
                NewNotification {
                    user_id: admin_id,
                    actor_id: broadcast.actor_id,
                    event_type: broadcast.event_type.clone(),
                    title: broadcast.title.clone(),
                    message: broadcast.message.clone(),
                    reference_type: broadcast.reference_type.clone(),
                    reference_id: broadcast.reference_id,
                    payload: broadcast.payload.clone(),
                },
            )
            .await?;
            created += 1;
        }
        Ok(created)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
        unread_only: bool,
    ) -> Result<(Vec<Notification>, i64)> {
        let mut sql = String::from(
            "SELECT n.id, n.user_id, n.actor_id, n.event_type, n.title, n.message, \
                    n.reference_type, n.reference_id, n.payload, n.is_read, n.created_at, n.read_at, \
                    a.name AS actor_name, a.email AS actor_email, \
                    a.department AS actor_department, a.avatar_url AS actor_avatar_url \
             FROM notifications n \
             LEFT JOIN users a ON a.id = n.actor_id \
             WHERE n.user_id = $1",
        );
        if unread_only {
            sql.push_str(" AND n.is_read = FALSE");
        }
        sql.push_str(" ORDER BY n.created_at DESC, n.id DESC OFFSET $2 LIMIT $3");

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(offset)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        let notifications = rows.iter().map(map_notification).collect();

        let unread_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok((notifications, unread_count))
    }

    /// Mark the given notifications (or all of the user's, when no ids are
    /// passed) as read. Returns how many rows matched.
    pub async fn mark_read(&self, user_id: Uuid, ids: Option<Vec<Uuid>>) -> Result<u64> {
        let result = match ids {
            Some(ids) if !ids.is_empty() => {
                sqlx::query(
                    "UPDATE notifications SET is_read = TRUE, read_at = $1 \
                     WHERE user_id = $2 AND id = ANY($3)",
                )
                .bind(OffsetDateTime::now_utc())
                .bind(user_id)
                .bind(&ids)
                .execute(self.db.pool())
                .await?
            }
            _ => {
                sqlx::query(
                    "UPDATE notifications SET is_read = TRUE, read_at = $1 WHERE user_id = $2",
                )
                .bind(OffsetDateTime::now_utc())
                .bind(user_id)
                .execute(self.db.pool())
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = $1 \
             WHERE user_id = $2 AND is_read = FALSE",
        )
        .bind(OffsetDateTime::now_utc())
        .bind(user_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

fn map_notification(row: &PgRow) -> Notification {
    let actor_id: Option<Uuid> = row.get("actor_id");
    let actor = actor_id.map(|id| UserSummary {
        id,
        name: row.get("actor_name"),
        email: row.get("actor_email"),
        department: row.get("actor_department"),
        avatar_url: row.get("actor_avatar_url"),
    });

    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        actor_id,
        event_type: row.get("event_type"),
        title: row.get("title"),
        message: row.get("message"),
        reference_type: row.get("reference_type"),
        reference_id: row.get("reference_id"),
        payload: row.get("payload"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
        read_at: row.get("read_at"),
        actor,
    }
}

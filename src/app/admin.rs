use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use sqlx::Row;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::moderation::log_action_with_tx;
use crate::app::notifications::{NewNotification, NotificationService};
use crate::app::users::{map_department_request, map_role_request, map_user};
use crate::domain::requests::{DepartmentChangeRequest, RoleChangeRequest};
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Debug, Serialize)]
pub struct ContributorStat {
    pub id: Uuid,
    pub name: String,
    pub department: Option<String>,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DepartmentStat {
    pub department: Option<String>,
    pub shoutout_count: i64,
}

#[derive(Debug, Serialize)]
pub struct Analytics {
    pub total_users: i64,
    pub total_shoutouts: i64,
    pub top_contributors: Vec<ContributorStat>,
    pub most_tagged: Vec<ContributorStat>,
    pub department_stats: Vec<DepartmentStat>,
}

#[derive(Debug, Serialize)]
pub struct Leaderboard {
    pub top_senders: Vec<ContributorStat>,
    pub top_receivers: Vec<ContributorStat>,
}

#[derive(Debug)]
pub enum DecideOutcome<T> {
    NotFound,
    AlreadyProcessed,
    /// Escalation to admin for a requester outside the HR department.
    HrRequired,
    Decided(T),
}

#[derive(Clone)]
pub struct AdminService {
    db: Db,
}

impl AdminService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_all_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at \
             FROM users ORDER BY created_at ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(map_user).collect())
    }

    pub async fn analytics(&self) -> Result<Analytics> {
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.db.pool())
            .await?;
        let total_shoutouts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shoutouts")
            .fetch_one(self.db.pool())
            .await?;

        let top_contributors = self.top_senders(10).await?;
        let most_tagged = self.top_receivers(10).await?;

        let department_rows = sqlx::query(
            "SELECT u.department, COUNT(s.id) AS count \
             FROM users u JOIN shoutouts s ON s.sender_id = u.id \
             GROUP BY u.department ORDER BY COUNT(s.id) DESC",
        )
        .fetch_all(self.db.pool())
        .await?;
        let department_stats = department_rows
            .iter()
            .map(|row| DepartmentStat {
                department: row.get("department"),
                shoutout_count: row.get("count"),
            })
            .collect();

        Ok(Analytics {
            total_users,
            total_shoutouts,
            top_contributors,
            most_tagged,
            department_stats,
        })
    }

    pub async fn leaderboard(&self) -> Result<Leaderboard> {
        Ok(Leaderboard {
            top_senders: self.top_senders(10).await?,
            top_receivers: self.top_receivers(10).await?,
        })
    }

    async fn top_senders(&self, limit: i64) -> Result<Vec<ContributorStat>> {
        let rows = sqlx::query(
            "SELECT u.id, u.name, u.department, COUNT(s.id) AS count \
             FROM users u JOIN shoutouts s ON s.sender_id = u.id \
             GROUP BY u.id, u.name, u.department \
             ORDER BY COUNT(s.id) DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(map_contributor).collect())
    }

    async fn top_receivers(&self, limit: i64) -> Result<Vec<ContributorStat>> {
        let rows = sqlx::query(
            "SELECT u.id, u.name, u.department, COUNT(sr.id) AS count \
             FROM users u JOIN shoutout_recipients sr ON sr.recipient_id = u.id \
             GROUP BY u.id, u.name, u.department \
             ORDER BY COUNT(sr.id) DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(map_contributor).collect())
    }

    pub async fn list_department_change_requests(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<DepartmentChangeRequest>> {
        let base = "SELECT id, user_id, current_department, requested_department, status, \
                           admin_id, created_at, updated_at, resolved_at \
                    FROM department_change_requests";
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!("{base} WHERE status = $1 ORDER BY created_at DESC"))
                    .bind(status)
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                sqlx::query(&format!("{base} ORDER BY created_at DESC"))
                    .fetch_all(self.db.pool())
                    .await?
            }
        };
        Ok(rows.iter().map(map_department_request).collect())
    }

    pub async fn list_role_change_requests(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<RoleChangeRequest>> {
        let base = "SELECT id, user_id, \"current_role\", requested_role, status, \
                           admin_id, created_at, updated_at, resolved_at \
                    FROM role_change_requests";
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!("{base} WHERE status = $1 ORDER BY created_at DESC"))
                    .bind(status)
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                sqlx::query(&format!("{base} ORDER BY created_at DESC"))
                    .fetch_all(self.db.pool())
                    .await?
            }
        };
        Ok(rows.iter().map(map_role_request).collect())
    }

    /// Decide a pending department change. On approval the user moves to
    /// the requested department in the same transaction; the affected user
    /// is notified either way.
    pub async fn decide_department_change(
        &self,
        admin: &User,
        request_id: Uuid,
        action: &str,
    ) -> Result<DecideOutcome<DepartmentChangeRequest>> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        let request = sqlx::query(
            "SELECT id, user_id, requested_department, status \
             FROM department_change_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(request) = request else {
            return Ok(DecideOutcome::NotFound);
        };
        if request.get::<String, _>("status") != "pending" {
            return Ok(DecideOutcome::AlreadyProcessed);
        }
        let user_id: Uuid = request.get("user_id");
        let requested_department: String = request.get("requested_department");

        sqlx::query(
            "UPDATE department_change_requests \
             SET status = $1, admin_id = $2, resolved_at = $3, updated_at = now() \
             WHERE id = $4",
        )
        .bind(action)
        .bind(admin.id)
        .bind(now)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        let mut log_line = format!("Department change request {} {}", request_id, action);
        if action == "approved" {
            sqlx::query("UPDATE users SET department = $1, updated_at = now() WHERE id = $2")
                .bind(&requested_department)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            log_line.push_str(&format!("; department set to {}", requested_department));
        }

        log_action_with_tx(
            &mut tx,
            admin.id,
            &log_line,
            Some(request_id),
            Some("department_change_request"),
        )
        .await?;

        let (title, message) = if action == "approved" {
            (
                "Department change approved",
                format!(
                    "Your request to move to {} was approved.",
                    requested_department
                ),
            )
        } else {
            (
                "Department change rejected",
                "Your department change request was rejected by the administrator.".to_string(),
            )
        };
        NotificationService::create_with_tx(
            &mut tx,
            NewNotification {
                user_id,
                actor_id: Some(admin.id),
                event_type: "department_change.decision".to_string(),
                title: title.to_string(),
                message: Some(message),
                reference_type: Some("department_change_request".to_string()),
                reference_id: Some(request_id),
                payload: Some(json!({
                    "redirect_url": "/profile",
                    "department": requested_department,
                    "status": action,
                })),
            },
        )
        .await?;

        tx.commit().await?;

        let refreshed = self.get_department_request(request_id).await?;
        Ok(DecideOutcome::Decided(refreshed))
    }

    /// Decide a pending role change. Escalation to admin is additionally
    /// gated on the requester sitting in HR.
    pub async fn decide_role_change(
        &self,
        admin: &User,
        request_id: Uuid,
        action: &str,
    ) -> Result<DecideOutcome<RoleChangeRequest>> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        let request = sqlx::query(
            "SELECT id, user_id, requested_role, status FROM role_change_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(request) = request else {
            return Ok(DecideOutcome::NotFound);
        };
        if request.get::<String, _>("status") != "pending" {
            return Ok(DecideOutcome::AlreadyProcessed);
        }
        let user_id: Uuid = request.get("user_id");
        let requested_role: String = request.get("requested_role");

        if action == "approved" && requested_role == "admin" {
            let department: Option<String> =
                sqlx::query_scalar("SELECT department FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_one(&mut *tx)
                    .await?;
            let in_hr = department
                .as_deref()
                .map(|d| d.trim().eq_ignore_ascii_case("hr"))
                .unwrap_or(false);
            if !in_hr {
                return Ok(DecideOutcome::HrRequired);
            }
        }

        sqlx::query(
            "UPDATE role_change_requests \
             SET status = $1, admin_id = $2, resolved_at = $3, updated_at = now() \
             WHERE id = $4",
        )
        .bind(action)
        .bind(admin.id)
        .bind(now)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        let mut log_line = format!("Role change request {} {}", request_id, action);
        if action == "approved" {
            sqlx::query(
                "UPDATE users SET role = $1, is_admin = $2, updated_at = now() WHERE id = $3",
            )
            .bind(&requested_role)
            .bind(requested_role == "admin")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            log_line.push_str(&format!("; role set to {}", requested_role));
        }

        log_action_with_tx(
            &mut tx,
            admin.id,
            &log_line,
            Some(request_id),
            Some("role_change_request"),
        )
        .await?;

        let (title, message) = if action == "approved" {
            (
                "Role change approved",
                format!("Your request for the '{}' role was approved.", requested_role),
            )
        } else {
            (
                "Role change rejected",
                "Your role change request was rejected by the administrator.".to_string(),
            )
        };
        NotificationService::create_with_tx(
            &mut tx,
            NewNotification {
                user_id,
                actor_id: Some(admin.id),
                event_type: "role_change.decision".to_string(),
                title: title.to_string(),
                message: Some(message),
                reference_type: Some("role_change_request".to_string()),
                reference_id: Some(request_id),
                payload: Some(json!({
                    "redirect_url": "/profile",
                    "role": requested_role,
                    "status": action,
                })),
            },
        )
        .await?;

        tx.commit().await?;

        let refreshed = self.get_role_request(request_id).await?;
        Ok(DecideOutcome::Decided(refreshed))
    }

    /// Admin action audit trail as CSV.
    pub async fn export_admin_logs_csv(&self) -> Result<Vec<u8>> {
        let rows = sqlx::query(
            "SELECT id, admin_id, action, target_id, target_type, created_at \
             FROM admin_logs ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["id", "admin_id", "action", "target_id", "target_type", "created_at"])?;
        for row in rows {
            writer.write_record([
                row.get::<Uuid, _>("id").to_string(),
                row.get::<Uuid, _>("admin_id").to_string(),
                row.get::<String, _>("action"),
                row.get::<Option<Uuid>, _>("target_id")
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                row.get::<Option<String>, _>("target_type").unwrap_or_default(),
                row.get::<OffsetDateTime, _>("created_at").format(&Rfc3339)?,
            ])?;
        }
        writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("failed to flush csv: {}", err))
    }

    /// Shoutout and comment reports in one CSV, tagged by kind.
    pub async fn export_reports_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["kind", "id", "target_id", "reported_by", "reason", "status", "created_at"])?;

        let report_rows = sqlx::query(
            "SELECT id, shoutout_id, reported_by, reason, status, created_at \
             FROM reports ORDER BY created_at DESC",
        )
        .fetch_all(self.db.pool())
        .await?;
        for row in report_rows {
            writer.write_record([
                "shoutout".to_string(),
                row.get::<Uuid, _>("id").to_string(),
                row.get::<Uuid, _>("shoutout_id").to_string(),
                row.get::<Uuid, _>("reported_by").to_string(),
                row.get::<String, _>("reason"),
                row.get::<String, _>("status"),
                row.get::<OffsetDateTime, _>("created_at").format(&Rfc3339)?,
            ])?;
        }

        let comment_rows = sqlx::query(
            "SELECT id, comment_id, reported_by, reason, status, created_at \
             FROM comment_reports ORDER BY created_at DESC",
        )
        .fetch_all(self.db.pool())
        .await?;
        for row in comment_rows {
            writer.write_record([
                "comment".to_string(),
                row.get::<Uuid, _>("id").to_string(),
                row.get::<Uuid, _>("comment_id").to_string(),
                row.get::<Uuid, _>("reported_by").to_string(),
                row.get::<String, _>("reason"),
                row.get::<String, _>("status"),
                row.get::<OffsetDateTime, _>("created_at").format(&Rfc3339)?,
            ])?;
        }

        writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("failed to flush csv: {}", err))
    }

    async fn get_department_request(&self, request_id: Uuid) -> Result<DepartmentChangeRequest> {
        let row = sqlx::query(
            "SELECT id, user_id, current_department, requested_department, status, admin_id, \
                    created_at, updated_at, resolved_at \
             FROM department_change_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(map_department_request(&row))
    }

    async fn get_role_request(&self, request_id: Uuid) -> Result<RoleChangeRequest> {
        let row = sqlx::query(
            "SELECT id, user_id, \"current_role\", requested_role, status, admin_id, \
                    created_at, updated_at, resolved_at \
             FROM role_change_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(map_role_request(&row))
    }
}

fn map_contributor(row: &sqlx::postgres::PgRow) -> ContributorStat {
    ContributorStat {
        id: row.get("id"),
        name: row.get("name"),
        department: row.get("department"),
        count: row.get("count"),
    }
}

use anyhow::Result;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::notifications::{AdminBroadcast, NotificationService};
use crate::domain::requests::{DepartmentChangeRequest, RoleChangeRequest};
use crate::domain::user::{User, UserProfile, UserSummary};
use crate::infra::db::Db;

/// Validated profile update. Department and role changes do not apply
/// directly; they open (or refresh) a pending change request.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let user = match crate::app::auth::load_user(&self.db, user_id).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        let pending_department = self.latest_pending_department(user_id).await?;
        let pending_role = self.latest_pending_role(user_id).await?;

        Ok(Some(UserProfile {
            user,
            pending_department,
            pending_role,
        }))
    }

    /// Apply a profile update. Name changes land immediately; department
    /// and role changes upsert the single pending request per kind and
    /// fan a notification out to the admins.
    pub async fn update_profile(&self, user: &User, update: ProfileUpdate) -> Result<UserProfile> {
        let mut tx = self.db.pool().begin().await?;

        if let Some(name) = &update.name {
            sqlx::query("UPDATE users SET name = $1, updated_at = now() WHERE id = $2")
                .bind(name)
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(department) = &update.department {
            if Some(department.as_str()) != user.department.as_deref() {
                let pending = sqlx::query(
                    "SELECT id, requested_department FROM department_change_requests \
                     WHERE user_id = $1 AND status = 'pending' \
                     ORDER BY created_at DESC LIMIT 1",
                )
                .bind(user.id)
                .fetch_optional(&mut *tx)
                .await?;

                let request_id = match pending {
                    Some(row) => {
                        let id: Uuid = row.get("id");
                        let requested: String = row.get("requested_department");
                        if requested == *department {
                            None
                        } else {
                            sqlx::query(
                                "UPDATE department_change_requests \
                                 SET requested_department = $1, updated_at = now() WHERE id = $2",
                            )
                            .bind(department)
                            .bind(id)
                            .execute(&mut *tx)
                            .await?;
                            Some(id)
                        }
                    }
                    None => {
                        let id: Uuid = sqlx::query_scalar(
                            "INSERT INTO department_change_requests \
                                 (user_id, current_department, requested_department, status) \
                             VALUES ($1, $2, $3, 'pending') RETURNING id",
                        )
                        .bind(user.id)
                        .bind(&user.department)
                        .bind(department)
                        .fetch_one(&mut *tx)
                        .await?;
                        Some(id)
                    }
                };

                if let Some(request_id) = request_id {
                    NotificationService::notify_admins_with_tx(
                        &mut tx,
                        AdminBroadcast {
                            actor_id: Some(user.id),
                            event_type: "department_change.requested".to_string(),
                            title: "New department change request".to_string(),
                            message: Some(format!(
                                "{} requested a move to {}.",
                                user.name, department
                            )),
                            reference_type: Some("department_change_request".to_string()),
                            reference_id: Some(request_id),
                            payload: Some(json!({
                                "redirect_url": "/admin?section=department-requests",
                                "section": "department-requests",
                                "request_id": request_id,
                                "user_id": user.id,
                            })),
                        },
                    )
                    .await?;
                }
            }
        }

        if let Some(role) = &update.role {
            if *role != user.role {
                let pending = sqlx::query(
                    "SELECT id, requested_role FROM role_change_requests \
                     WHERE user_id = $1 AND status = 'pending' \
                     ORDER BY created_at DESC LIMIT 1",
                )
                .bind(user.id)
                .fetch_optional(&mut *tx)
                .await?;

                let request_id = match pending {
                    Some(row) => {
                        let id: Uuid = row.get("id");
                        let requested: String = row.get("requested_role");
                        if requested == *role {
                            None
                        } else {
                            sqlx::query(
                                "UPDATE role_change_requests \
                                 SET requested_role = $1, \"current_role\" = $2, status = 'pending', \
                                     updated_at = now() \
                                 WHERE id = $3",
                            )
                            .bind(role)
                            .bind(&user.role)
                            .bind(id)
                            .execute(&mut *tx)
                            .await?;
                            Some(id)
                        }
                    }
                    None => {
                        let id: Uuid = sqlx::query_scalar(
                            "INSERT INTO role_change_requests \
                                 (user_id, \"current_role\", requested_role, status) \
                             VALUES ($1, $2, $3, 'pending') RETURNING id",
                        )
                        .bind(user.id)
                        .bind(&user.role)
                        .bind(role)
                        .fetch_one(&mut *tx)
                        .await?;
                        Some(id)
                    }
                };

                if let Some(request_id) = request_id {
                    NotificationService::notify_admins_with_tx(
                        &mut tx,
                        AdminBroadcast {
                            actor_id: Some(user.id),
                            event_type: "role_change.requested".to_string(),
                            title: "New role change request".to_string(),
                            message: Some(format!("{} requested the '{}' role.", user.name, role)),
                            reference_type: Some("role_change_request".to_string()),
                            reference_id: Some(request_id),
                            payload: Some(json!({
                                "redirect_url": "/admin?section=role-requests",
                                "section": "role-requests",
                                "request_id": request_id,
                                "user_id": user.id,
                            })),
                        },
                    )
                    .await?;
                }
            }
        }

        tx.commit().await?;

        self.get_profile(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user disappeared during profile update"))
    }

    pub async fn list_department_requests(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<DepartmentChangeRequest>> {
        let rows = sqlx::query(
            "SELECT id, user_id, current_department, requested_department, status, admin_id, \
                    created_at, updated_at, resolved_at \
             FROM department_change_requests \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(map_department_request).collect())
    }

    pub async fn list_role_requests(&self, user_id: Uuid) -> Result<Vec<RoleChangeRequest>> {
        let rows = sqlx::query(
            "SELECT id, user_id, \"current_role\", requested_role, status, admin_id, \
                    created_at, updated_at, resolved_at \
             FROM role_change_requests \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(map_role_request).collect())
    }

    /// Swap in a new avatar URL, handing back the previous one so the
    /// caller can unlink the old file.
    pub async fn update_avatar(
        &self,
        user_id: Uuid,
        avatar_url: &str,
    ) -> Result<Option<(User, Option<String>)>> {
        let mut tx = self.db.pool().begin().await?;

        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar_url FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(previous) = previous else {
            return Ok(None);
        };

        let row = sqlx::query(
            "UPDATE users SET avatar_url = $1, updated_at = now() \
             WHERE id = $2 \
             RETURNING id, email, name, department, role, is_admin, is_active, email_verified, \
                       company_verified, avatar_url, created_at, updated_at",
        )
        .bind(avatar_url)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((map_user(&row), previous)))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, email, name, department, role, is_admin, is_active, email_verified, \
                    company_verified, avatar_url, created_at, updated_at \
             FROM users \
             WHERE name ILIKE $1 AND is_active AND company_verified \
             ORDER BY name ASC",
        )
        .bind(format!("%{}%", query))
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(map_user).collect())
    }

    pub async fn list(&self, department: Option<&str>) -> Result<Vec<User>> {
        let rows = match department {
            Some(department) => {
                sqlx::query(
                    "SELECT id, email, name, department, role, is_admin, is_active, \
                            email_verified, company_verified, avatar_url, created_at, updated_at \
                     FROM users \
                     WHERE is_active AND company_verified AND department = $1 \
                     ORDER BY name ASC",
                )
                .bind(department)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, email, name, department, role, is_admin, is_active, \
                            email_verified, company_verified, avatar_url, created_at, updated_at \
                     FROM users \
                     WHERE is_active AND company_verified \
                     ORDER BY name ASC",
                )
                .fetch_all(self.db.pool())
                .await?
            }
        };
        Ok(rows.iter().map(map_user).collect())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        crate::app::auth::load_user(&self.db, user_id).await
    }

    async fn latest_pending_department(&self, user_id: Uuid) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT requested_department FROM department_change_requests \
             WHERE user_id = $1 AND status = 'pending' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(value)
    }

    async fn latest_pending_role(&self, user_id: Uuid) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT requested_role FROM role_change_requests \
             WHERE user_id = $1 AND status = 'pending' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(value)
    }
}

pub(crate) fn map_user(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        department: row.get("department"),
        role: row.get("role"),
        is_admin: row.get("is_admin"),
        is_active: row.get("is_active"),
        email_verified: row.get("email_verified"),
        company_verified: row.get("company_verified"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn map_user_summary_prefixed(row: &PgRow, prefix: &str) -> UserSummary {
    UserSummary {
        id: row.get(format!("{}id", prefix).as_str()),
        name: row.get(format!("{}name", prefix).as_str()),
        email: row.get(format!("{}email", prefix).as_str()),
        department: row.get(format!("{}department", prefix).as_str()),
        avatar_url: row.get(format!("{}avatar_url", prefix).as_str()),
    }
}

pub(crate) fn map_department_request(row: &PgRow) -> DepartmentChangeRequest {
    DepartmentChangeRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        current_department: row.get("current_department"),
        requested_department: row.get("requested_department"),
        status: row.get("status"),
        admin_id: row.get("admin_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        resolved_at: row.get("resolved_at"),
    }
}

pub(crate) fn map_role_request(row: &PgRow) -> RoleChangeRequest {
    RoleChangeRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        current_role: row.get("current_role"),
        requested_role: row.get("requested_role"),
        status: row.get("status"),
        admin_id: row.get("admin_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        resolved_at: row.get("resolved_at"),
    }
}

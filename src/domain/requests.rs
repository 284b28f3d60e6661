use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A request to move the user to a different department. At most one
/// pending request per user is acted upon; re-requests update the pending
/// row instead of stacking new ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentChangeRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_department: Option<String>,
    pub requested_department: String,
    pub status: String,
    pub admin_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
}

/// Same lifecycle as [`DepartmentChangeRequest`], for the employee/admin
/// role. Escalation to admin is limited to the HR department.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChangeRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_role: Option<String>,
    pub requested_role: String,
    pub status: String,
    pub admin_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub shoutout_id: Uuid,
    pub reported_by: Uuid,
    pub reason: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Comment report joined with the offending comment's author and the
/// reporter, as shown in the admin queue.
#[derive(Debug, Clone, Serialize)]
pub struct CommentReport {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub shoutout_id: Uuid,
    pub reported_by: Uuid,
    pub reason: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub comment_content: Option<String>,
    pub comment_author: Option<UserSummary>,
    pub reporter: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLogEntry {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub target_id: Option<Uuid>,
    pub target_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shoutout {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<i64>,
}

/// Fully assembled shoutout as rendered in the feed: sender, tagged
/// recipients, aggregate engagement, and the caller's own reactions.
#[derive(Debug, Clone, Serialize)]
pub struct ShoutoutView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub sender: UserSummary,
    pub recipients: Vec<UserSummary>,
    pub reaction_counts: HashMap<String, i64>,
    pub comment_count: i64,
    pub user_reactions: Vec<String>,
    pub attachments: Vec<Attachment>,
}

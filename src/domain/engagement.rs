use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserSummary;

/// The fixed set of reaction kinds.
pub const REACTION_KINDS: [&str; 3] = ["like", "clap", "star"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub shoutout_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Comment with its author and mentioned users resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub shoutout_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: UserSummary,
    pub mentions: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub shoutout_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Per-shoutout reaction rollup: counts for every kind plus the users
/// behind the requested kinds.
#[derive(Debug, Clone, Serialize)]
pub struct ReactionSummary {
    pub shoutout_id: Uuid,
    pub counts: HashMap<String, i64>,
    pub users: HashMap<String, Vec<UserSummary>>,
}

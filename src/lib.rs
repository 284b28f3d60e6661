pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::path::PathBuf;

use crate::infra::{db::Db, mailer::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub mailer: Mailer,
    pub jwt_secret: String,
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub upload_dir: PathBuf,
}

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod respond;
mod routes;

pub use auth::{AdminUser, AuthUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::misc())
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::shoutouts())
        .merge(routes::admin())
        .merge(routes::notifications())
        // Multipart shoutout attachments can carry several 5MB files.
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .with_state(state)
}

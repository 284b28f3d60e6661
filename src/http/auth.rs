use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::AuthService;
use crate::domain::user::User;
use crate::http::AppError;
use crate::AppState;

/// Extractor for the authenticated, active user behind the Bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Extractor that additionally requires the admin role (or the legacy
/// admin flag).
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

async fn user_from_parts(parts: &mut Parts, state: &AppState) -> Result<User, AppError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

    let service = AuthService::new(
        state.db.clone(),
        state.jwt_secret.clone(),
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    );
    let user = service
        .authenticate_access_token(token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to authenticate");
            AppError::internal("failed to authenticate")
        })?
        .ok_or_else(|| AppError::unauthorized("Could not validate credentials"))?;

    if !user.is_active {
        return Err(AppError::forbidden("Inactive user"));
    }

    Ok(user)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(AuthUser(user_from_parts(parts, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = user_from_parts(parts, state).await?;
        if !user.is_administrator() {
            return Err(AppError::forbidden("Admin privileges required"));
        }
        Ok(AdminUser(user))
    }
}

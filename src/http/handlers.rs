use std::net::SocketAddr;
use std::path::Path as FsPath;

use axum::extract::{ConnectInfo, Multipart, Path, Query, State};
use axum::http::header;
use axum::response::Html;
use axum::http::StatusCode;
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::macros::format_description;
use time::Date;
use uuid::Uuid;

use crate::app::admin::{AdminService, Analytics, DecideOutcome, Leaderboard};
use crate::app::auth::{
    ApprovalAction, ApprovalOutcome, AuthService, LoginOutcome, ResetPasswordOutcome,
    VerifyEmailOutcome,
};
use crate::app::engagement::{
    AddReactionOutcome, CreateCommentOutcome, EngagementService, ReportCommentOutcome,
};
use crate::app::moderation::{ModerationService, ResolveOutcome};
use crate::app::notifications::NotificationService;
use crate::app::shoutouts::{
    CreateShoutoutOutcome, NewAttachment, ShoutoutFilters, ShoutoutService,
};
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::engagement::{CommentView, ReactionSummary, REACTION_KINDS};
use crate::domain::moderation::{AdminLogEntry, CommentReport, Report};
use crate::domain::notification::Notification;
use crate::domain::requests::{DepartmentChangeRequest, RoleChangeRequest};
use crate::domain::shoutout::ShoutoutView;
use crate::domain::user::{User, UserProfile};
use crate::http::respond::{success, success_message, ApiResponse};
use crate::http::{AdminUser, AppError, AuthUser};
use crate::AppState;

const MAX_PASSWORD_LEN: usize = 128;
const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;
const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_ATTACHMENT_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "pdf"];
const ALLOWED_AVATAR_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.jwt_secret.clone(),
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

fn random_hex(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..bytes).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// Best-effort unlink of files previously stored under the uploads tree.
async fn remove_upload_files(upload_dir: &FsPath, urls: &[String]) {
    for url in urls {
        let Some(relative) = url.strip_prefix("/uploads/") else {
            continue;
        };
        if relative.contains("..") {
            continue;
        }
        let _ = tokio::fs::remove_file(upload_dir.join(relative)).await;
    }
}

// ============================================================================
// Misc
// ============================================================================

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "BragBoard" }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status })
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub department: String,
    pub role: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("User name cannot be empty"));
    }
    if payload.email.trim().is_empty() {
        return Err(AppError::bad_request("Email cannot be empty"));
    }
    if payload.password.trim().is_empty() {
        return Err(AppError::bad_request("Password cannot be empty"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("Password must be at most 128 characters"));
    }
    if payload.department.trim().is_empty() {
        return Err(AppError::bad_request("Department cannot be empty"));
    }

    let role = payload
        .role
        .as_deref()
        .map(|role| role.trim().to_lowercase())
        .unwrap_or_else(|| "employee".to_string());
    if role != "admin" && role != "employee" {
        return Err(AppError::bad_request(
            "Invalid role specified. Use 'admin' or 'employee'.",
        ));
    }
    if role == "admin" && !payload.department.trim().eq_ignore_ascii_case("hr") {
        return Err(AppError::forbidden("Only HR members can register as admin"));
    }

    let service = auth_service(&state);
    let registration = service
        .register(
            &payload.name,
            &payload.email,
            &payload.password,
            &payload.department,
            &role,
        )
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.code().as_deref() == Some("23505") {
                        return AppError::conflict("Email already registered");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    let mailer = state.mailer.clone();
    let user = registration.user;
    let token = registration.verification_token;
    let (to, name) = (user.email.clone(), user.name.clone());
    tokio::spawn(async move {
        if let Err(err) = mailer.send_verification_email(&to, &name, &token).await {
            tracing::warn!(error = ?err, "failed to send verification email");
        }
    });

    Ok(success(
        "Registration successful. Please check your email to verify your account.",
        json!({ "requires_verification": true }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("Password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let outcome = service
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match outcome {
        LoginOutcome::Success(tokens) => Ok(success(
            "Login successful",
            json!({
                "access_token": tokens.access_token,
                "refresh_token": tokens.refresh_token,
                "token_type": "bearer",
            }),
        )),
        LoginOutcome::InvalidCredentials => {
            Err(AppError::unauthorized("Incorrect email or password"))
        }
        LoginOutcome::EmailUnverified => Err(AppError::bad_request("Please verify your email")),
        LoginOutcome::CompanyUnverified => {
            Err(AppError::bad_request("Waiting for company verification"))
        }
        LoginOutcome::Inactive => Err(AppError::bad_request("Inactive user")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?
        .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

    Ok(success(
        "Token refreshed",
        json!({
            "access_token": tokens.access_token,
            "refresh_token": tokens.refresh_token,
            "token_type": "bearer",
        }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let service = auth_service(&state);
    let outcome = service.verify_email(&query.token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to verify email");
        AppError::internal("failed to verify email")
    })?;

    match outcome {
        VerifyEmailOutcome::InvalidToken => Err(AppError::bad_request("Invalid verification token")),
        VerifyEmailOutcome::Expired => {
            Err(AppError::bad_request("Verification token has expired"))
        }
        VerifyEmailOutcome::AlreadyVerified => Ok(success_message("Email already verified")),
        VerifyEmailOutcome::Verified {
            user,
            approval_token,
        } => {
            let message = if let Some(token) = approval_token {
                let mailer = state.mailer.clone();
                tokio::spawn(async move {
                    if let Err(err) = mailer
                        .send_company_approval_email(
                            &user.name,
                            &user.email,
                            user.department.as_deref(),
                            &user.role,
                            &token,
                        )
                        .await
                    {
                        tracing::warn!(error = ?err, "failed to send company approval email");
                    }
                });
                "Email verified successfully. Waiting for company verification."
            } else {
                "Email verified successfully. You can now log in."
            };
            Ok(success_message(message))
        }
    }
}

#[derive(Deserialize)]
pub struct CompanyApprovalQuery {
    pub token: String,
    pub action: String,
}

/// Approve/reject links clicked from the approver's mailbox; answers with
/// small HTML pages rather than the JSON envelope.
pub async fn company_approval(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<CompanyApprovalQuery>,
) -> (StatusCode, Html<String>) {
    let action = match query.action.trim().to_lowercase().as_str() {
        "approve" => ApprovalAction::Approve,
        "reject" => ApprovalAction::Reject,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Html(
                    "<h2>Invalid action</h2><p>Please use the Approve or Reject links provided \
                     in the email.</p>"
                        .to_string(),
                ),
            )
        }
    };

    let action_ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    let service = auth_service(&state);
    let outcome = service
        .decide_company_approval(
            &query.token,
            action,
            action_ip,
            state.mailer.company_approver_email(),
        )
        .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(error = ?err, "failed to process company approval");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h2>Something went wrong</h2><p>Please try again later.</p>".to_string()),
            );
        }
    };

    match outcome {
        ApprovalOutcome::InvalidToken => (
            StatusCode::NOT_FOUND,
            Html(
                "<h2>Invalid or expired link</h2><p>The approval request could not be found. \
                 It may have already been processed.</p>"
                    .to_string(),
            ),
        ),
        ApprovalOutcome::AlreadyProcessed { status } => {
            let mut label = status;
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            (
                StatusCode::OK,
                Html(format!(
                    "<h2>Request Already {}</h2><p>This request was previously processed.</p>",
                    label
                )),
            )
        }
        ApprovalOutcome::Expired => (
            StatusCode::BAD_REQUEST,
            Html(
                "<h2>Link Expired</h2><p>The approval link has expired. Ask the employee to \
                 verify their email again.</p>"
                    .to_string(),
            ),
        ),
        ApprovalOutcome::UserMissing => (
            StatusCode::NOT_FOUND,
            Html(
                "<h2>User Not Found</h2><p>The user associated with this request no longer \
                 exists.</p>"
                    .to_string(),
            ),
        ),
        ApprovalOutcome::Approved { user } => {
            let mailer = state.mailer.clone();
            let (to, name) = (user.email.clone(), user.name.clone());
            tokio::spawn(async move {
                if let Err(err) = mailer
                    .send_company_approval_outcome_email(&to, &name, true)
                    .await
                {
                    tracing::warn!(error = ?err, "failed to send approval outcome email");
                }
            });
            (
                StatusCode::OK,
                Html("<h2>User Approved</h2><p>The employee can now log in.</p>".to_string()),
            )
        }
        ApprovalOutcome::Rejected {
            user_name,
            user_email,
        } => {
            let mailer = state.mailer.clone();
            tokio::spawn(async move {
                if let Err(err) = mailer
                    .send_company_approval_outcome_email(&user_email, &user_name, false)
                    .await
                {
                    tracing::warn!(error = ?err, "failed to send rejection outcome email");
                }
            });
            (
                StatusCode::OK,
                Html(
                    "<h2>User Rejected</h2><p>The user has been removed from the system.</p>"
                        .to_string(),
                ),
            )
        }
    }
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::bad_request("Email cannot be empty"));
    }

    let service = auth_service(&state);
    let created = service.forgot_password(&payload.email).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to create password reset");
        AppError::internal("failed to create password reset")
    })?;

    if let Some((user, token)) = created {
        let mailer = state.mailer.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer
                .send_password_reset_email(&user.email, &user.name, &token)
                .await
            {
                tracing::warn!(error = ?err, "failed to send password reset email");
            }
        });
    }

    // Same answer whether or not the account exists.
    Ok(success_message("If that email exists, a reset link has been sent."))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if payload.new_password.trim().is_empty() {
        return Err(AppError::bad_request("Password cannot be empty"));
    }
    if payload.new_password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("Password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let outcome = service
        .reset_password(&payload.token, &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to reset password");
            AppError::internal("failed to reset password")
        })?;

    match outcome {
        ResetPasswordOutcome::InvalidToken => {
            Err(AppError::bad_request("Invalid or expired reset token"))
        }
        ResetPasswordOutcome::AlreadyUsed => Err(AppError::bad_request("Reset token already used")),
        ResetPasswordOutcome::Expired => Err(AppError::bad_request("Reset token has expired")),
        ResetPasswordOutcome::UserMissing => Err(AppError::not_found("User not found")),
        ResetPasswordOutcome::Done { user } => {
            let mailer = state.mailer.clone();
            tokio::spawn(async move {
                if let Err(err) = mailer
                    .send_password_change_confirmation_email(&user.email, &user.name)
                    .await
                {
                    tracing::warn!(error = ?err, "failed to send password change email");
                }
            });
            Ok(success_message("Password has been reset successfully"))
        }
    }
}

// ============================================================================
// Users
// ============================================================================

pub async fn get_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let service = UserService::new(state.db.clone());
    let profile = service
        .get_profile(user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user.id, "failed to fetch profile");
            AppError::internal("failed to fetch profile")
        })?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(success("Profile retrieved", profile))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
}

pub async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("User name cannot be empty"));
        }
    }
    if let Some(department) = &payload.department {
        if department.trim().is_empty() {
            return Err(AppError::bad_request("Department cannot be empty"));
        }
    }

    let role = match &payload.role {
        Some(role) => {
            let role = role.trim().to_lowercase();
            if role != "admin" && role != "employee" {
                return Err(AppError::bad_request("Invalid role selection"));
            }
            if role == "admin"
                && !user
                    .department
                    .as_deref()
                    .map(|d| d.trim().eq_ignore_ascii_case("hr"))
                    .unwrap_or(false)
            {
                return Err(AppError::forbidden("Only HR members can request admin access"));
            }
            Some(role)
        }
        None => None,
    };

    let update = ProfileUpdate {
        name: payload.name.map(|name| name.trim().to_string()),
        department: payload.department.map(|d| d.trim().to_string()),
        role,
    };

    let service = UserService::new(state.db.clone());
    let profile = service.update_profile(&user, update).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user.id, "failed to update profile");
        AppError::internal("failed to update profile")
    })?;

    Ok(success("Profile updated", profile))
}

pub async fn list_my_department_requests(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DepartmentChangeRequest>>>, AppError> {
    let service = UserService::new(state.db.clone());
    let requests = service
        .list_department_requests(user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list department change requests");
            AppError::internal("failed to list department change requests")
        })?;
    Ok(success("Department change requests retrieved", requests))
}

pub async fn list_my_role_requests(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<RoleChangeRequest>>>, AppError> {
    let service = UserService::new(state.db.clone());
    let requests = service.list_role_requests(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list role change requests");
        AppError::internal("failed to list role change requests")
    })?;
    Ok(success("Role change requests retrieved", requests))
}

pub async fn upload_avatar(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let mut avatar: Option<(Option<String>, Option<String>, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("Invalid multipart payload"))?
    {
        if field.name() == Some("avatar") {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|_| AppError::bad_request("Failed to read avatar upload"))?;
            avatar = Some((file_name, content_type, data));
            break;
        }
    }

    let Some((file_name, content_type, data)) = avatar else {
        return Err(AppError::bad_request("Avatar file is required"));
    };

    let content_type = content_type.unwrap_or_default();
    if !ALLOWED_AVATAR_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::bad_request("Unsupported image format"));
    }
    if data.len() > MAX_AVATAR_BYTES {
        return Err(AppError::bad_request("Avatar exceeds 2MB size limit"));
    }
    if image::load_from_memory(&data).is_err() {
        return Err(AppError::bad_request("Unsupported image format"));
    }

    let extension = file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()))
        .unwrap_or_else(|| "png".to_string());
    let safe_name = format!("{}_{}.{}", user.id, random_hex(8), extension);

    let avatar_dir = state.upload_dir.join("avatars");
    tokio::fs::create_dir_all(&avatar_dir).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to create avatar directory");
        AppError::internal("failed to store avatar")
    })?;
    tokio::fs::write(avatar_dir.join(&safe_name), &data)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to write avatar file");
            AppError::internal("failed to store avatar")
        })?;

    let avatar_url = format!("/uploads/avatars/{}", safe_name);
    let service = UserService::new(state.db.clone());
    let (updated, previous) = service
        .update_avatar(user.id, &avatar_url)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user.id, "failed to update avatar");
            AppError::internal("failed to update avatar")
        })?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if let Some(previous) = previous {
        remove_upload_files(&state.upload_dir, &[previous]).await;
    }

    Ok(success("Avatar updated", updated))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

pub async fn search_users(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    let service = UserService::new(state.db.clone());
    let users = service.search(&query.query).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to search users");
        AppError::internal("failed to search users")
    })?;
    Ok(success("Users retrieved", users))
}

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub department: Option<String>,
}

pub async fn list_users(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    let service = UserService::new(state.db.clone());
    let users = service
        .list(query.department.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list users");
            AppError::internal("failed to list users")
        })?;
    Ok(success("Users retrieved", users))
}

pub async fn get_user(
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service
        .get_user(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(success("User retrieved", user))
}

// ============================================================================
// Shoutouts
// ============================================================================

pub async fn create_shoutout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ShoutoutView>>, AppError> {
    let mut message = String::new();
    let mut recipient_ids: Vec<Uuid> = Vec::new();
    let mut files: Vec<(String, Option<String>, bytes::Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("Invalid multipart payload"))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("message") => {
                message = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Invalid message field"))?;
            }
            Some("recipient_ids") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Invalid recipient_ids field"))?;
                for part in text.split(',') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    let id = Uuid::parse_str(part)
                        .map_err(|_| AppError::bad_request("Invalid recipient id"))?;
                    recipient_ids.push(id);
                }
            }
            Some("files") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "attachment".to_string());
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file upload"))?;
                files.push((file_name, content_type, data));
            }
            _ => {}
        }
    }

    if message.trim().is_empty() {
        return Err(AppError::bad_request("Shoutout message cannot be empty"));
    }
    if recipient_ids.is_empty() {
        return Err(AppError::bad_request("At least one recipient is required"));
    }

    // Validate and persist attachments before touching the database.
    let mut attachments = Vec::with_capacity(files.len());
    if !files.is_empty() {
        let upload_root = state.upload_dir.join("shoutouts");
        tokio::fs::create_dir_all(&upload_root).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to create upload directory");
            AppError::internal("failed to store attachments")
        })?;

        for (file_name, _content_type, data) in &files {
            let extension = file_name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_lowercase())
                .unwrap_or_default();
            if !ALLOWED_ATTACHMENT_EXTENSIONS.contains(&extension.as_str()) {
                return Err(AppError::bad_request(format!(
                    "File type .{} not allowed",
                    extension
                )));
            }
            if data.len() > MAX_ATTACHMENT_BYTES {
                return Err(AppError::bad_request(format!(
                    "File {} exceeds 5MB size limit",
                    file_name
                )));
            }

            let safe_name = format!("{}_{}", random_hex(8), file_name);
            tokio::fs::write(upload_root.join(&safe_name), data)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, "failed to write attachment");
                    AppError::internal("failed to store attachments")
                })?;

            let mime = match extension.as_str() {
                "jpg" | "jpeg" => Some("image/jpeg".to_string()),
                "png" | "gif" | "webp" => Some(format!("image/{}", extension)),
                _ => None,
            };
            attachments.push(NewAttachment {
                url: format!("/uploads/shoutouts/{}", safe_name),
                name: Some(file_name.clone()),
                content_type: mime,
                size: Some(data.len() as i64),
            });
        }
    }

    let service = ShoutoutService::new(state.db.clone());
    let outcome = service
        .create(&user, &message, &recipient_ids, &attachments)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create shoutout");
            AppError::internal("failed to create shoutout")
        })?;

    let stored_urls: Vec<String> = attachments.iter().map(|a| a.url.clone()).collect();
    match outcome {
        CreateShoutoutOutcome::Created(view) => Ok(success("Shoutout created successfully", *view)),
        CreateShoutoutOutcome::RecipientNotFound(id) => {
            remove_upload_files(&state.upload_dir, &stored_urls).await;
            Err(AppError::not_found(format!(
                "Recipient with id {} not found",
                id
            )))
        }
        CreateShoutoutOutcome::SelfRecipient => {
            remove_upload_files(&state.upload_dir, &stored_urls).await;
            Err(AppError::bad_request("You cannot give a shoutout to yourself"))
        }
        CreateShoutoutOutcome::DepartmentMismatch => {
            remove_upload_files(&state.upload_dir, &stored_urls).await;
            Err(AppError::forbidden(
                "Can only tag users from your own department",
            ))
        }
    }
}

#[derive(Deserialize)]
pub struct ShoutoutListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub department: Option<String>,
    pub sender_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub all_departments: bool,
}

fn parse_date(value: &str) -> Result<Date, AppError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value, &format)
        .map_err(|_| AppError::bad_request("Invalid date format, expected YYYY-MM-DD"))
}

pub async fn list_shoutouts(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ShoutoutListQuery>,
) -> Result<Json<ApiResponse<Vec<ShoutoutView>>>, AppError> {
    let limit = query.limit.unwrap_or(20);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let skip = query.skip.unwrap_or(0).max(0);

    let filters = ShoutoutFilters {
        skip,
        limit,
        department: query.department,
        sender_id: query.sender_id,
        recipient_id: query.recipient_id,
        start_date: query.start_date.as_deref().map(parse_date).transpose()?,
        end_date: query.end_date.as_deref().map(parse_date).transpose()?,
        all_departments: query.all_departments,
    };

    let service = ShoutoutService::new(state.db.clone());
    let shoutouts = service.list(&user, &filters).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list shoutouts");
        AppError::internal("failed to list shoutouts")
    })?;

    Ok(success("Shoutouts retrieved", shoutouts))
}

pub async fn get_shoutout(
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ShoutoutView>>, AppError> {
    let service = ShoutoutService::new(state.db.clone());
    let sender = service.get_sender(id).await.map_err(|err| {
        tracing::error!(error = ?err, shoutout_id = %id, "failed to fetch shoutout");
        AppError::internal("failed to fetch shoutout")
    })?;
    if sender.is_none() {
        return Err(AppError::not_found("Shoutout not found"));
    }

    if !user.is_administrator() {
        let allowed = service
            .has_department_access(id, user.department.as_deref())
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, shoutout_id = %id, "failed to check access");
                AppError::internal("failed to fetch shoutout")
            })?;
        if !allowed {
            return Err(AppError::forbidden("Not authorized to view this shoutout"));
        }
    }

    let view = service
        .get_view(id, user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to fetch shoutout");
            AppError::internal("failed to fetch shoutout")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    Ok(success("Shoutout retrieved", view))
}

#[derive(Deserialize)]
pub struct UpdateShoutoutRequest {
    pub message: String,
}

pub async fn update_shoutout(
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateShoutoutRequest>,
) -> Result<Json<ApiResponse<ShoutoutView>>, AppError> {
    let service = ShoutoutService::new(state.db.clone());
    let sender = service
        .get_sender(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to fetch shoutout");
            AppError::internal("failed to update shoutout")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    if sender != user.id {
        return Err(AppError::forbidden("Not authorized to update this shoutout"));
    }
    if payload.message.trim().is_empty() {
        return Err(AppError::bad_request("Shoutout message cannot be empty"));
    }

    service.update_message(id, &payload.message).await.map_err(|err| {
        tracing::error!(error = ?err, shoutout_id = %id, "failed to update shoutout");
        AppError::internal("failed to update shoutout")
    })?;

    let view = service
        .get_view(id, user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to fetch shoutout");
            AppError::internal("failed to update shoutout")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    Ok(success("Shoutout updated successfully", view))
}

pub async fn delete_shoutout(
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let service = ShoutoutService::new(state.db.clone());
    let sender = service
        .get_sender(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to fetch shoutout");
            AppError::internal("failed to delete shoutout")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    if sender != user.id && !user.is_administrator() {
        return Err(AppError::forbidden("Not authorized to delete this shoutout"));
    }

    let urls = service
        .delete(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to delete shoutout");
            AppError::internal("failed to delete shoutout")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    remove_upload_files(&state.upload_dir, &urls).await;

    Ok(success_message("Shoutout deleted successfully"))
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub mentions: Option<Vec<Uuid>>,
}

pub async fn create_comment(
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<ApiResponse<CommentView>>, AppError> {
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("Comment content cannot be empty"));
    }

    let service = EngagementService::new(state.db.clone());
    let outcome = service
        .create_comment(&user, id, &payload.content, payload.mentions)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?;

    match outcome {
        CreateCommentOutcome::ShoutoutNotFound => Err(AppError::not_found("Shoutout not found")),
        CreateCommentOutcome::Created(view) => Ok(success("Comment added successfully", *view)),
    }
}

pub async fn list_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CommentView>>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let comments = service.list_comments(id).await.map_err(|err| {
        tracing::error!(error = ?err, shoutout_id = %id, "failed to list comments");
        AppError::internal("failed to list comments")
    })?;
    Ok(success("Comments retrieved", comments))
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

pub async fn update_comment(
    AuthUser(user): AuthUser,
    Path(comment_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<ApiResponse<CommentView>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let (author_id, _) = service
        .get_comment_author(comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to fetch comment");
            AppError::internal("failed to update comment")
        })?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;

    if author_id != user.id {
        return Err(AppError::forbidden("Not authorized to update this comment"));
    }
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("Comment content cannot be empty"));
    }

    service
        .update_comment(comment_id, &payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to update comment");
            AppError::internal("failed to update comment")
        })?;

    let view = service
        .get_comment_view(comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to fetch comment");
            AppError::internal("failed to update comment")
        })?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;

    Ok(success("Comment updated successfully", view))
}

pub async fn delete_comment(
    AuthUser(user): AuthUser,
    Path(comment_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let (author_id, _) = service
        .get_comment_author(comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to fetch comment");
            AppError::internal("failed to delete comment")
        })?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;

    if author_id != user.id && !user.is_administrator() {
        return Err(AppError::forbidden("Not authorized to delete this comment"));
    }

    service.delete_comment(comment_id).await.map_err(|err| {
        tracing::error!(error = ?err, comment_id = %comment_id, "failed to delete comment");
        AppError::internal("failed to delete comment")
    })?;

    Ok(success_message("Comment deleted successfully"))
}

#[derive(Deserialize)]
pub struct ReportRequest {
    pub reason: String,
}

pub async fn report_comment(
    AuthUser(user): AuthUser,
    Path(comment_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ReportRequest>,
) -> Result<Json<ApiResponse<CommentReport>>, AppError> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::bad_request("Report reason cannot be empty"));
    }

    let service = EngagementService::new(state.db.clone());
    let outcome = service
        .report_comment(&user, comment_id, &payload.reason)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to report comment");
            AppError::internal("failed to report comment")
        })?;

    match outcome {
        ReportCommentOutcome::CommentNotFound => Err(AppError::not_found("Comment not found")),
        ReportCommentOutcome::OwnComment => {
            Err(AppError::bad_request("You cannot report your own comment"))
        }
        ReportCommentOutcome::AlreadyReported => {
            Err(AppError::conflict("You have already reported this comment"))
        }
        ReportCommentOutcome::Reported(report) => {
            Ok(success("Comment reported successfully", report))
        }
    }
}

// ============================================================================
// Reactions
// ============================================================================

#[derive(Deserialize)]
pub struct ReactionRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

pub async fn add_reaction(
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ReactionRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !REACTION_KINDS.contains(&payload.kind.as_str()) {
        return Err(AppError::bad_request("Invalid reaction type"));
    }

    let service = EngagementService::new(state.db.clone());
    let outcome = service
        .add_reaction(&user, id, &payload.kind)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to add reaction");
            AppError::internal("failed to add reaction")
        })?;

    match outcome {
        AddReactionOutcome::ShoutoutNotFound => Err(AppError::not_found("Shoutout not found")),
        AddReactionOutcome::NoOp => Ok(success_message("Reaction already exists")),
        AddReactionOutcome::Replaced => Ok(success_message("Reaction updated successfully")),
        AddReactionOutcome::Added => Ok(success_message("Reaction added successfully")),
    }
}

pub async fn remove_reaction(
    AuthUser(user): AuthUser,
    Path((id, kind)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let removed = service
        .remove_reaction(user.id, id, &kind)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to remove reaction");
            AppError::internal("failed to remove reaction")
        })?;

    if !removed {
        return Err(AppError::not_found("Reaction not found"));
    }
    Ok(success_message("Reaction removed successfully"))
}

#[derive(Deserialize)]
pub struct ReactionListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn list_reactions(
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<ReactionListQuery>,
) -> Result<Json<ApiResponse<ReactionSummary>>, AppError> {
    if let Some(kind) = &query.kind {
        if !REACTION_KINDS.contains(&kind.as_str()) {
            return Err(AppError::bad_request("Invalid reaction type"));
        }
    }

    let service = EngagementService::new(state.db.clone());
    let summary = service
        .reaction_summary(id, query.kind.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to list reactions");
            AppError::internal("failed to list reactions")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    Ok(success("Reactions retrieved", summary))
}

// ============================================================================
// Admin
// ============================================================================

pub async fn admin_list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<User>>>, AppError> {
    let service = AdminService::new(state.db.clone());
    let users = service.list_all_users().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list users");
        AppError::internal("failed to list users")
    })?;
    Ok(success("Users retrieved", users))
}

pub async fn admin_analytics(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Analytics>>, AppError> {
    let service = AdminService::new(state.db.clone());
    let analytics = service.analytics().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to compute analytics");
        AppError::internal("failed to compute analytics")
    })?;
    Ok(success("Analytics retrieved", analytics))
}

pub async fn leaderboard(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Leaderboard>>, AppError> {
    let service = AdminService::new(state.db.clone());
    let leaderboard = service.leaderboard().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to compute leaderboard");
        AppError::internal("failed to compute leaderboard")
    })?;
    Ok(success("Leaderboard retrieved", leaderboard))
}

pub async fn report_shoutout(
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ReportRequest>,
) -> Result<Json<ApiResponse<Report>>, AppError> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::bad_request("Report reason cannot be empty"));
    }

    let service = ModerationService::new(state.db.clone());
    let report = service
        .report_shoutout(user.id, id, payload.reason.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to report shoutout");
            AppError::internal("failed to report shoutout")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    Ok(success("Shoutout reported successfully", report))
}

#[derive(Deserialize)]
pub struct StatusFilterQuery {
    pub status: Option<String>,
}

pub async fn admin_list_reports(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<StatusFilterQuery>,
) -> Result<Json<ApiResponse<Vec<Report>>>, AppError> {
    let service = ModerationService::new(state.db.clone());
    let reports = service
        .list_reports(query.status.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list reports");
            AppError::internal("failed to list reports")
        })?;
    Ok(success("Reports retrieved", reports))
}

pub async fn admin_list_comment_reports(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<StatusFilterQuery>,
) -> Result<Json<ApiResponse<Vec<CommentReport>>>, AppError> {
    let service = ModerationService::new(state.db.clone());
    let reports = service
        .list_comment_reports(query.status.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list comment reports");
            AppError::internal("failed to list comment reports")
        })?;
    Ok(success("Comment reports retrieved", reports))
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub action: String,
}

fn validate_decision_action(action: &str) -> Result<String, AppError> {
    let action = action.trim().to_lowercase();
    if action != "approved" && action != "rejected" {
        return Err(AppError::bad_request("Invalid action"));
    }
    Ok(action)
}

pub async fn admin_resolve_report(
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let action = validate_decision_action(&payload.action)?;

    let service = ModerationService::new(state.db.clone());
    let outcome = service
        .resolve_report(admin.id, id, &action)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, report_id = %id, "failed to resolve report");
            AppError::internal("failed to resolve report")
        })?;

    match outcome {
        ResolveOutcome::NotFound => Err(AppError::not_found("Report not found")),
        ResolveOutcome::AlreadyProcessed => Err(AppError::bad_request("Report already processed")),
        ResolveOutcome::Resolved => Ok(success_message(format!("Report {} successfully", action))),
    }
}

pub async fn admin_resolve_comment_report(
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let action = validate_decision_action(&payload.action)?;

    let service = ModerationService::new(state.db.clone());
    let outcome = service
        .resolve_comment_report(admin.id, id, &action)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, report_id = %id, "failed to resolve comment report");
            AppError::internal("failed to resolve comment report")
        })?;

    match outcome {
        ResolveOutcome::NotFound => Err(AppError::not_found("Comment report not found")),
        ResolveOutcome::AlreadyProcessed => {
            Err(AppError::bad_request("Comment report already processed"))
        }
        ResolveOutcome::Resolved => Ok(success_message(format!(
            "Comment report {} successfully",
            action
        ))),
    }
}

pub async fn admin_list_department_requests(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<StatusFilterQuery>,
) -> Result<Json<ApiResponse<Vec<DepartmentChangeRequest>>>, AppError> {
    let service = AdminService::new(state.db.clone());
    let requests = service
        .list_department_change_requests(query.status.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list department change requests");
            AppError::internal("failed to list department change requests")
        })?;
    Ok(success("Department change requests retrieved", requests))
}

pub async fn admin_decide_department_request(
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<DepartmentChangeRequest>>, AppError> {
    let action = validate_decision_action(&payload.action)?;

    let service = AdminService::new(state.db.clone());
    let outcome = service
        .decide_department_change(&admin, id, &action)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, request_id = %id, "failed to decide department change");
            AppError::internal("failed to decide department change")
        })?;

    match outcome {
        DecideOutcome::NotFound => Err(AppError::not_found("Department change request not found")),
        DecideOutcome::AlreadyProcessed => Err(AppError::bad_request("Request already processed")),
        DecideOutcome::HrRequired => {
            Err(AppError::forbidden("Only HR members can be granted admin access"))
        }
        DecideOutcome::Decided(request) => {
            Ok(success(format!("Request {} successfully", action), request))
        }
    }
}

pub async fn admin_list_role_requests(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<StatusFilterQuery>,
) -> Result<Json<ApiResponse<Vec<RoleChangeRequest>>>, AppError> {
    let service = AdminService::new(state.db.clone());
    let requests = service
        .list_role_change_requests(query.status.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list role change requests");
            AppError::internal("failed to list role change requests")
        })?;
    Ok(success("Role change requests retrieved", requests))
}

pub async fn admin_decide_role_request(
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<RoleChangeRequest>>, AppError> {
    let action = validate_decision_action(&payload.action)?;

    let service = AdminService::new(state.db.clone());
    let outcome = service
        .decide_role_change(&admin, id, &action)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, request_id = %id, "failed to decide role change");
            AppError::internal("failed to decide role change")
        })?;

    match outcome {
        DecideOutcome::NotFound => Err(AppError::not_found("Role change request not found")),
        DecideOutcome::AlreadyProcessed => Err(AppError::bad_request("Request already processed")),
        DecideOutcome::HrRequired => {
            Err(AppError::forbidden("Only HR members can be granted admin access"))
        }
        DecideOutcome::Decided(request) => {
            Ok(success(format!("Request {} successfully", action), request))
        }
    }
}

pub async fn admin_delete_shoutout(
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let service = ModerationService::new(state.db.clone());
    let urls = service
        .admin_delete_shoutout(admin.id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, shoutout_id = %id, "failed to delete shoutout");
            AppError::internal("failed to delete shoutout")
        })?
        .ok_or_else(|| AppError::not_found("Shoutout not found"))?;

    remove_upload_files(&state.upload_dir, &urls).await;

    Ok(success_message("Shoutout deleted successfully"))
}

#[derive(Deserialize)]
pub struct AdminLogQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn admin_list_logs(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AdminLogQuery>,
) -> Result<Json<ApiResponse<Vec<AdminLogEntry>>>, AppError> {
    let limit = query.limit.unwrap_or(100);
    if !(1..=500).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 500"));
    }
    let offset = query.offset.unwrap_or(0).max(0);

    let service = ModerationService::new(state.db.clone());
    let logs = service.list_admin_logs(limit, offset).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list admin logs");
        AppError::internal("failed to list admin logs")
    })?;
    Ok(success("Admin logs retrieved", logs))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

fn csv_download(filename: &str, data: Vec<u8>) -> ([(header::HeaderName, String); 2], Vec<u8>) {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        data,
    )
}

pub async fn admin_export_logs(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<([(header::HeaderName, String); 2], Vec<u8>), AppError> {
    match query.format.as_deref().unwrap_or("csv") {
        "csv" => {}
        "pdf" => return Err(AppError::not_implemented("pdf export not yet available")),
        _ => return Err(AppError::bad_request("Unsupported export format")),
    }

    let service = AdminService::new(state.db.clone());
    let data = service.export_admin_logs_csv().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to export admin logs");
        AppError::internal("failed to export admin logs")
    })?;

    Ok(csv_download("admin_logs.csv", data))
}

pub async fn admin_export_reports(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<([(header::HeaderName, String); 2], Vec<u8>), AppError> {
    match query.format.as_deref().unwrap_or("csv") {
        "csv" => {}
        "pdf" => return Err(AppError::not_implemented("pdf export not yet available")),
        _ => return Err(AppError::bad_request("Unsupported export format")),
    }

    let service = AdminService::new(state.db.clone());
    let data = service.export_reports_csv().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to export reports");
        AppError::internal("failed to export reports")
    })?;

    Ok(csv_download("reports.csv", data))
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Deserialize)]
pub struct NotificationListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

pub async fn list_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<ApiResponse<NotificationList>>, AppError> {
    let limit = query.limit.unwrap_or(20);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let offset = query.offset.unwrap_or(0).max(0);

    let service = NotificationService::new(state.db.clone());
    let (notifications, unread_count) = service
        .list(user.id, limit, offset, query.unread_only)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    Ok(success(
        "Notifications retrieved",
        NotificationList {
            notifications,
            unread_count,
        },
    ))
}

#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub ids: Option<Vec<Uuid>>,
}

pub async fn mark_notifications_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service
        .mark_read(user.id, payload.ids)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to mark notifications read");
            AppError::internal("failed to mark notifications read")
        })?;

    if updated == 0 {
        return Err(AppError::not_found("No notifications found"));
    }
    Ok(success("Notifications marked as read", json!({ "updated": updated })))
}

pub async fn mark_all_notifications_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service.mark_all_read(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to mark notifications read");
        AppError::internal("failed to mark notifications read")
    })?;
    Ok(success("Notifications marked as read", json!({ "updated": updated })))
}

pub async fn delete_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let deleted = service.delete_all(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to delete notifications");
        AppError::internal("failed to delete notifications")
    })?;
    Ok(success("Notifications cleared", json!({ "deleted": deleted })))
}

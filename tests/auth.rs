//! Auth Flow Tests
//!
//! Registration gates, the email/company verification pipeline, login
//! gating, token refresh, and password resets.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;
use uuid::Uuid;

use bragboard::app::auth::hash_token;

// ===========================================================================
// Registration
// ===========================================================================

#[tokio::test]
async fn register_creates_inactive_user_with_verification_token() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "name": "Reg One",
                "email": "reg_one@example.com",
                "password": "supersecret1",
                "department": "Engineering",
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.message().contains("Registration successful"));
    assert_eq!(resp.data()["requires_verification"], json!(true));

    let row: (bool, bool, bool) = sqlx::query_as(
        "SELECT is_active, email_verified, company_verified FROM users WHERE email = $1",
    )
    .bind("reg_one@example.com")
    .fetch_one(app.pool())
    .await
    .expect("user not created");
    assert_eq!(row, (false, false, false));

    let tokens: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM email_verifications ev \
         JOIN users u ON u.id = ev.user_id WHERE u.email = $1",
    )
    .bind("reg_one@example.com")
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(tokens, 1);
}

#[tokio::test]
async fn register_rejects_empty_fields() {
    let app = app().await;

    for body in [
        json!({"name": " ", "email": "a@b.c", "password": "passw0rd1", "department": "Eng"}),
        json!({"name": "A", "email": " ", "password": "passw0rd1", "department": "Eng"}),
        json!({"name": "A", "email": "a@b.c", "password": " ", "department": "Eng"}),
        json!({"name": "A", "email": "a@b.c", "password": "passw0rd1", "department": " "}),
    ] {
        let resp = app.post_json("/api/auth/register", body, None).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn register_rejects_unknown_role() {
    let app = app().await;
    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "name": "Bad Role",
                "email": "bad_role@example.com",
                "password": "supersecret1",
                "department": "Engineering",
                "role": "superuser",
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_admin_outside_hr_rejected() {
    let app = app().await;
    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "name": "Wannabe Admin",
                "email": "wannabe_admin@example.com",
                "password": "supersecret1",
                "department": "Engineering",
                "role": "admin",
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn register_admin_in_hr_allowed() {
    let app = app().await;
    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "name": "HR Admin",
                "email": "hr_admin_reg@example.com",
                "password": "supersecret1",
                "department": "HR",
                "role": "admin",
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn register_duplicate_email_conflict() {
    let app = app().await;
    let body = json!({
        "name": "Dup",
        "email": "dup_email@example.com",
        "password": "supersecret1",
        "department": "Engineering",
    });

    let resp = app.post_json("/api/auth/register", body.clone(), None).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.post_json("/api/auth/register", body, None).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.message(), "Email already registered");
}

// ===========================================================================
// Email verification + company approval
// ===========================================================================

async fn register_and_get_user_id(suffix: &str) -> Uuid {
    let app = app().await;
    let email = format!("verify_{}@example.com", suffix);
    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "name": format!("Verify {}", suffix),
                "email": email,
                "password": "supersecret1",
                "department": "Engineering",
            }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(format!("verify_{}@example.com", suffix))
        .fetch_one(app.pool())
        .await
        .unwrap()
}

async fn arm_verification_token(user_id: Uuid, token: &str) {
    let app = app().await;
    sqlx::query(
        "INSERT INTO email_verifications (user_id, token_hash, expires_at) \
         VALUES ($1, $2, now() + interval '1 day')",
    )
    .bind(user_id)
    .bind(hash_token(token))
    .execute(app.pool())
    .await
    .unwrap();
}

async fn arm_approval_token(user_id: Uuid, token: &str) {
    let app = app().await;
    sqlx::query(
        "UPDATE company_approval_requests SET token_hash = $1 WHERE user_id = $2",
    )
    .bind(hash_token(token))
    .bind(user_id)
    .execute(app.pool())
    .await
    .unwrap();
}

#[tokio::test]
async fn verify_email_opens_company_approval() {
    let app = app().await;
    let user_id = register_and_get_user_id("approval").await;
    arm_verification_token(user_id, "verify-token-approval").await;

    let resp = app
        .get("/api/auth/verify-email?token=verify-token-approval", None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.message().contains("Waiting for company verification"));

    let (email_verified, is_active): (bool, bool) =
        sqlx::query_as("SELECT email_verified, is_active FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert!(email_verified);
    assert!(!is_active);

    let status: String = sqlx::query_scalar(
        "SELECT status FROM company_approval_requests WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(app.pool())
    .await
    .expect("approval request not created");
    assert_eq!(status, "pending");

    // Login is still gated on company verification.
    let resp = app
        .post_json(
            "/api/auth/login",
            json!({"email": "verify_approval@example.com", "password": "supersecret1"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Waiting for company verification");
}

#[tokio::test]
async fn verify_email_consumed_token_is_idempotent() {
    let app = app().await;
    let user_id = register_and_get_user_id("idem").await;
    arm_verification_token(user_id, "verify-token-idem").await;

    let resp = app
        .get("/api/auth/verify-email?token=verify-token-idem", None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get("/api/auth/verify-email?token=verify-token-idem", None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Email already verified");
}

#[tokio::test]
async fn verify_email_rejects_unknown_and_expired_tokens() {
    let app = app().await;

    let resp = app
        .get("/api/auth/verify-email?token=no-such-token", None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let user_id = register_and_get_user_id("expired").await;
    sqlx::query(
        "INSERT INTO email_verifications (user_id, token_hash, expires_at) \
         VALUES ($1, $2, now() - interval '1 hour')",
    )
    .bind(user_id)
    .bind(hash_token("verify-token-expired"))
    .execute(app.pool())
    .await
    .unwrap();

    let resp = app
        .get("/api/auth/verify-email?token=verify-token-expired", None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Verification token has expired");
}

#[tokio::test]
async fn company_approval_approve_activates_user() {
    let app = app().await;
    let user_id = register_and_get_user_id("approve_flow").await;
    arm_verification_token(user_id, "verify-token-approve-flow").await;
    app.get("/api/auth/verify-email?token=verify-token-approve-flow", None)
        .await;
    arm_approval_token(user_id, "approval-token-approve").await;

    let resp = app
        .get(
            "/api/auth/company-approval?token=approval-token-approve&action=approve",
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body_text().contains("User Approved"));

    let (is_active, company_verified): (bool, bool) =
        sqlx::query_as("SELECT is_active, company_verified FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert!(is_active);
    assert!(company_verified);

    // The gate is fully lifted: login now succeeds.
    let resp = app
        .post_json(
            "/api/auth/login",
            json!({"email": "verify_approve_flow@example.com", "password": "supersecret1"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.data()["access_token"].as_str().is_some());
    assert!(resp.data()["refresh_token"].as_str().is_some());

    // A decided request is not reopened.
    let resp = app
        .get(
            "/api/auth/company-approval?token=approval-token-approve&action=reject",
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body_text().contains("Request Already"));
}

#[tokio::test]
async fn company_approval_reject_removes_user() {
    let app = app().await;
    let user_id = register_and_get_user_id("reject_flow").await;
    arm_verification_token(user_id, "verify-token-reject-flow").await;
    app.get("/api/auth/verify-email?token=verify-token-reject-flow", None)
        .await;
    arm_approval_token(user_id, "approval-token-reject").await;

    let resp = app
        .get(
            "/api/auth/company-approval?token=approval-token-reject&action=reject",
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body_text().contains("User Rejected"));

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn company_approval_expired_link() {
    let app = app().await;
    let user_id = register_and_get_user_id("expired_link").await;
    arm_verification_token(user_id, "verify-token-expired-link").await;
    app.get("/api/auth/verify-email?token=verify-token-expired-link", None)
        .await;
    arm_approval_token(user_id, "approval-token-expired").await;
    sqlx::query(
        "UPDATE company_approval_requests SET expires_at = now() - interval '1 day' \
         WHERE user_id = $1",
    )
    .bind(user_id)
    .execute(app.pool())
    .await
    .unwrap();

    let resp = app
        .get(
            "/api/auth/company-approval?token=approval-token-expired&action=approve",
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body_text().contains("Link Expired"));

    let status: String = sqlx::query_scalar(
        "SELECT status FROM company_approval_requests WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(status, "expired");
}

#[tokio::test]
async fn company_approval_invalid_action() {
    let app = app().await;
    let resp = app
        .get("/api/auth/company-approval?token=whatever&action=maybe", None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body_text().contains("Invalid action"));
}

// ===========================================================================
// Login
// ===========================================================================

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = app().await;
    let user = app.create_user("login_bad").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({"email": user.email, "password": "wrong-password"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({"email": "ghost@example.com", "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_requires_email_verification_first() {
    let app = app().await;
    app.post_json(
        "/api/auth/register",
        json!({
            "name": "Unverified",
            "email": "unverified_login@example.com",
            "password": "supersecret1",
            "department": "Engineering",
        }),
        None,
    )
    .await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({"email": "unverified_login@example.com", "password": "supersecret1"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Please verify your email");
}

// ===========================================================================
// Refresh
// ===========================================================================

#[tokio::test]
async fn refresh_returns_new_pair() {
    let app = app().await;
    let user = app.create_user("refresh_ok").await;

    let resp = app
        .post_json(
            "/api/auth/refresh",
            json!({"refresh_token": user.refresh_token}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.data()["access_token"].as_str().is_some());
    assert_eq!(resp.data()["token_type"], json!("bearer"));
}

#[tokio::test]
async fn refresh_rejects_access_token_and_garbage() {
    let app = app().await;
    let user = app.create_user("refresh_bad").await;

    let resp = app
        .post_json(
            "/api/auth/refresh",
            json!({"refresh_token": user.access_token}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .post_json(
            "/api/auth/refresh",
            json!({"refresh_token": "not.a.token"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Password reset
// ===========================================================================

#[tokio::test]
async fn forgot_password_is_generic_for_unknown_email() {
    let app = app().await;
    let resp = app
        .post_json(
            "/api/auth/forgot-password",
            json!({"email": "nobody_here@example.com"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.message().contains("If that email exists"));
}

#[tokio::test]
async fn reset_password_consumes_token_once() {
    let app = app().await;
    let user = app.create_user("reset_once").await;
    sqlx::query(
        "INSERT INTO password_resets (user_id, token_hash, expires_at) \
         VALUES ($1, $2, now() + interval '1 hour')",
    )
    .bind(user.id)
    .bind(hash_token("reset-token-once"))
    .execute(app.pool())
    .await
    .unwrap();

    let resp = app
        .post_json(
            "/api/auth/reset-password",
            json!({"token": "reset-token-once", "new_password": "brandnewpass1"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    // New password works, old one does not.
    let resp = app
        .post_json(
            "/api/auth/login",
            json!({"email": user.email, "password": "brandnewpass1"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let resp = app
        .post_json(
            "/api/auth/login",
            json!({"email": user.email, "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    // Single use.
    let resp = app
        .post_json(
            "/api/auth/reset-password",
            json!({"token": "reset-token-once", "new_password": "anotherpass1"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Reset token already used");
}

#[tokio::test]
async fn reset_password_rejects_expired_token() {
    let app = app().await;
    let user = app.create_user("reset_expired").await;
    sqlx::query(
        "INSERT INTO password_resets (user_id, token_hash, expires_at) \
         VALUES ($1, $2, now() - interval '1 minute')",
    )
    .bind(user.id)
    .bind(hash_token("reset-token-expired"))
    .execute(app.pool())
    .await
    .unwrap();

    let resp = app
        .post_json(
            "/api/auth/reset-password",
            json!({"token": "reset-token-expired", "new_password": "brandnewpass1"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.message(), "Reset token has expired");
}

use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn misc() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh_token))
        .route("/api/auth/verify-email", get(handlers::verify_email))
        .route("/api/auth/company-approval", get(handlers::company_approval))
        .route("/api/auth/forgot-password", post(handlers::forgot_password))
        .route("/api/auth/reset-password", post(handlers::reset_password))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(handlers::get_me))
        .route("/api/users/me", put(handlers::update_me))
        .route(
            "/api/users/me/department-change-requests",
            get(handlers::list_my_department_requests),
        )
        .route(
            "/api/users/me/role-change-requests",
            get(handlers::list_my_role_requests),
        )
        .route("/api/users/me/avatar", post(handlers::upload_avatar))
        .route("/api/users/search", get(handlers::search_users))
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/:id", get(handlers::get_user))
}

pub fn shoutouts() -> Router<AppState> {
    Router::new()
        .route("/api/shoutouts", post(handlers::create_shoutout))
        .route("/api/shoutouts", get(handlers::list_shoutouts))
        .route("/api/shoutouts/:id", get(handlers::get_shoutout))
        .route("/api/shoutouts/:id", put(handlers::update_shoutout))
        .route("/api/shoutouts/:id", delete(handlers::delete_shoutout))
        .route("/api/shoutouts/:id/comments", post(handlers::create_comment))
        .route("/api/shoutouts/:id/comments", get(handlers::list_comments))
        .route(
            "/api/shoutouts/comments/:comment_id",
            put(handlers::update_comment),
        )
        .route(
            "/api/shoutouts/comments/:comment_id",
            delete(handlers::delete_comment),
        )
        .route(
            "/api/shoutouts/comments/:comment_id/report",
            post(handlers::report_comment),
        )
        .route("/api/shoutouts/:id/reactions", post(handlers::add_reaction))
        .route("/api/shoutouts/:id/reactions", get(handlers::list_reactions))
        .route(
            "/api/shoutouts/:id/reactions/:kind",
            delete(handlers::remove_reaction),
        )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(handlers::admin_list_users))
        .route("/api/admin/analytics", get(handlers::admin_analytics))
        .route("/api/admin/leaderboard", get(handlers::leaderboard))
        .route(
            "/api/admin/shoutouts/:id/report",
            post(handlers::report_shoutout),
        )
        .route("/api/admin/reports", get(handlers::admin_list_reports))
        .route(
            "/api/admin/comment-reports",
            get(handlers::admin_list_comment_reports),
        )
        .route(
            "/api/admin/reports/:id/resolve",
            post(handlers::admin_resolve_report),
        )
        .route(
            "/api/admin/comment-reports/:id/resolve",
            post(handlers::admin_resolve_comment_report),
        )
        .route(
            "/api/admin/department-change-requests",
            get(handlers::admin_list_department_requests),
        )
        .route(
            "/api/admin/department-change-requests/:id/decision",
            post(handlers::admin_decide_department_request),
        )
        .route(
            "/api/admin/role-change-requests",
            get(handlers::admin_list_role_requests),
        )
        .route(
            "/api/admin/role-change-requests/:id/decision",
            post(handlers::admin_decide_role_request),
        )
        .route(
            "/api/admin/shoutouts/:id",
            delete(handlers::admin_delete_shoutout),
        )
        .route("/api/admin/logs", get(handlers::admin_list_logs))
        .route("/api/admin/logs/export", get(handlers::admin_export_logs))
        .route(
            "/api/admin/reports/export",
            get(handlers::admin_export_reports),
        )
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/mark-read",
            post(handlers::mark_notifications_read),
        )
        .route(
            "/api/notifications/mark-all-read",
            post(handlers::mark_all_notifications_read),
        )
        .route("/api/notifications", delete(handlers::delete_notifications))
}

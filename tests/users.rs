//! User Profile Tests
//!
//! Profile reads, the department/role change-request workflow, search, and
//! listings.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Profile
// ===========================================================================

#[tokio::test]
async fn get_me_returns_profile() {
    let app = app().await;
    let user = app.create_user("profile_me").await;

    let resp = app.get("/api/users/me", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["email"], json!(user.email));
    assert_eq!(data["department"], json!("Engineering"));
    assert_eq!(data["pending_department"], json!(null));
    assert_eq!(data["pending_role"], json!(null));
}

#[tokio::test]
async fn me_requires_authentication() {
    let app = app().await;
    let resp = app.get("/api/users/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get("/api/users/me", Some("garbage-token")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_name_applies_directly() {
    let app = app().await;
    let user = app.create_user("rename").await;

    let resp = app
        .put_json(
            "/api/users/me",
            json!({"name": "Renamed Person"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["name"], json!("Renamed Person"));

    let resp = app
        .put_json(
            "/api/users/me",
            json!({"name": "  "}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Department change requests
// ===========================================================================

#[tokio::test]
async fn department_change_opens_pending_request() {
    let app = app().await;
    let user = app.create_user("dept_change").await;
    let admin = app.create_admin("dept_change_admin").await;

    let resp = app
        .put_json(
            "/api/users/me",
            json!({"department": "Marketing"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    // The department itself has not moved yet.
    assert_eq!(resp.data()["department"], json!("Engineering"));
    assert_eq!(resp.data()["pending_department"], json!("Marketing"));

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM department_change_requests \
         WHERE user_id = $1 AND status = 'pending'",
    )
    .bind(user.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(pending, 1);

    // Admins got a fan-out notification attributed to the requester.
    let notified: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE user_id = $1 AND actor_id = $2 \
           AND event_type = 'department_change.requested'",
    )
    .bind(admin.id)
    .bind(user.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(notified, 1);
}

#[tokio::test]
async fn second_department_request_updates_pending_row() {
    let app = app().await;
    let user = app.create_user("dept_update").await;

    app.put_json(
        "/api/users/me",
        json!({"department": "Marketing"}),
        Some(&user.access_token),
    )
    .await;
    app.put_json(
        "/api/users/me",
        json!({"department": "Sales"}),
        Some(&user.access_token),
    )
    .await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT requested_department FROM department_change_requests \
         WHERE user_id = $1 AND status = 'pending'",
    )
    .bind(user.id)
    .fetch_all(app.pool())
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "Sales");
}

#[tokio::test]
async fn list_my_department_requests() {
    let app = app().await;
    let user = app.create_user("dept_list").await;

    app.put_json(
        "/api/users/me",
        json!({"department": "Marketing"}),
        Some(&user.access_token),
    )
    .await;

    let resp = app
        .get(
            "/api/users/me/department-change-requests",
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data.as_array().unwrap().len(), 1);
    assert_eq!(data[0]["requested_department"], json!("Marketing"));
    assert_eq!(data[0]["status"], json!("pending"));
}

// ===========================================================================
// Role change requests
// ===========================================================================

#[tokio::test]
async fn role_change_to_admin_requires_hr() {
    let app = app().await;
    let user = app.create_user("role_non_hr").await;

    let resp = app
        .put_json(
            "/api/users/me",
            json!({"role": "admin"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hr_member_can_request_admin_role() {
    let app = app().await;
    let user = app
        .create_user_in_department("role_hr", "HR", "employee")
        .await;

    let resp = app
        .put_json(
            "/api/users/me",
            json!({"role": "admin"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["pending_role"], json!("admin"));
    // Role only changes on approval.
    assert_eq!(resp.data()["role"], json!("employee"));
}

#[tokio::test]
async fn role_change_rejects_unknown_role() {
    let app = app().await;
    let user = app.create_user("role_invalid").await;

    let resp = app
        .put_json(
            "/api/users/me",
            json!({"role": "owner"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Search & listings
// ===========================================================================

#[tokio::test]
async fn search_matches_active_users_by_name() {
    let app = app().await;
    let searcher = app.create_user("searcher").await;
    app.create_user("findable_zeta").await;

    let resp = app
        .get(
            "/api/users/search?query=findable_zeta",
            Some(&searcher.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let results = resp.data();
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert!(results[0]["name"]
        .as_str()
        .unwrap()
        .contains("findable_zeta"));
}

#[tokio::test]
async fn list_users_filters_by_department() {
    let app = app().await;
    let viewer = app.create_user("list_viewer").await;
    app.create_user_in_department("list_sales_a", "UniqueSalesDept", "employee")
        .await;
    app.create_user_in_department("list_sales_b", "UniqueSalesDept", "employee")
        .await;

    let resp = app
        .get(
            "/api/users?department=UniqueSalesDept",
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn get_user_by_id() {
    let app = app().await;
    let viewer = app.create_user("get_viewer").await;
    let target = app.create_user("get_target").await;

    let resp = app
        .get(
            &format!("/api/users/{}", target.id),
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["id"], json!(target.id));

    let resp = app
        .get(
            &format!("/api/users/{}", Uuid::new_v4()),
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

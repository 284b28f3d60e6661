//! Notification Tests
//!
//! Listing with unread counts, read marking, and clearing.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

async fn seed_notification(user_id: Uuid, actor_id: Uuid, event_type: &str) -> Uuid {
    let app = app().await;
    sqlx::query_scalar(
        "INSERT INTO notifications (user_id, actor_id, event_type, title, message, payload) \
         VALUES ($1, $2, $3, 'Test notification', 'something happened', '{\"redirect_url\": \"/feed\"}'::jsonb) \
         RETURNING id",
    )
    .bind(user_id)
    .bind(actor_id)
    .bind(event_type)
    .fetch_one(app.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn list_notifications_with_unread_count() {
    let app = app().await;
    let user = app.create_user("ntf_list").await;
    let actor = app.create_user("ntf_list_actor").await;

    seed_notification(user.id, actor.id, "shoutout.received").await;
    seed_notification(user.id, actor.id, "comment.new").await;

    let resp = app.get("/api/notifications", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["unread_count"], json!(2));
    let items = data["notifications"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    // Actor summary is resolved for display.
    assert_eq!(items[0]["actor"]["id"], json!(actor.id));
    assert_eq!(items[0]["is_read"], json!(false));
    assert_eq!(items[0]["payload"]["redirect_url"], json!("/feed"));
}

#[tokio::test]
async fn unread_only_filter() {
    let app = app().await;
    let user = app.create_user("ntf_unread").await;
    let actor = app.create_user("ntf_unread_actor").await;

    let read_id = seed_notification(user.id, actor.id, "comment.new").await;
    seed_notification(user.id, actor.id, "reaction.new").await;
    sqlx::query("UPDATE notifications SET is_read = TRUE, read_at = now() WHERE id = $1")
        .bind(read_id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app
        .get("/api/notifications?unread_only=true", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["notifications"].as_array().unwrap().len(), 1);
    assert_eq!(data["unread_count"], json!(1));
}

#[tokio::test]
async fn mark_selected_notifications_read() {
    let app = app().await;
    let user = app.create_user("ntf_mark").await;
    let actor = app.create_user("ntf_mark_actor").await;

    let first = seed_notification(user.id, actor.id, "comment.new").await;
    seed_notification(user.id, actor.id, "reaction.new").await;

    let resp = app
        .post_json(
            "/api/notifications/mark-read",
            json!({"ids": [first]}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["updated"], json!(1));

    let (is_read, has_read_at): (bool, bool) = sqlx::query_as(
        "SELECT is_read, read_at IS NOT NULL FROM notifications WHERE id = $1",
    )
    .bind(first)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert!(is_read);
    assert!(has_read_at);

    let unread: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
    )
    .bind(user.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(unread, 1);
}

#[tokio::test]
async fn mark_read_without_matches_is_not_found() {
    let app = app().await;
    let user = app.create_user("ntf_none").await;

    let resp = app
        .post_json(
            "/api/notifications/mark-read",
            json!({"ids": [Uuid::new_v4()]}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mark_all_read_and_clear() {
    let app = app().await;
    let user = app.create_user("ntf_all").await;
    let actor = app.create_user("ntf_all_actor").await;

    seed_notification(user.id, actor.id, "comment.new").await;
    seed_notification(user.id, actor.id, "reaction.new").await;
    seed_notification(user.id, actor.id, "shoutout.received").await;

    let resp = app
        .post_json(
            "/api/notifications/mark-all-read",
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["updated"], json!(3));

    let resp = app.get("/api/notifications", Some(&user.access_token)).await;
    assert_eq!(resp.data()["unread_count"], json!(0));

    let resp = app.delete("/api/notifications", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["deleted"], json!(3));

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn notifications_are_scoped_to_their_user() {
    let app = app().await;
    let user_a = app.create_user("ntf_scope_a").await;
    let user_b = app.create_user("ntf_scope_b").await;

    let foreign = seed_notification(user_a.id, user_b.id, "comment.new").await;

    // user_b cannot mark user_a's notification read.
    let resp = app
        .post_json(
            "/api/notifications/mark-read",
            json!({"ids": [foreign]}),
            Some(&user_b.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app.get("/api/notifications", Some(&user_b.access_token)).await;
    assert!(resp.data()["notifications"].as_array().unwrap().is_empty());
}

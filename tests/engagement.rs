//! Comment & Reaction Tests
//!
//! Comment lifecycle with mentions and reports, and the one-reaction-per-
//! user upsert semantics.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Comments
// ===========================================================================

#[tokio::test]
async fn comment_notifies_sender_and_mentions() {
    let app = app().await;
    let sender = app
        .create_user_in_department("cm_sender", "CommentDept", "employee")
        .await;
    let commenter = app
        .create_user_in_department("cm_commenter", "CommentDept", "employee")
        .await;
    let mentioned = app
        .create_user_in_department("cm_mentioned", "CommentDept", "employee")
        .await;

    let shoutout_id = app.create_shoutout(sender.id, &[commenter.id]).await;

    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/comments", shoutout_id),
            json!({"content": "so deserved!", "mentions": [mentioned.id]}),
            Some(&commenter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["content"], json!("so deserved!"));
    assert_eq!(data["user"]["id"], json!(commenter.id));
    assert_eq!(data["mentions"].as_array().unwrap().len(), 1);
    assert_eq!(data["mentions"][0]["id"], json!(mentioned.id));

    let sender_notes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE user_id = $1 AND actor_id = $2 AND event_type = 'comment.new'",
    )
    .bind(sender.id)
    .bind(commenter.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(sender_notes, 1);

    let mention_notes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE user_id = $1 AND actor_id = $2 AND event_type = 'comment.mention'",
    )
    .bind(mentioned.id)
    .bind(commenter.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(mention_notes, 1);
}

#[tokio::test]
async fn comment_parses_mention_markup_fallback() {
    let app = app().await;
    let sender = app
        .create_user_in_department("cmm_sender", "CommentMarkup", "employee")
        .await;
    let commenter = app
        .create_user_in_department("cmm_commenter", "CommentMarkup", "employee")
        .await;
    let mentioned = app
        .create_user_in_department("cmm_mentioned", "CommentMarkup", "employee")
        .await;

    let shoutout_id = app.create_shoutout(sender.id, &[commenter.id]).await;

    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/comments", shoutout_id),
            json!({"content": format!("props to @[{}]({})", mentioned.name, mentioned.id)}),
            Some(&commenter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["mentions"][0]["id"], json!(mentioned.id));
}

#[tokio::test]
async fn comment_rejects_empty_content_and_missing_shoutout() {
    let app = app().await;
    let user = app.create_user("cm_empty").await;

    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/comments", Uuid::new_v4()),
            json!({"content": "hello"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let other = app.create_user("cm_empty_peer").await;
    let shoutout_id = app.create_shoutout(user.id, &[other.id]).await;
    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/comments", shoutout_id),
            json!({"content": "   "}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comment_update_and_delete_authorization() {
    let app = app().await;
    let sender = app
        .create_user_in_department("cmu_sender", "CommentAuth", "employee")
        .await;
    let commenter = app
        .create_user_in_department("cmu_commenter", "CommentAuth", "employee")
        .await;
    let admin = app.create_admin("cmu_admin").await;

    let shoutout_id = app.create_shoutout(sender.id, &[commenter.id]).await;
    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/comments", shoutout_id),
            json!({"content": "first!"}),
            Some(&commenter.access_token),
        )
        .await;
    let comment_id = resp.data()["id"].as_str().unwrap().to_string();

    // Only the author can edit.
    let resp = app
        .put_json(
            &format!("/api/shoutouts/comments/{}", comment_id),
            json!({"content": "edited"}),
            Some(&sender.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .put_json(
            &format!("/api/shoutouts/comments/{}", comment_id),
            json!({"content": "edited"}),
            Some(&commenter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["content"], json!("edited"));

    // Admins can delete someone else's comment.
    let resp = app
        .delete(
            &format!("/api/shoutouts/comments/{}", comment_id),
            Some(&admin.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn comment_report_conflicts_on_duplicate() {
    let app = app().await;
    let sender = app
        .create_user_in_department("cr_sender", "CommentReport", "employee")
        .await;
    let author = app
        .create_user_in_department("cr_author", "CommentReport", "employee")
        .await;
    let reporter = app
        .create_user_in_department("cr_reporter", "CommentReport", "employee")
        .await;

    let shoutout_id = app.create_shoutout(sender.id, &[author.id]).await;
    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/comments", shoutout_id),
            json!({"content": "questionable take"}),
            Some(&author.access_token),
        )
        .await;
    let comment_id = resp.data()["id"].as_str().unwrap().to_string();

    // Own comments cannot be reported.
    let resp = app
        .post_json(
            &format!("/api/shoutouts/comments/{}/report", comment_id),
            json!({"reason": "self report"}),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_json(
            &format!("/api/shoutouts/comments/{}/report", comment_id),
            json!({"reason": "inappropriate"}),
            Some(&reporter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.data()["status"], json!("pending"));

    // Reporting the same comment twice by the same reporter conflicts.
    let resp = app
        .post_json(
            &format!("/api/shoutouts/comments/{}/report", comment_id),
            json!({"reason": "still inappropriate"}),
            Some(&reporter.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    // A different reporter is fine.
    let resp = app
        .post_json(
            &format!("/api/shoutouts/comments/{}/report", comment_id),
            json!({"reason": "agreed"}),
            Some(&sender.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

// ===========================================================================
// Reactions
// ===========================================================================

async fn reaction_row(shoutout_id: Uuid, user_id: Uuid) -> Option<String> {
    let app = app().await;
    sqlx::query_scalar(
        "SELECT kind FROM reactions WHERE shoutout_id = $1 AND user_id = $2",
    )
    .bind(shoutout_id)
    .bind(user_id)
    .fetch_optional(app.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn reaction_upsert_keeps_single_row() {
    let app = app().await;
    let sender = app
        .create_user_in_department("rx_sender", "ReactDept", "employee")
        .await;
    let reactor = app
        .create_user_in_department("rx_reactor", "ReactDept", "employee")
        .await;

    let shoutout_id = app.create_shoutout(sender.id, &[reactor.id]).await;
    let path = format!("/api/shoutouts/{}/reactions", shoutout_id);

    // First reaction inserts and notifies the sender.
    let resp = app
        .post_json(&path, json!({"type": "like"}), Some(&reactor.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Reaction added successfully");
    assert_eq!(reaction_row(shoutout_id, reactor.id).await.as_deref(), Some("like"));

    let notes_after_insert: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE user_id = $1 AND actor_id = $2 AND event_type = 'reaction.new'",
    )
    .bind(sender.id)
    .bind(reactor.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(notes_after_insert, 1);

    // Same kind again is a no-op and does not notify.
    let resp = app
        .post_json(&path, json!({"type": "like"}), Some(&reactor.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Reaction already exists");

    // A different kind replaces the existing row.
    let resp = app
        .post_json(&path, json!({"type": "star"}), Some(&reactor.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.message(), "Reaction updated successfully");
    assert_eq!(reaction_row(shoutout_id, reactor.id).await.as_deref(), Some("star"));

    let total_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reactions WHERE shoutout_id = $1 AND user_id = $2",
    )
    .bind(shoutout_id)
    .bind(reactor.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(total_rows, 1, "exactly one reaction per (user, shoutout)");

    let notes_after_all: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE user_id = $1 AND actor_id = $2 AND event_type = 'reaction.new'",
    )
    .bind(sender.id)
    .bind(reactor.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(notes_after_all, 1, "no-op and replace do not notify");
}

#[tokio::test]
async fn reaction_rejects_bad_kind_and_missing_shoutout() {
    let app = app().await;
    let user = app.create_user("rx_invalid").await;

    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/reactions", Uuid::new_v4()),
            json!({"type": "wave"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post_json(
            &format!("/api/shoutouts/{}/reactions", Uuid::new_v4()),
            json!({"type": "like"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reaction_remove_and_summary() {
    let app = app().await;
    let sender = app
        .create_user_in_department("rxs_sender", "ReactSummary", "employee")
        .await;
    let reactor_a = app
        .create_user_in_department("rxs_reactor_a", "ReactSummary", "employee")
        .await;
    let reactor_b = app
        .create_user_in_department("rxs_reactor_b", "ReactSummary", "employee")
        .await;

    let shoutout_id = app.create_shoutout(sender.id, &[reactor_a.id]).await;
    let path = format!("/api/shoutouts/{}/reactions", shoutout_id);

    app.post_json(&path, json!({"type": "clap"}), Some(&reactor_a.access_token))
        .await;
    app.post_json(&path, json!({"type": "clap"}), Some(&reactor_b.access_token))
        .await;

    let resp = app.get(&path, Some(&sender.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let data = resp.data();
    assert_eq!(data["counts"]["clap"], json!(2));
    assert_eq!(data["users"]["clap"].as_array().unwrap().len(), 2);

    // Removing a reaction that is not there is a 404.
    let resp = app
        .delete(
            &format!("/api/shoutouts/{}/reactions/star", shoutout_id),
            Some(&reactor_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .delete(
            &format!("/api/shoutouts/{}/reactions/clap", shoutout_id),
            Some(&reactor_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(reaction_row(shoutout_id, reactor_a.id).await, None);
}

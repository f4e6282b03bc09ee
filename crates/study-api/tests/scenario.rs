use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use study_api::config::Config;
use study_api::{app, AppState, AppStateInner};
use study_db::Database;

fn test_state() -> AppState {
    let config = Config {
        secret_key: "test-secret".into(),
        token_ttl_minutes: 30,
        db_path: ":memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        cors_origins: vec![],
        frontend_url: "http://localhost:3000".into(),
        mail: None,
    };
    AppStateInner::new(Database::open_in_memory().unwrap(), config)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, email: &str, username: &str, password: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["id"].as_i64().unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_study(app: &Router, token: &str, name: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/studies",
        Some(token),
        Some(json!({ "name": name, "description": "shared notes" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create study failed: {body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn full_collaboration_scenario() {
    let app = app::router(test_state());

    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;

    let study = create_study(&app, &alice, "Algo Study").await;

    // The creator is an admin member immediately after creation.
    let (status, body) = send(&app, Method::GET, &format!("/api/studies/{study}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["creator"]["username"], "alice");
    let members = body["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "admin");

    // A post in a single-member study generates no notifications.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Week 1", "content": "binary search drills" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post = body["id"].as_i64().unwrap();

    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&alice), None).await;
    assert_eq!(body["total"], 0);

    // Bob joins and comments on alice's post.
    register(&app, "bob@x.com", "bob", "password2").await;
    let bob = login(&app, "bob@x.com", "password2").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/studies/{study}/members"),
        Some(&alice),
        Some(json!({ "email": "bob@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/comments?post_id={post}"),
        Some(&bob),
        Some(json!({ "content": "nice writeup" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Alice receives exactly one post_comment notification from bob.
    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&alice), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["unread_count"], 1);
    assert_eq!(body["items"][0]["notification_type"], "post_comment");
    assert_eq!(body["items"][0]["from_user"]["username"], "bob");

    // Alice commenting on her own post notifies nobody: comment
    // notifications target only the post's author, and self-notification is
    // suppressed.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/comments?post_id={post}"),
        Some(&alice),
        Some(json!({ "content": "thanks!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&alice), None).await;
    assert_eq!(body["total"], 1);
    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&bob), None).await;
    assert_eq!(body["total"], 0);

    // Mark read flow.
    let (_, body) = send(
        &app,
        Method::GET,
        "/api/notifications/unread-count",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(body["unread_count"], 1);

    let (_, body) = send(
        &app,
        Method::PUT,
        "/api/notifications/read",
        Some(&alice),
        Some(json!({ "notification_ids": null })),
    )
    .await;
    assert_eq!(body["updated_count"], 1);

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/notifications/unread-count",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(body["unread_count"], 0);
}

#[tokio::test]
async fn new_post_fans_out_to_other_members() {
    let app = app::router(test_state());

    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;
    register(&app, "bob@x.com", "bob", "password2").await;
    let bob = login(&app, "bob@x.com", "password2").await;

    let study = create_study(&app, &alice, "Algo Study").await;
    send(
        &app,
        Method::POST,
        &format!("/api/studies/{study}/members"),
        Some(&alice),
        Some(json!({ "email": "bob@x.com" })),
    )
    .await;

    send(
        &app,
        Method::POST,
        &format!("/api/posts?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Week 1", "content": "drills" })),
    )
    .await;

    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&bob), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["notification_type"], "new_post");
    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&alice), None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn bearer_auth_is_required_and_flagged() {
    let app = app::router(test_state());
    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;
    let study = create_study(&app, &alice, "Algo Study").await;

    // Missing token: 401 with WWW-Authenticate.
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/posts/study/{study}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );

    // Malformed scheme and garbage tokens are 401 too.
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/posts/study/{study}"),
        Some("not.a.jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn membership_gating_is_deliberately_asymmetric() {
    let app = app::router(test_state());
    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;
    register(&app, "carol@x.com", "carol", "password3").await;
    let carol = login(&app, "carol@x.com", "password3").await;

    let study = create_study(&app, &alice, "Algo Study").await;
    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Week 1", "content": "drills" })),
    )
    .await;
    let post = body["id"].as_i64().unwrap();

    // List-by-study is member-gated: carol is not a member.
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/posts/study/{study}"),
        Some(&carol),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/issues/study/{study}"),
        Some(&carol),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Detail-by-id is NOT gated, even without authentication. This mirrors
    // the intended design; tightening it is a behavior change.
    let (status, _) = send(&app, Method::GET, &format!("/api/posts/{post}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &format!("/api/studies/{study}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ownership_rules_are_enforced() {
    let app = app::router(test_state());
    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;
    register(&app, "bob@x.com", "bob", "password2").await;
    let bob = login(&app, "bob@x.com", "password2").await;

    let study = create_study(&app, &alice, "Algo Study").await;
    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Week 1", "content": "drills" })),
    )
    .await;
    let post = body["id"].as_i64().unwrap();

    // Bob cannot edit or delete alice's post.
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/posts/{post}"),
        Some(&bob),
        Some(json!({ "title": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/posts/{post}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Bob cannot mutate the study, remove members, or delete it.
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/studies/{study}"),
        Some(&bob),
        Some(json!({ "name": "Bob's Study" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/studies/{study}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The creator cannot remove themselves.
    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&alice), None).await;
    let alice_id = me["id"].as_i64().unwrap();
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/studies/{study}/members/{alice_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comment_parent_is_exactly_one_of_post_or_issue() {
    let app = app::router(test_state());
    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;
    let study = create_study(&app, &alice, "Algo Study").await;

    let (_, post) = send(
        &app,
        Method::POST,
        &format!("/api/posts?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Week 1", "content": "drills" })),
    )
    .await;
    let (_, issue) = send(
        &app,
        Method::POST,
        &format!("/api/issues?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Plan the syllabus" })),
    )
    .await;
    let (post, issue) = (post["id"].as_i64().unwrap(), issue["id"].as_i64().unwrap());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(&alice),
        Some(json!({ "content": "orphan" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/comments?post_id={post}&issue_id={issue}"),
        Some(&alice),
        Some(json!({ "content": "ambiguous" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/comments?issue_id={issue}"),
        Some(&alice),
        Some(json!({ "content": "fine" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn issue_status_is_derived_at_read_time() {
    let state = test_state();
    let app = app::router(state.clone());

    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;
    let study = create_study(&app, &alice, "Algo Study").await;

    let today = Utc::now().date_naive();
    let yesterday = (today - Duration::days(1)).to_string();
    let tomorrow = (today + Duration::days(1)).to_string();

    // In range at creation.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/issues?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Sprint", "start_date": yesterday, "end_date": tomorrow })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "In Progress");
    let issue = body["id"].as_i64().unwrap();

    // Moving the end date into the past closes the issue on the next read.
    let (_, body) = send(
        &app,
        Method::PUT,
        &format!("/api/issues/{issue}"),
        Some(&alice),
        Some(json!({ "end_date": yesterday })),
    )
    .await;
    assert_eq!(body["status"], "Closed");

    // Even a stale persisted column is overridden by read-time derivation.
    state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE issues SET status = 'In Progress' WHERE id = ?1",
                [issue],
            )?;
            Ok(())
        })
        .unwrap();
    let (_, body) = send(&app, Method::GET, &format!("/api/issues/{issue}"), None, None).await;
    assert_eq!(body["status"], "Closed");

    // Future-dated issues are Scheduled, and the board filter sees the
    // derived value.
    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/api/issues?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Next sprint", "start_date": tomorrow })),
    )
    .await;
    assert_eq!(body["status"], "Scheduled");

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/issues/study/{study}?status_filter=Closed"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], issue);
}

#[tokio::test]
async fn password_reset_flow_is_enumeration_safe() {
    let state = test_state();
    let app = app::router(state.clone());

    register(&app, "alice@x.com", "alice", "password1").await;

    // Unknown email: generic 200, no link, and no reset token stored for
    // any account.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "nobody@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reset_link"].is_null());
    let tokens_stored = state
        .db
        .with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE password_reset_token IS NOT NULL",
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .unwrap();
    assert_eq!(tokens_stored, 0);

    // Known email with mail unconfigured: the dev fallback returns the link.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "alice@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let link = body["reset_link"].as_str().unwrap();
    let token = link.split("token=").nth(1).unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": token, "new_password": "password9" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The token is single-use.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": token, "new_password": "password8" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Old password rejected, new password works.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@x.com", "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, "alice@x.com", "password9").await;
}

#[tokio::test]
async fn expired_reset_tokens_are_cleared_on_detection() {
    let state = test_state();
    let app = app::router(state.clone());

    register(&app, "alice@x.com", "alice", "password1").await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "alice@x.com" })),
    )
    .await;
    let link = body["reset_link"].as_str().unwrap();
    let token = link.split("token=").nth(1).unwrap().to_string();

    // Age the token past its expiry.
    state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_reset_expires = '2000-01-01 00:00:00'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": token.clone(), "new_password": "password9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Detection cleared the token: retrying is invalid, not expired.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/reset-password",
        None,
        Some(json!({ "token": token, "new_password": "password9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid or expired token");
}

#[tokio::test]
async fn validation_and_conflicts_are_bad_requests() {
    let app = app::router(test_state());

    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;

    // Duplicate email.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "alice@x.com", "username": "alice2", "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");

    // Short password.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "bob@x.com", "username": "bob", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Duplicate study name.
    create_study(&app, &alice, "Algo Study").await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/studies",
        Some(&alice),
        Some(json!({ "name": "Algo Study" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Pagination bounds.
    let (status, _) = send(&app, Method::GET, "/api/studies?limit=101", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::GET, "/api/studies?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Duplicate membership.
    register(&app, "bob@x.com", "bob", "password2").await;
    let (_, body) = send(&app, Method::GET, "/api/studies", None, None).await;
    let study = body["items"][0]["id"].as_i64().unwrap();
    for expected in [StatusCode::CREATED, StatusCode::BAD_REQUEST] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/studies/{study}/members"),
            Some(&alice),
            Some(json!({ "email": "bob@x.com" })),
        )
        .await;
        assert_eq!(status, expected);
    }
}

#[tokio::test]
async fn deleting_a_study_cascades_through_the_api() {
    let state = test_state();
    let app = app::router(state.clone());

    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;
    register(&app, "bob@x.com", "bob", "password2").await;
    let bob = login(&app, "bob@x.com", "password2").await;

    let study = create_study(&app, &alice, "Algo Study").await;
    send(
        &app,
        Method::POST,
        &format!("/api/studies/{study}/members"),
        Some(&alice),
        Some(json!({ "email": "bob@x.com" })),
    )
    .await;
    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts?study_id={study}"),
        Some(&alice),
        Some(json!({ "title": "Week 1", "content": "drills" })),
    )
    .await;
    let post = body["id"].as_i64().unwrap();
    send(
        &app,
        Method::POST,
        &format!("/api/comments?post_id={post}"),
        Some(&bob),
        Some(json!({ "content": "nice" })),
    )
    .await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/studies/{study}"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/studies/{study}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &format!("/api/posts/{post}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The fan-out and comment notifications died with the study.
    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&bob), None).await;
    assert_eq!(body["total"], 0);
    let (_, body) = send(&app, Method::GET, "/api/notifications", Some(&alice), None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn profile_update_requires_current_password_for_changes() {
    let app = app::router(test_state());
    register(&app, "alice@x.com", "alice", "password1").await;
    let alice = login(&app, "alice@x.com", "password1").await;

    // Username-only change needs no password.
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/auth/me",
        Some(&alice),
        Some(json!({ "username": "alice_2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice_2");

    // Password change without the current password is rejected.
    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/auth/me",
        Some(&alice),
        Some(json!({ "new_password": "password9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Wrong current password is rejected.
    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/auth/me",
        Some(&alice),
        Some(json!({ "current_password": "wrong", "new_password": "password9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Correct current password works.
    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/auth/me",
        Some(&alice),
        Some(json!({ "current_password": "password1", "new_password": "password9" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login(&app, "alice@x.com", "password9").await;
}

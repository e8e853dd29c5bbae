//! End-to-end tests that drive the real router in-process: every request
//! goes through CORS, auth middleware and handlers down to a throwaway
//! SQLite file.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use hoopers_api::auth::{AppState, AppStateInner};
use hoopers_db::Database;
use hoopers_server::app;

fn test_app() -> (TempDir, Router) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&dir.path().join("test.db")).expect("open test db");
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: "integration-test-secret".into(),
        media_base_url: "http://media.test".into(),
    });
    (dir, app(state))
}

fn request(method: &str, path: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Fire one request and return (status, body). Error bodies are plain text
/// and come back as `Value::Null`.
async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.expect("oneshot");
    let status = res.status();
    let bytes = res.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Register a user and return (token, profile id as string).
async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/auth/register",
            None,
            Some(json!({"username": username, "password": "pick-and-roll"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}");
    (
        body["token"].as_str().expect("token").to_string(),
        body["user_id"].as_str().expect("user_id").to_string(),
    )
}

async fn seed_court(app: &Router, token: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/courts",
            Some(token),
            Some(json!({
                "name": "Rucker Park",
                "address": "155th St & Frederick Douglass Blvd",
                "city": "New York",
                "lat": 40.829,
                "lng": -73.936,
                "surface": "asphalt",
                "hoop_count": 2,
                "indoor": false
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().expect("court id").to_string()
}

#[tokio::test]
async fn health_is_public_everything_else_needs_a_token() {
    let (_dir, app) = test_app();

    let (status, _) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, request("GET", "/posts", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, request("GET", "/posts", Some("not-a-jwt"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_username_availability() {
    let (_dir, app) = test_app();
    let (_, _) = register(&app, "dunkmaster").await;

    // The name is taken now, case-insensitively.
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/auth/register",
            None,
            Some(json!({"username": "DUNKMASTER", "password": "pick-and-roll"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/auth/register",
            None,
            Some(json!({"username": "shorty", "password": "short"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request("GET", "/auth/username-available?username=dunkmaster", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], json!(false));

    let (status, body) = send(
        &app,
        request("GET", "/auth/username-available?username=openname", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], json!(true));

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "dunkmaster", "password": "wrong-password"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "dunkmaster", "password": "pick-and-roll"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], json!("dunkmaster"));
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn profile_updates_are_self_only() {
    let (_dir, app) = test_app();
    let (ana_token, ana_id) = register(&app, "ana").await;
    let (ben_token, _) = register(&app, "ben").await;

    let (status, body) = send(
        &app,
        request("GET", &format!("/profiles/{ana_id}"), Some(&ben_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], json!("ana"));
    assert_eq!(body["followers"], json!(0));
    assert_eq!(body["scouting"]["report_count"], json!(0));

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("/profiles/{ana_id}"),
            Some(&ana_token),
            Some(json!({"bio": "corner three specialist", "city": "Oakland"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], json!("corner three specialist"));
    assert_eq!(body["city"], json!("Oakland"));

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/profiles/{ana_id}"),
            Some(&ben_token),
            Some(json!({"bio": "vandalized"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn follows_feed_followers_and_notify() {
    let (_dir, app) = test_app();
    let (ana_token, ana_id) = register(&app, "ana").await;
    let (ben_token, ben_id) = register(&app, "ben").await;

    let (status, _) = send(
        &app,
        request("POST", &format!("/profiles/{ben_id}/follow"), Some(&ana_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Following yourself is nonsense, not a conflict.
    let (status, _) = send(
        &app,
        request("POST", &format!("/profiles/{ana_id}/follow"), Some(&ana_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request("GET", &format!("/profiles/{ben_id}/followers"), Some(&ben_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["username"], json!("ana"));

    let (_, body) = send(
        &app,
        request("GET", &format!("/profiles/{ana_id}/following"), Some(&ana_token), None),
    )
    .await;
    assert_eq!(body["items"][0]["username"], json!("ben"));

    let (_, body) = send(&app, request("GET", "/notifications", Some(&ben_token), None)).await;
    assert_eq!(body["items"][0]["kind"], json!("follow"));
    assert_eq!(body["items"][0]["actor_username"], json!("ana"));

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/profiles/{ben_id}/follow"), Some(&ana_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(
        &app,
        request("GET", &format!("/profiles/{ben_id}/followers"), Some(&ben_token), None),
    )
    .await;
    assert_eq!(body["items"].as_array().expect("items").len(), 0);
}

#[tokio::test]
async fn posting_mentions_and_notification_flow() {
    let (_dir, app) = test_app();
    let (ana_token, _) = register(&app, "ana").await;
    let (ben_token, ben_id) = register(&app, "ben").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/posts",
            Some(&ana_token),
            Some(json!({"kind": "post", "body": "ran fives with @ben, kid can guard"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = body["id"].as_str().expect("post id").to_string();
    assert_eq!(body["mentions"][0]["username"], json!("ben"));

    // The mention shows up in ben's mention feed and as a notification.
    let (_, body) = send(
        &app,
        request("GET", &format!("/posts/mentions/{ben_id}"), Some(&ben_token), None),
    )
    .await;
    assert_eq!(body["items"][0]["id"], json!(post_id.as_str()));

    let (_, body) = send(&app, request("GET", "/notifications", Some(&ben_token), None)).await;
    assert_eq!(body["items"][0]["kind"], json!("mention"));

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/posts/{post_id}/comments"),
            Some(&ben_token),
            Some(json!({"body": "rematch saturday"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = body["id"].as_str().expect("comment id").to_string();

    let (status, _) = send(
        &app,
        request("PUT", &format!("/posts/{post_id}/like"), Some(&ben_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Ana was told about both, newest first; read-all clears the badge.
    let (_, body) = send(
        &app,
        request("GET", "/notifications?unread=true", Some(&ana_token), None),
    )
    .await;
    let kinds: Vec<&str> = body["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["like", "comment"]);

    let (_, body) = send(
        &app,
        request("PUT", "/notifications/read-all", Some(&ana_token), None),
    )
    .await;
    assert_eq!(body["marked"], json!(2));

    let (_, body) = send(
        &app,
        request("GET", "/notifications?unread=true", Some(&ana_token), None),
    )
    .await;
    assert_eq!(body["items"].as_array().expect("items").len(), 0);

    // Comment moderation: the post author may remove any comment under it.
    let (status, _) = send(
        &app,
        request("DELETE", &format!("/comments/{comment_id}"), Some(&ana_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(
        &app,
        request("GET", &format!("/posts/{post_id}"), Some(&ana_token), None),
    )
    .await;
    assert_eq!(body["comment_count"], json!(0));
}

#[tokio::test]
async fn likes_toggle_and_ratings_upsert() {
    let (_dir, app) = test_app();
    let (ana_token, _) = register(&app, "ana").await;
    let (ben_token, _) = register(&app, "ben").await;

    let (_, body) = send(
        &app,
        request(
            "POST",
            "/posts",
            Some(&ana_token),
            Some(json!({"kind": "blog", "body": "offseason training log"})),
        ),
    )
    .await;
    let post_id = body["id"].as_str().expect("post id").to_string();

    let (_, body) = send(
        &app,
        request("PUT", &format!("/posts/{post_id}/like"), Some(&ben_token), None),
    )
    .await;
    assert_eq!(body, json!({"liked": true, "like_count": 1}));

    let (_, body) = send(
        &app,
        request("PUT", &format!("/posts/{post_id}/like"), Some(&ben_token), None),
    )
    .await;
    assert_eq!(body, json!({"liked": false, "like_count": 0}));

    let (_, body) = send(
        &app,
        request(
            "PUT",
            &format!("/posts/{post_id}/rating"),
            Some(&ben_token),
            Some(json!({"stars": 5})),
        ),
    )
    .await;
    assert_eq!(body["average"].as_f64(), Some(5.0));
    assert_eq!(body["count"], json!(1));

    // Rating again replaces, not stacks.
    let (_, body) = send(
        &app,
        request(
            "PUT",
            &format!("/posts/{post_id}/rating"),
            Some(&ben_token),
            Some(json!({"stars": 3})),
        ),
    )
    .await;
    assert_eq!(body["average"].as_f64(), Some(3.0));
    assert_eq!(body["count"], json!(1));

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/posts/{post_id}/rating"),
            Some(&ben_token),
            Some(json!({"stars": 9})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feed_pages_walk_without_overlap() {
    let (_dir, app) = test_app();
    let (token, _) = register(&app, "chronicler").await;

    for i in 0..5 {
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/posts",
                Some(&token),
                Some(json!({"kind": "post", "body": format!("entry {i}")})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let mut seen: Vec<String> = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let path = match &cursor {
            Some(c) => format!("/posts?limit=2&cursor={c}"),
            None => "/posts?limit=2".to_string(),
        };
        let (status, body) = send(&app, request("GET", &path, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        for item in body["items"].as_array().expect("items") {
            seen.push(item["id"].as_str().expect("id").to_string());
        }
        match body["next_cursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    assert_eq!(seen.len(), 5);
    let mut dedup = seen.clone();
    dedup.sort();
    dedup.dedup();
    assert_eq!(dedup.len(), 5, "a post appeared on two pages");

    let (status, _) = send(&app, request("GET", "/posts?cursor=garbage", Some(&token), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn court_validation_and_creator_only_edits() {
    let (_dir, app) = test_app();
    let (ana_token, _) = register(&app, "ana").await;
    let (ben_token, _) = register(&app, "ben").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/courts",
            Some(&ana_token),
            Some(json!({
                "name": "Nowhere",
                "address": "1 Void St",
                "city": "Limbo",
                "lat": 91.0,
                "lng": 0.0,
                "hoop_count": 2,
                "indoor": false
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let court_id = seed_court(&app, &ana_token).await;

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/courts/{court_id}"),
            Some(&ben_token),
            Some(json!({
                "name": "Hijacked",
                "address": "x",
                "city": "x",
                "lat": 0.0,
                "lng": 0.0,
                "hoop_count": 1,
                "indoor": true
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request("GET", "/courts?city=New%20York", Some(&ben_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["name"], json!("Rucker Park"));
}

#[tokio::test]
async fn run_invites_rsvp_and_capacity() {
    let (_dir, app) = test_app();
    let (host_token, _) = register(&app, "host").await;
    let (guest_token, guest_id) = register(&app, "guest").await;
    let (walkon_token, walkon_id) = register(&app, "walkon").await;
    let court_id = seed_court(&app, &host_token).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/runs",
            Some(&host_token),
            Some(json!({
                "court_id": court_id,
                "title": "saturday fives",
                "scheduled_at": "2026-09-05T18:00:00Z",
                "max_players": 2
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let run_id = body["id"].as_str().expect("run id").to_string();
    assert_eq!(body["status"], json!("scheduled"));
    assert_eq!(body["accepted_count"], json!(1), "host counts as accepted");

    // Only the host hands out invites.
    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/runs/{run_id}/invites"),
            Some(&guest_token),
            Some(json!({"profile_id": walkon_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/runs/{run_id}/invites"),
            Some(&host_token),
            Some(json!({"profile_id": guest_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, request("GET", "/notifications", Some(&guest_token), None)).await;
    assert_eq!(body["items"][0]["kind"], json!("run_invite"));

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/runs/{run_id}/rsvp"),
            Some(&guest_token),
            Some(json!({"status": "accepted"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Two of two spots gone; a third invite can only be declined.
    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/runs/{run_id}/invites"),
            Some(&host_token),
            Some(json!({"profile_id": walkon_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/runs/{run_id}/rsvp"),
            Some(&walkon_token),
            Some(json!({"status": "accepted"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/runs/{run_id}/rsvp"),
            Some(&walkon_token),
            Some(json!({"status": "declined"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(
        &app,
        request("GET", &format!("/runs/{run_id}"), Some(&host_token), None),
    )
    .await;
    assert_eq!(body["accepted_count"], json!(2));
    assert_eq!(body["roster"].as_array().expect("roster").len(), 3);

    // Joined runs follow the rsvp, not the invite.
    let (_, body) = send(
        &app,
        request("GET", &format!("/profiles/{guest_id}/runs"), Some(&guest_token), None),
    )
    .await;
    assert_eq!(body["items"][0]["id"], json!(run_id.as_str()));

    let (_, body) = send(
        &app,
        request("GET", &format!("/profiles/{walkon_id}/runs"), Some(&walkon_token), None),
    )
    .await;
    assert_eq!(body["items"].as_array().expect("items").len(), 0);

    // Lifecycle is forward-only.
    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("/runs/{run_id}"),
            Some(&host_token),
            Some(json!({"status": "active"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("active"));

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/runs/{run_id}"),
            Some(&host_token),
            Some(json!({"status": "scheduled"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn squad_membership_rules() {
    let (_dir, app) = test_app();
    let (owner_token, _) = register(&app, "captain").await;
    let (member_token, member_id) = register(&app, "rookie").await;
    let (stranger_token, _) = register(&app, "stranger").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/squads",
            Some(&owner_token),
            Some(json!({"name": "Ballhogs", "motto": "share nothing"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let squad_id = body["id"].as_str().expect("squad id").to_string();
    let owner_id = body["owner_id"].as_str().expect("owner id").to_string();
    assert_eq!(body["member_count"], json!(1));
    assert_eq!(body["members"][0]["username"], json!("captain"));

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/squads/{squad_id}/members"),
            Some(&stranger_token),
            Some(json!({"profile_id": member_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/squads/{squad_id}/members"),
            Some(&owner_token),
            Some(json!({"profile_id": member_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Members can walk away on their own; strangers cannot push them out.
    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/squads/{squad_id}/members/{member_id}"),
            Some(&stranger_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/squads/{squad_id}/members/{member_id}"),
            Some(&member_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/squads/{squad_id}/members/{owner_id}"),
            Some(&owner_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "owner cannot leave");

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/squads/{squad_id}"), Some(&stranger_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/squads/{squad_id}"), Some(&owner_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request("GET", &format!("/squads/{squad_id}"), Some(&owner_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn game_recording_awards_points() {
    let (_dir, app) = test_app();
    let (winner_token, winner_id) = register(&app, "winner").await;
    let (_, loser_id) = register(&app, "loser").await;
    let court_id = seed_court(&app, &winner_token).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/games",
            Some(&winner_token),
            Some(json!({
                "court_id": court_id,
                "played_at": "2026-08-20T19:30:00Z",
                "team_a_score": 21,
                "team_b_score": 15,
                "players": [
                    {"profile_id": winner_id, "team": "a", "points_scored": 12},
                    {"profile_id": loser_id, "team": "b", "points_scored": 9}
                ]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["players"].as_array().expect("players").len(), 2);
    let game_id = body["id"].as_str().expect("game id").to_string();

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/games",
            Some(&winner_token),
            Some(json!({
                "court_id": court_id,
                "played_at": "2026-08-20T20:00:00Z",
                "team_a_score": 11,
                "team_b_score": 11,
                "players": [
                    {"profile_id": winner_id, "team": "a", "points_scored": 5},
                    {"profile_id": winner_id, "team": "b", "points_scored": 5}
                ]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "player listed twice");

    let (_, body) = send(
        &app,
        request("GET", &format!("/profiles/{winner_id}"), Some(&winner_token), None),
    )
    .await;
    assert_eq!(body["points"], json!(30));

    let (_, body) = send(
        &app,
        request("GET", &format!("/profiles/{loser_id}"), Some(&winner_token), None),
    )
    .await;
    assert_eq!(body["points"], json!(10));

    let (_, body) = send(
        &app,
        request("GET", &format!("/profiles/{loser_id}/games"), Some(&winner_token), None),
    )
    .await;
    assert_eq!(body["items"][0]["id"], json!(game_id.as_str()));
}

#[tokio::test]
async fn scouting_reports_upsert_and_summarize() {
    let (_dir, app) = test_app();
    let (scout_token, scout_id) = register(&app, "scout").await;
    let (subject_token, subject_id) = register(&app, "prospect").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/profiles/{scout_id}/reports"),
            Some(&scout_token),
            Some(json!({
                "shooting": 8, "passing": 6, "defense": 7, "athleticism": 9,
                "summary": "reads the floor well"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "no scouting yourself");

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/profiles/{subject_id}/reports"),
            Some(&scout_token),
            Some(json!({
                "shooting": 8, "passing": 6, "defense": 7, "athleticism": 9,
                "summary": "streaky shooter, elite first step"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let report_id = body["id"].as_str().expect("report id").to_string();

    // Filing again replaces the earlier evaluation.
    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/profiles/{subject_id}/reports"),
            Some(&scout_token),
            Some(json!({
                "shooting": 5, "passing": 6, "defense": 7, "athleticism": 9,
                "summary": "shot has fallen off"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], json!(report_id.as_str()));

    let (_, body) = send(
        &app,
        request(
            "GET",
            &format!("/profiles/{subject_id}/reports/summary"),
            Some(&subject_token),
            None,
        ),
    )
    .await;
    assert_eq!(body["shooting"].as_f64(), Some(5.0));
    assert_eq!(body["report_count"], json!(1));

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/reports/{report_id}"), Some(&subject_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "only the scout retracts");

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/reports/{report_id}"), Some(&scout_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn push_subscriptions_upsert_by_endpoint() {
    let (_dir, app) = test_app();
    let (token, _) = register(&app, "pushy").await;

    let sub = json!({
        "endpoint": "https://push.example/ep-1",
        "p256dh": "BNc1...",
        "auth": "k3y"
    });
    let (status, _) = send(&app, request("PUT", "/push/subscriptions", Some(&token), Some(sub.clone()))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // Browsers re-register on every load.
    let (status, _) = send(&app, request("PUT", "/push/subscriptions", Some(&token), Some(sub))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            "/push/subscriptions",
            Some(&token),
            Some(json!({"endpoint": "", "p256dh": "x", "auth": "y"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            "/push/subscriptions",
            Some(&token),
            Some(json!({"endpoint": "https://push.example/ep-1"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn shop_order_lifecycle() {
    let (_dir, app) = test_app();
    let (clerk_token, _) = register(&app, "clerk").await;
    let (buyer_token, _) = register(&app, "buyer").await;
    let (snoop_token, _) = register(&app, "snoop").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/products",
            Some(&clerk_token),
            Some(json!({
                "name": "Street Ball",
                "description": "outdoor rubber, deep channels",
                "price_cents": 2500,
                "currency": "EUR",
                "sku": "BALL-7",
                "stock": 10
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = body["id"].as_str().expect("product id").to_string();

    let (status, _) = send(
        &app,
        request("POST", "/orders", Some(&buyer_token), Some(json!({"items": []}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/orders",
            Some(&buyer_token),
            Some(json!({"items": [{"product_id": product_id, "quantity": 99}]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "insufficient stock");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/orders",
            Some(&buyer_token),
            Some(json!({"items": [{"product_id": product_id, "quantity": 2}]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["id"].as_str().expect("order id").to_string();
    assert_eq!(body["status"], json!("pending"));
    assert_eq!(body["total_cents"], json!(5000));
    assert_eq!(body["items"][0]["product_name"], json!("Street Ball"));

    let (_, body) = send(
        &app,
        request("GET", &format!("/products/{product_id}"), Some(&buyer_token), None),
    )
    .await;
    assert_eq!(body["stock"], json!(8));

    // Orders are private.
    let (status, _) = send(
        &app,
        request("GET", &format!("/orders/{order_id}"), Some(&snoop_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // pending cannot jump straight to shipped.
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/orders/{order_id}/status"),
            Some(&buyer_token),
            Some(json!({"status": "shipped"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for next in ["paid", "shipped"] {
        let (status, body) = send(
            &app,
            request(
                "PUT",
                &format!("/orders/{order_id}/status"),
                Some(&buyer_token),
                Some(json!({"status": next})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!(next));
    }

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/orders/{order_id}/status"),
            Some(&buyer_token),
            Some(json!({"status": "cancelled"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "shipped is final");

    let (_, body) = send(&app, request("GET", "/orders", Some(&buyer_token), None)).await;
    assert_eq!(body["items"].as_array().expect("items").len(), 1);
}

#[tokio::test]
async fn plan_subscription_lifecycle() {
    let (_dir, app) = test_app();
    let (token, _) = register(&app, "member").await;

    let (status, _) = send(&app, request("GET", "/subscriptions/current", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        request("POST", "/subscriptions", Some(&token), Some(json!({"plan": "monthly"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let sub_id = body["id"].as_str().expect("sub id").to_string();
    assert_eq!(body["status"], json!("active"));

    let (status, _) = send(
        &app,
        request("POST", "/subscriptions", Some(&token), Some(json!({"plan": "yearly"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "one live plan at a time");

    let (status, body) = send(&app, request("GET", "/subscriptions/current", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], json!("monthly"));

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/subscriptions/{sub_id}"), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request("GET", "/subscriptions/current", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn account_deletion_cascades_but_keeps_courts() {
    let (_dir, app) = test_app();
    let (ghost_token, ghost_id) = register(&app, "ghost").await;
    let (witness_token, _) = register(&app, "witness").await;

    let (_, body) = send(
        &app,
        request(
            "POST",
            "/posts",
            Some(&ghost_token),
            Some(json!({"kind": "post", "body": "last words"})),
        ),
    )
    .await;
    let post_id = body["id"].as_str().expect("post id").to_string();
    let court_id = seed_court(&app, &ghost_token).await;

    let (status, _) = send(&app, request("DELETE", "/auth/account", Some(&ghost_token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "ghost", "password": "pick-and-roll"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        request("GET", &format!("/profiles/{ghost_id}"), Some(&witness_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        request("GET", &format!("/posts/{post_id}"), Some(&witness_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The court outlives its creator but can no longer be edited.
    let (status, _) = send(
        &app,
        request("GET", &format!("/courts/{court_id}"), Some(&witness_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/courts/{court_id}"),
            Some(&witness_token),
            Some(json!({
                "name": "Orphan Court",
                "address": "1 Main St",
                "city": "New York",
                "lat": 40.0,
                "lng": -73.0,
                "hoop_count": 2,
                "indoor": false
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::http::header::{AUTHORIZATION, CONTENT_TYPE};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use videotube_api::configure;
use videotube_api::helpers::media::DiskStorage;
use videotube_api::helpers::tokens::{SessionManager, TokenSettings};
use videotube_api::models::{Comment, Like, LikeTarget, MediaRef, Playlist, User, Video};
use videotube_api::state::AppState;
use videotube_api::store::{MemoryStore, Store};

const PASSWORD: &str = "hunter22";
const BOUNDARY: &str = "videotube-test-boundary";

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("videotube-api-{}", Uuid::new_v4()));
    std::fs::create_dir_all(root.join("uploads")).unwrap();
    root
}

fn app_state() -> web::Data<AppState> {
    let root = temp_root();

    web::Data::new(AppState {
        store: Arc::new(MemoryStore::new()),
        media: Arc::new(DiskStorage::new(root.join("media"), "http://localhost/media")),
        sessions: Arc::new(SessionManager::new(TokenSettings {
            access_secret: "access-secret".to_string(),
            access_ttl: 3600,
            refresh_secret: "refresh-secret".to_string(),
            refresh_ttl: 86_400,
            bcrypt_cost: 4,
        })),
        upload_dir: root.join("uploads"),
    })
}

/// Inserts a user directly and returns it with a fresh access token.
fn seed_user(state: &AppState, name: &str) -> (User, String) {
    let now = Utc::now();
    state
        .store
        .insert_user(&User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password: state.sessions.hash_password(PASSWORD).unwrap(),
            full_name: name.to_uppercase(),
            avatar: MediaRef {
                url: format!("http://localhost/media/images/{name}.png"),
                storage_id: format!("images/{name}.png"),
            },
            cover_image: None,
            watch_history: Vec::new(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let outcome = state
        .sessions
        .login(state.store.as_ref(), None, Some(name), PASSWORD)
        .unwrap();

    (outcome.user, outcome.tokens.access_token)
}

fn seed_video(state: &AppState, owner: Uuid, title: &str, published: bool) -> Video {
    let now = Utc::now();
    let id = Uuid::new_v4();
    state
        .store
        .insert_video(&Video {
            id,
            owner_id: owner,
            title: title.to_string(),
            description: format!("about {title}"),
            category: "Education".to_string(),
            video_url: format!("http://localhost/media/videos/{id}.mp4"),
            video_storage_id: format!("videos/{id}.mp4"),
            thumbnail_url: format!("http://localhost/media/images/{id}.png"),
            thumbnail_storage_id: format!("images/{id}.png"),
            duration: 12.5,
            views: 0,
            is_published: published,
            created_at: now,
            updated_at: now,
        })
        .unwrap()
}

fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, mime, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(method: test::TestRequest, uri: &str, parts: &[Part]) -> test::TestRequest {
    method
        .uri(uri)
        .insert_header((
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(multipart_body(parts))
}

fn registration(username: &str, email: &str) -> test::TestRequest {
    let parts = [
        Part::Text("fullName", "Alice Example"),
        Part::Text("email", email),
        Part::Text("username", username),
        Part::Text("password", PASSWORD),
        Part::File("avatar", "me.png", "image/png", b"fake png bytes"),
    ];

    multipart_request(test::TestRequest::post(), "/api/v1/users/register", &parts)
}

#[actix_web::test]
async fn register_then_login_sets_session_cookies() {
    let state = app_state();
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let resp = test::call_service(&app, registration("Alice", "ALICE@example.com").to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"]["avatar"]["url"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost/media/images/"));
    assert!(body["data"]["avatar"].get("storageId").is_none());

    let req = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .set_json(json!({ "email": "alice@example.com", "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies: Vec<String> = resp
        .response()
        .cookies()
        .map(|cookie| cookie.name().to_string())
        .collect();
    assert!(cookies.contains(&"accessToken".to_string()));
    assert!(cookies.contains(&"refreshToken".to_string()));

    let body: Value = test::read_body_json(resp).await;
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"]["avatar"].get("storageId").is_none());

    let req = test::TestRequest::get()
        .uri("/api/v1/users/current-user")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["success"], true);
    assert!(body["data"]["avatar"]["url"].is_string());
    assert!(body["data"]["avatar"].get("storageId").is_none());
    assert!(body["data"].get("refreshToken").is_none());

    let req = test::TestRequest::get()
        .uri("/api/v1/users/c/alice")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"]["avatar"]["url"].is_string());
    assert!(body["data"]["avatar"].get("storageId").is_none());
}

#[actix_web::test]
async fn registration_rejects_duplicates_and_missing_avatar() {
    let state = app_state();
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let resp = test::call_service(&app, registration("alice", "alice@example.com").to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, registration("alice", "other@example.com").to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let parts = [
        Part::Text("fullName", "Bob"),
        Part::Text("email", "bob@example.com"),
        Part::Text("username", "bob"),
        Part::Text("password", PASSWORD),
    ];
    let req = multipart_request(test::TestRequest::post(), "/api/v1/users/register", &parts);
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn protected_routes_require_a_session() {
    let state = app_state();
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/users/current-user")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"], json!([]));

    let req = test::TestRequest::get()
        .uri("/api/v1/users/current-user")
        .insert_header(bearer("not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn stale_cookie_does_not_block_login() {
    let state = app_state();
    seed_user(&state, "alice");
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .cookie(Cookie::new("accessToken", "expired-garbage"))
        .set_json(json!({ "username": "alice", "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn refresh_rotates_and_retires_the_old_token() {
    let state = app_state();
    seed_user(&state, "alice");
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .set_json(json!({ "username": "alice", "password": PASSWORD }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let first = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/v1/users/refresh-token")
        .cookie(Cookie::new("refreshToken", first.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let second = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let req = test::TestRequest::post()
        .uri("/api/v1/users/refresh-token")
        .set_json(json!({ "refreshToken": first }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/users/refresh-token")
        .set_json(json!({ "refreshToken": second }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn tweets_report_likes_relative_to_the_viewer() {
    let state = app_state();
    let (_, alice_token) = seed_user(&state, "alice");
    let (_, bob_token) = seed_user(&state, "bob");
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/tweets")
        .insert_header(bearer(&alice_token))
        .set_json(json!({ "content": "hello from alice" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let tweet_id = body["data"]["_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/likes/toggle/t/{tweet_id}"))
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["isLiked"], true);

    let req = test::TestRequest::get()
        .uri("/api/v1/tweets")
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let doc = &body["data"]["docs"][0];
    assert_eq!(doc["likesCount"], 1);
    assert_eq!(doc["isLiked"], true);
    assert_eq!(doc["owner"]["username"], "alice");
    assert!(doc["owner"].get("email").is_none());

    let req = test::TestRequest::get()
        .uri("/api/v1/tweets")
        .insert_header(bearer(&alice_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["docs"][0]["likesCount"], 1);
    assert_eq!(body["data"]["docs"][0]["isLiked"], false);

    let req = test::TestRequest::get().uri("/api/v1/tweets").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["docs"][0]["likesCount"], 1);
    assert_eq!(body["data"]["docs"][0]["isLiked"], false);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/likes/toggle/t/{tweet_id}"))
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["isLiked"], false);
}

#[actix_web::test]
async fn malformed_pagination_falls_back_to_defaults() {
    let state = app_state();
    let (alice, _) = seed_user(&state, "alice");
    for n in 0..3 {
        let now = Utc::now();
        state
            .store
            .insert_tweet(&videotube_api::models::Tweet {
                id: Uuid::new_v4(),
                content: format!("tweet {n}"),
                owner_id: alice.id,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
    }
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/tweets?page=abc&limit=-5")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["limit"], 10);
    assert_eq!(body["data"]["totalDocs"], 3);
    assert_eq!(body["data"]["hasNextPage"], false);

    let req = test::TestRequest::get()
        .uri("/api/v1/tweets?page=9223372036854775807")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["docs"], json!([]));
    assert_eq!(body["data"]["totalDocs"], 3);
    assert_eq!(body["data"]["hasNextPage"], false);
}

#[actix_web::test]
async fn view_counting_rules() {
    let state = app_state();
    let (alice, alice_token) = seed_user(&state, "alice");
    let (_, bob_token) = seed_user(&state, "bob");
    let public = seed_video(&state, alice.id, "public", true);
    let hidden = seed_video(&state, alice.id, "hidden", false);
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/videos/{}/view", public.id))
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["views"], 1);
    assert_eq!(body["message"], "View counted");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/videos/{}/view", public.id))
        .insert_header(bearer(&alice_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["views"], 1);
    assert_eq!(body["message"], "Owner view ignored");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/videos/{}/view", hidden.id))
        .insert_header(bearer(&bob_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/videos/{}/view", Uuid::new_v4()))
        .insert_header(bearer(&bob_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn bad_ids_and_categories_are_rejected() {
    let state = app_state();
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/videos/not-a-uuid")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/videos?category=Knitting")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/videos?userId=42")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/videos?category=Music")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn video_listing_hides_unpublished_videos() {
    let state = app_state();
    let (alice, alice_token) = seed_user(&state, "alice");
    let (_, bob_token) = seed_user(&state, "bob");
    seed_video(&state, alice.id, "public", true);
    let hidden = seed_video(&state, alice.id, "hidden", false);
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::get().uri("/api/v1/videos").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["totalDocs"], 1);
    assert_eq!(body["data"]["docs"][0]["title"], "public");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/videos/{}", hidden.id))
        .insert_header(bearer(&bob_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/videos/{}", hidden.id))
        .insert_header(bearer(&alice_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/v1/dashboard/videos")
        .insert_header(bearer(&alice_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn watch_history_is_most_recent_first_without_duplicates() {
    let state = app_state();
    let (alice, _) = seed_user(&state, "alice");
    let (_, bob_token) = seed_user(&state, "bob");
    let first = seed_video(&state, alice.id, "first", true);
    let second = seed_video(&state, alice.id, "second", true);
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    for video in [&first, &second, &first] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/videos/{}", video.id))
            .insert_header(bearer(&bob_token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/users/history")
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|video| video["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["first", "second"]);
    assert_eq!(body["data"][0]["owner"]["username"], "alice");
}

#[actix_web::test]
async fn subscribing_to_yourself_is_a_bad_request() {
    let state = app_state();
    let (alice, alice_token) = seed_user(&state, "alice");
    let (bob, bob_token) = seed_user(&state, "bob");
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/subscriptions/c/{}", alice.id))
        .insert_header(bearer(&alice_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/subscriptions/c/{}", alice.id))
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["subscribed"], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/subscriptions/c/{}", alice.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["subscriber"]["_id"], bob.id.to_string());

    let req = test::TestRequest::get()
        .uri("/api/v1/users/c/alice")
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["subscribersCount"], 1);
    assert_eq!(body["data"]["isSubscribed"], true);
}

#[actix_web::test]
async fn non_owners_cannot_modify_content() {
    let state = app_state();
    let (alice, alice_token) = seed_user(&state, "alice");
    let (_, bob_token) = seed_user(&state, "bob");
    let video = seed_video(&state, alice.id, "mine", true);
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/tweets")
        .insert_header(bearer(&alice_token))
        .set_json(json!({ "content": "original" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let tweet_id = body["data"]["_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/tweets/{tweet_id}"))
        .insert_header(bearer(&bob_token))
        .set_json(json!({ "content": "hijacked" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/videos/{}", video.id))
        .insert_header(bearer(&bob_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/videos/toggle/publish/{}", video.id))
        .insert_header(bearer(&bob_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert!(state.store.find_video(video.id).unwrap().is_some());
}

#[actix_web::test]
async fn deleting_a_video_cascades() {
    let state = app_state();
    let (alice, alice_token) = seed_user(&state, "alice");
    let (bob, bob_token) = seed_user(&state, "bob");
    let video = seed_video(&state, alice.id, "doomed", true);

    let now = Utc::now();
    let comment = state
        .store
        .insert_comment(&Comment {
            id: Uuid::new_v4(),
            content: "nice".to_string(),
            owner_id: bob.id,
            video_id: video.id,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    state
        .store
        .insert_like(&Like::new(bob.id, LikeTarget::Comment(comment.id)))
        .unwrap();
    state
        .store
        .insert_like(&Like::new(bob.id, LikeTarget::Video(video.id)))
        .unwrap();
    let playlist = state
        .store
        .insert_playlist(&Playlist {
            id: Uuid::new_v4(),
            name: "later".to_string(),
            description: String::new(),
            owner_id: bob.id,
            videos: vec![video.id],
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    state.store.record_watch(bob.id, video.id).unwrap();

    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/videos/{}", video.id))
        .insert_header(bearer(&alice_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let store = state.store.as_ref();
    assert!(store.find_video(video.id).unwrap().is_none());
    assert!(store.find_comment(comment.id).unwrap().is_none());
    assert!(store
        .find_like(bob.id, LikeTarget::Comment(comment.id))
        .unwrap()
        .is_none());
    assert!(store.liked_video_ids(bob.id).unwrap().is_empty());
    assert!(store.find_playlist(playlist.id).unwrap().unwrap().videos.is_empty());
    assert!(store.find_user(bob.id).unwrap().unwrap().watch_history.is_empty());

    let req = test::TestRequest::get()
        .uri("/api/v1/likes/videos")
        .insert_header(bearer(&bob_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!([]));
}

#[actix_web::test]
async fn playlist_add_is_idempotent_and_remove_keeps_the_rest() {
    let state = app_state();
    let (alice, alice_token) = seed_user(&state, "alice");
    let first = seed_video(&state, alice.id, "opener", true);
    let second = seed_video(&state, alice.id, "favourite", true);
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/playlist")
        .insert_header(bearer(&alice_token))
        .set_json(json!({ "name": "Best of", "description": "picks" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let playlist_id = body["data"]["_id"].as_str().unwrap().to_string();

    for video in [&first, &second, &second] {
        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/playlist/add/{}/{playlist_id}", video.id))
            .insert_header(bearer(&alice_token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/playlist/{playlist_id}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["totalVideos"], 2);
    assert_eq!(body["data"]["videos"][0]["title"], "opener");
    assert_eq!(body["data"]["videos"][1]["title"], "favourite");
    assert_eq!(body["data"]["owner"]["username"], "alice");

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/playlist/remove/{}/{playlist_id}", first.id))
        .insert_header(bearer(&alice_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["videos"], json!([second.id.to_string()]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/playlist/{playlist_id}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["totalVideos"], 1);
    assert_eq!(body["data"]["videos"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["videos"][0]["title"], "favourite");
    assert_eq!(body["data"]["videos"][0]["_id"], second.id.to_string());

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/playlist/{playlist_id}"))
        .insert_header(bearer(&alice_token))
        .set_json(json!({ "name": "Renamed" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["description"], "picks");
}

#[actix_web::test]
async fn publishing_a_video_stores_both_files() {
    let state = app_state();
    let (_, alice_token) = seed_user(&state, "alice");
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let parts = [
        Part::Text("title", "First upload"),
        Part::Text("description", "A short clip"),
        Part::Text("category", "Gaming"),
        Part::Text("duration", "42.5"),
        Part::File("videoFile", "clip.mp4", "video/mp4", b"fake mp4 bytes"),
        Part::File("thumbnail", "thumb.png", "image/png", b"fake png bytes"),
    ];
    let req = multipart_request(test::TestRequest::post(), "/api/v1/videos", &parts)
        .insert_header(bearer(&alice_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["duration"], 42.5);
    assert_eq!(body["data"]["isPublished"], true);
    assert!(body["data"]["videoFile"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost/media/videos/"));

    let req = test::TestRequest::get()
        .uri("/api/v1/dashboard/stats")
        .insert_header(bearer(&alice_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["totalVideos"], 1);
    assert_eq!(body["data"]["totalViews"], 0);
}

#[actix_web::test]
async fn healthcheck_reports_ok() {
    let state = app_state();
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/healthcheck")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["data"]["status"], "OK");
}

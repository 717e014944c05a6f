//! Integration tests for the webhook HTTP surface.
//!
//! Each test builds the real router over an in-memory embedded backend and
//! drives it with `tower::ServiceExt::oneshot` — no network, real contract.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use dancelink::conversation::engine::ConversationEngine;
use dancelink::store::libsql_backend::LibsqlStorage;
use dancelink::store::{ConversationStore, Storage, UserStore, migrations};
use dancelink::webhook::{WebhookState, webhook_routes};

async fn app() -> Router {
    let storage: Arc<dyn Storage> = Arc::new(LibsqlStorage::new(":memory:"));
    migrations::run(storage.as_ref()).await.unwrap();
    let store = ConversationStore::new(Arc::clone(&storage));
    webhook_routes(WebhookState {
        engine: Arc::new(ConversationEngine::new(
            store,
            chrono::Duration::minutes(30),
        )),
        users: Arc::new(UserStore::new(storage)),
    })
}

fn whatsapp_request(from: &str, body: &str) -> Request<Body> {
    let form = format!(
        "From={}&Body={}",
        urlencode(from),
        urlencode(body)
    );
    Request::builder()
        .method("POST")
        .uri("/whatsapp")
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(form))
        .unwrap()
}

/// Minimal percent-encoding for the characters these tests use.
fn urlencode(s: &str) -> String {
    s.replace('+', "%2B").replace(' ', "%20")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn whatsapp_route_returns_reply_descriptor() {
    let app = app().await;

    let response = app
        .oneshot(whatsapp_request("+15551230000", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["template"], "user_type_selection_template");
    assert_eq!(json["data"]["phone_number"], "+15551230000");
}

#[tokio::test]
async fn conversation_advances_across_requests() {
    let app = app().await;

    let first = app
        .clone()
        .oneshot(whatsapp_request("+15551230000", "hello"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(whatsapp_request("+15551230000", "dancer"))
        .await
        .unwrap();
    let json = json_body(second).await;
    assert_eq!(json["template"], "dancer_menu_template");
    assert_eq!(json["data"]["user_type"], "dancer");
}

#[tokio::test]
async fn registration_route_tracks_first_contact() {
    let app = app().await;

    let before = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/registration/%2B15551230000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(before).await["registered"], false);

    app.clone()
        .oneshot(whatsapp_request("+15551230000", "hello"))
        .await
        .unwrap();

    let after = app
        .oneshot(
            Request::builder()
                .uri("/registration/%2B15551230000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(after).await["registered"], true);
}

#[tokio::test]
async fn healthz_answers_ok() {
    let app = app().await;
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

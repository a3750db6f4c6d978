//! # Server Tests
//!
//! Drives the HTTP API in-process through the router, with a short debounce
//! and a font fetcher that never touches the network.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use image::{ImageFormat, Rgb, RgbImage};
use namecard::{
    error::CardError,
    fonts::{FontFetcher, FontRegistry, PollConfig},
    server::{router, AppState, ServerConfig},
    sync::SyncConfig,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Offline;

#[async_trait]
impl FontFetcher for Offline {
    async fn fetch_text(&self, url: &str) -> Result<String, CardError> {
        Err(CardError::Http(format!("offline: {}", url)))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CardError> {
        Err(CardError::Http(format!("offline: {}", url)))
    }
}

fn app() -> Router {
    let config = ServerConfig {
        sync: SyncConfig {
            quiet_period: Duration::from_millis(20),
        },
        poll: PollConfig {
            interval: Duration::from_millis(10),
            lives: 2,
        },
        ..Default::default()
    };
    let state = AppState::new(config, Arc::new(FontRegistry::new()), Arc::new(Offline));
    router(Arc::new(state))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn open_session(app: &Router, query: &str) -> (String, Value) {
    let (status, body) = send_json(app, Method::POST, &format!("/api/sessions{}", query), None).await;
    assert_eq!(status, StatusCode::CREATED);
    (body["id"].as_str().unwrap().to_string(), body)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([250, 240, 230]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
    out
}

async fn upload(app: &Router, id: &str, bytes: Vec<u8>) -> StatusCode {
    let boundary = "namecard-test-boundary";
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"party.png\"\r\nContent-Type: image/png\r\n\r\n",
        b = boundary
    )
    .into_bytes();
    body.extend_from_slice(&bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/sessions/{}/image", id))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_session_seeded_from_share_link() {
    let app = app();
    let (_, body) = open_session(&app, "?name=Jane%20Doe&fontSize=abc&isBold=true&coordinates=%5B0.5%2C0.1%5D").await;

    assert_eq!(body["settings"]["displayName"], "Jane Doe");
    assert_eq!(body["settings"]["sizePt"], 14.0);
    assert_eq!(body["settings"]["bold"], true);
    assert_eq!(body["settings"]["fontFamily"], "sans-serif");
    assert_eq!(body["settings"]["position"], json!({"x": 0.5, "y": 0.1}));
    assert_eq!(body["fontStatus"]["state"], "idle");
    assert_eq!(body["hasCard"], false);
}

#[tokio::test]
async fn test_unknown_and_malformed_session_ids() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/sessions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/sessions/00000000-0000-4000-8000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_font_markup_without_url_is_rejected_inline() {
    let app = app();
    let (id, _) = open_session(&app, "").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{}/fonts", id),
        Some(json!({"markup": "Lobster, please"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "could not find stylesheet URL");

    let (_, session) = send_json(&app, Method::GET, &format!("/api/sessions/{}", id), None).await;
    assert_eq!(session["settings"]["fontStylesheetMarkup"], "");
}

#[tokio::test]
async fn test_click_repositions_text() {
    let app = app();
    let (id, _) = open_session(&app, "").await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/sessions/{}/position", id),
        Some(json!({"x": 100.0, "y": 50.0, "width": 400.0, "height": 200.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["position"], json!({"x": 0.25, "y": 0.25}));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{}/position", id),
        Some(json!({"x": 1.0, "y": 1.0, "width": 0.0, "height": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_renders_and_persists() {
    let app = app();
    let (id, _) = open_session(&app, "").await;

    let (status, _) = send(&app, Method::GET, &format!("/api/sessions/{}/card", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(upload(&app, &id, png(64, 48)).await, StatusCode::OK);
    let (status, _) = send_json(
        &app,
        Method::PATCH,
        &format!("/api/sessions/{}/settings", id),
        Some(json!({"displayName": "Jane Doe", "sizePt": "30"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut session = Value::Null;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session = send_json(&app, Method::GET, &format!("/api/sessions/{}", id), None).await.1;
        if session["hasCard"] == true && session["shareLink"].as_str().unwrap().contains("Jane") {
            break;
        }
    }
    assert_eq!(session["hasCard"], true);
    assert_eq!(session["image"], json!({"filename": "party.png", "width": 64, "height": 48}));
    let link = session["shareLink"].as_str().unwrap();
    assert!(link.starts_with("/?name=Jane+Doe&"), "link: {}", link);
    assert!(link.contains("fontSize=30"), "link: {}", link);

    let (status, bytes) = send(&app, Method::GET, &format!("/api/sessions/{}/card", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));

    let (status, body) = send_json(
        &app,
        Method::GET,
        &format!("/api/sessions/{}/card?format=data-uri", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["dataUri"].as_str().unwrap().starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_bad_upload_is_rejected() {
    let app = app();
    let (id, _) = open_session(&app, "").await;
    assert_eq!(upload(&app, &id, b"not an image".to_vec()).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_font_list_starts_empty() {
    let app = app();
    let (status, body) = send_json(&app, Method::GET, "/api/fonts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"availableFonts": [], "loadedFaces": 0}));
}

//! Card session API handlers.
//!
//! A session is one open card page: its settings, its source image, and the
//! sync controller that keeps the preview and the share link current.

use axum::{
    extract::{Multipart, Path, Query, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    fonts::stylesheet,
    render::SourceImage,
    settings::{Settings, SettingsPatch},
    sync::{FontStatus, SyncController},
};

use super::super::state::AppState;

type ApiError = (StatusCode, String);

/// Full session view returned by most endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub settings: Settings,
    /// Path and query reflecting the last persisted settings
    pub share_link: String,
    pub available_fonts: Vec<String>,
    pub font_status: FontStatus,
    pub image: Option<ImageInfo>,
    pub has_card: bool,
}

#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Click on the displayed preview.
#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    /// Click offset from the preview's left edge
    pub x: f32,
    /// Click offset from the preview's top edge
    pub y: f32,
    /// Rendered width of the preview
    pub width: f32,
    /// Rendered height of the preview
    pub height: f32,
}

#[derive(Debug, Deserialize)]
pub struct FontsRequest {
    pub markup: String,
}

#[derive(Debug, Deserialize)]
pub struct CardQuery {
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDataUri {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid session ID".to_string()))
}

async fn lookup(state: &AppState, id: &str) -> Result<(Uuid, Arc<SyncController>), ApiError> {
    let id = parse_id(id)?;
    let controller = state
        .session(&id)
        .await
        .ok_or((StatusCode::NOT_FOUND, "Session not found or expired".to_string()))?;
    Ok((id, controller))
}

fn describe(state: &AppState, id: Uuid, controller: &SyncController) -> SessionResponse {
    let store = controller.store();
    SessionResponse {
        id: id.to_string(),
        settings: store.snapshot(),
        share_link: controller.address().share_link(),
        available_fonts: state.detector.available_fonts(),
        font_status: controller.font_status(),
        image: store.image().map(|img| ImageInfo {
            filename: img.filename.clone(),
            width: img.width,
            height: img.height,
        }),
        has_card: controller.card().is_some(),
    }
}

/// POST /api/sessions?<page query> - Open a session seeded from a share link.
pub async fn create(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> (StatusCode, Json<SessionResponse>) {
    let (id, controller) = state.create_session(query.as_deref().unwrap_or("")).await;
    println!("[session] Opened {}", id);
    (StatusCode::CREATED, Json(describe(&state, id, &controller)))
}

/// GET /api/sessions/:id - Current session state.
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (id, controller) = lookup(&state, &id).await?;
    Ok(Json(describe(&state, id, &controller)))
}

/// PATCH /api/sessions/:id/settings - Update some settings fields.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (id, controller) = lookup(&state, &id).await?;
    if let Some(markup) = patch.font_stylesheet_markup.as_deref()
        && !markup.trim().is_empty()
    {
        stylesheet::extract_stylesheet_url(markup).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    }
    controller.store().apply(patch);
    Ok(Json(describe(&state, id, &controller)))
}

/// POST /api/sessions/:id/image - Upload the source image (multipart field `image`).
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SessionResponse>, ApiError> {
    let (id, controller) = lookup(&state, &id).await?;

    let mut image_data: Option<Vec<u8>> = None;
    let mut filename = String::from("unknown");

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("image") {
            filename = field.file_name().unwrap_or("unknown").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read image: {}", e)))?;
            image_data = Some(bytes.to_vec());
            break;
        }
    }

    let bytes = image_data.ok_or((StatusCode::BAD_REQUEST, "No image field found".to_string()))?;

    // Decoding is CPU-bound
    let name = filename.clone();
    let source = tokio::task::spawn_blocking(move || SourceImage::decode(bytes, &name))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e)))?
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    println!(
        "[session] {} uploaded {} ({}x{})",
        id, filename, source.width, source.height
    );
    controller.store().set_image(source);
    Ok(Json(describe(&state, id, &controller)))
}

/// POST /api/sessions/:id/position - Move the name to where the preview was clicked.
pub async fn reposition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PositionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (id, controller) = lookup(&state, &id).await?;
    controller
        .store()
        .set_position_from_click((req.x, req.y), (req.width, req.height))
        .ok_or((StatusCode::BAD_REQUEST, "Preview has no size".to_string()))?;
    Ok(Json(describe(&state, id, &controller)))
}

/// POST /api/sessions/:id/fonts - Paste font-provider markup.
///
/// Answers as soon as the markup is accepted; loading continues in the
/// background and shows up in `fontStatus` / `availableFonts`.
pub async fn load_fonts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FontsRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (id, controller) = lookup(&state, &id).await?;
    stylesheet::extract_stylesheet_url(&req.markup).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    controller.store().set_font_stylesheet_markup(req.markup);
    Ok(Json(describe(&state, id, &controller)))
}

/// GET /api/sessions/:id/card - The rendered card as PNG, or `?format=data-uri` for JSON.
pub async fn card(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<CardQuery>,
) -> Result<Response, ApiError> {
    let (_, controller) = lookup(&state, &id).await?;
    let card = controller
        .card()
        .ok_or((StatusCode::NOT_FOUND, "No card rendered yet".to_string()))?;

    match query.format.as_deref() {
        Some("data-uri") => Ok(Json(CardDataUri {
            data_uri: card.to_data_uri(),
            width: card.width,
            height: card.height,
        })
        .into_response()),
        None | Some("png") => Ok((
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            card.png.clone(),
        )
            .into_response()),
        Some(other) => Err((StatusCode::BAD_REQUEST, format!("Unknown format '{}'", other))),
    }
}


//! Font list handler.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use super::super::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontsResponse {
    /// Families published by the last settled font load
    pub available_fonts: Vec<String>,
    /// Faces currently loaded, including ones still settling
    pub loaded_faces: usize,
}

/// GET /api/fonts - Families available for the font selector.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<FontsResponse> {
    Json(FontsResponse {
        available_fonts: state.detector.available_fonts(),
        loaded_faces: state.fonts.len(),
    })
}

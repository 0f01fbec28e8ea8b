//! Generation endpoints
//!
//! POST /generate - text-to-image (prompt + optional style and aspect ratio)
//! POST /edit     - rework one reference image
//! POST /compose  - combine two reference images
//! GET  /styles   - the preset catalog

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{AppState, ErrorResponse};
use crate::gemini::{AspectRatio, GeneratedImage, GenerationError, ImageInput};

/// Text-to-image request
#[derive(Debug, Deserialize)]
struct GenerateRequest {
    prompt: String,
    /// Style preset id; unknown ids mean no styling
    #[serde(default)]
    style: Option<String>,
    /// Aspect-ratio name or tag, defaults to square
    #[serde(default)]
    aspect_ratio: Option<String>,
}

/// Edit request: one reference image
#[derive(Debug, Deserialize)]
struct EditRequest {
    prompt: String,
    #[serde(default)]
    style: Option<String>,
    image: ImageInput,
}

/// Compose request: two reference images
#[derive(Debug, Deserialize)]
struct ComposeRequest {
    prompt: String,
    #[serde(default)]
    style: Option<String>,
    first: ImageInput,
    second: ImageInput,
}

/// Response for all generation endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    image_data_url: String,
    mime_type: String,
}

/// Build the generation router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/edit", post(edit))
        .route("/compose", post(compose))
        .route("/styles", get(list_styles))
}

/// GET /styles
async fn list_styles(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.styles.list().to_vec())
}

/// POST /generate
async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    if let Some(response) = reject_empty_prompt(&request.prompt) {
        return response;
    }

    let style = request.style.as_deref().and_then(|id| state.styles.get(id));
    let aspect = request
        .aspect_ratio
        .as_deref()
        .and_then(AspectRatio::from_str)
        .unwrap_or_default();

    match state.model.generate(&request.prompt, style, aspect).await {
        Ok(image) => image_response(image),
        Err(e) => generation_error(e),
    }
}

/// POST /edit
async fn edit(State(state): State<AppState>, Json(request): Json<EditRequest>) -> Response {
    if let Some(response) = reject_empty_prompt(&request.prompt) {
        return response;
    }

    let style = request.style.as_deref().and_then(|id| state.styles.get(id));

    match state.model.edit(&request.prompt, &request.image, style).await {
        Ok(image) => image_response(image),
        Err(e) => generation_error(e),
    }
}

/// POST /compose
async fn compose(State(state): State<AppState>, Json(request): Json<ComposeRequest>) -> Response {
    if let Some(response) = reject_empty_prompt(&request.prompt) {
        return response;
    }

    let style = request.style.as_deref().and_then(|id| state.styles.get(id));

    match state
        .model
        .compose(&request.prompt, &request.first, &request.second, style)
        .await
    {
        Ok(image) => image_response(image),
        Err(e) => generation_error(e),
    }
}

fn reject_empty_prompt(prompt: &str) -> Option<Response> {
    if prompt.trim().is_empty() {
        return Some(
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "prompt must not be empty".to_string(),
                }),
            )
                .into_response(),
        );
    }
    None
}

fn image_response(image: GeneratedImage) -> Response {
    let image_data_url = image.to_data_url();
    (
        StatusCode::OK,
        Json(ImageResponse {
            image_data_url,
            mime_type: image.mime_type,
        }),
    )
        .into_response()
}

fn generation_error(e: GenerationError) -> Response {
    let status = match e {
        GenerationError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        GenerationError::Failed(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

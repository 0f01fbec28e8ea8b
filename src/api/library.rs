//! Library endpoints - saved-image CRUD, export, and import
//!
//! GET    /library            - full library, newest first
//! POST   /library            - save a freshly generated image
//! POST   /library/contains   - is this exact payload already saved?
//! GET    /library/export     - download the library as a JSON file
//! POST   /library/import     - merge an exported JSON file
//! DELETE /library/{id}       - remove one entry
//! GET    /library/{id}/reuse - repackage an entry as a generation input

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{AppState, ErrorResponse};
use crate::library::{LibraryError, NewImage};

/// Save request (id and timestamp are minted server-side)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveRequest {
    image_data_url: String,
    #[serde(default)]
    mime_type: Option<String>,
    prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainsRequest {
    image_data_url: String,
}

#[derive(Debug, Serialize)]
struct ContainsResponse {
    saved: bool,
}

#[derive(Debug, Serialize)]
struct ImportResponse {
    imported: usize,
}

/// Build the library router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/library", get(list_library).post(save_image))
        .route("/library/contains", post(contains))
        .route("/library/export", get(export_library))
        .route("/library/import", post(import_library))
        .route("/library/{id}", delete(delete_image))
        .route("/library/{id}/reuse", get(reuse_image))
}

/// GET /library
async fn list_library(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.library.list().await)
}

/// POST /library
async fn save_image(State(state): State<AppState>, Json(request): Json<SaveRequest>) -> Response {
    // The front end disables its save button for an already-saved payload;
    // enforce the same gate here.
    if state
        .library
        .contains_payload(&request.image_data_url)
        .await
    {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "image is already in the library".to_string(),
            }),
        )
            .into_response();
    }

    let new = NewImage {
        image_data_url: request.image_data_url,
        mime_type: request.mime_type,
        prompt: request.prompt,
    };

    match state.library.add(new).await {
        Ok(image) => (StatusCode::CREATED, Json(image)).into_response(),
        Err(e) => library_error(e),
    }
}

/// POST /library/contains
async fn contains(
    State(state): State<AppState>,
    Json(request): Json<ContainsRequest>,
) -> impl IntoResponse {
    Json(ContainsResponse {
        saved: state
            .library
            .contains_payload(&request.image_data_url)
            .await,
    })
}

/// DELETE /library/{id}
async fn delete_image(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    // Absent ids are a no-op, same status either way
    match state.library.remove(&id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => library_error(e),
    }
}

/// GET /library/export
async fn export_library(State(state): State<AppState>) -> Response {
    match state.library.export_json().await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"image-library.json\"".to_string(),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => library_error(e),
    }
}

/// POST /library/import
async fn import_library(State(state): State<AppState>, body: Bytes) -> Response {
    match state.library.import_merge(&body).await {
        Ok(imported) => Json(ImportResponse { imported }).into_response(),
        Err(e) => library_error(e),
    }
}

/// GET /library/{id}/reuse
async fn reuse_image(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(image) = state.library.get(&id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("image not found: {}", id),
            }),
        )
            .into_response();
    };

    match image.to_input() {
        Ok(input) => Json(input).into_response(),
        Err(e) => library_error(e),
    }
}

fn library_error(e: LibraryError) -> Response {
    let status = match e {
        LibraryError::ImportParse(_) | LibraryError::InvalidImage(_) => StatusCode::BAD_REQUEST,
        LibraryError::Persistence(_) | LibraryError::CorruptStore(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

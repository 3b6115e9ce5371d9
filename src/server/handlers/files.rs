//! Serving exported result files.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Local;

use super::super::AppState;
use crate::export::{results_stem, zip_bundle};

/// Serve one file from the results directory as an attachment.
pub async fn download_file(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return (StatusCode::BAD_REQUEST, "Invalid filename").into_response();
    }

    let canonical_dir = match state.settings.results_dir.canonicalize() {
        Ok(p) => p,
        Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };

    let canonical_file = match canonical_dir.join(&filename).canonicalize() {
        Ok(p) => p,
        Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };

    if !canonical_file.starts_with(&canonical_dir) {
        return (StatusCode::BAD_REQUEST, "Invalid filename").into_response();
    }

    let content = match tokio::fs::read(&canonical_file).await {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error downloading file: {}", e),
            )
                .into_response();
        }
    };

    let mime = mime_guess::from_path(&canonical_file)
        .first_or_octet_stream()
        .to_string();

    (
        [
            (header::CONTENT_TYPE, mime),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        content,
    )
        .into_response()
}

/// ZIP of the last run's CSV and JSON exports.
pub async fn download_all(State(state): State<AppState>) -> Response {
    let files = state.last_export.read().await.files.clone();
    let Some(files) = files else {
        return (StatusCode::BAD_REQUEST, "No completed results to download").into_response();
    };

    let bundle = match tokio::task::spawn_blocking(move || zip_bundle(&files)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error creating download: {}", e),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error creating download: {}", e),
            )
                .into_response();
        }
    };

    let zip_name = format!("{}.zip", results_stem(Local::now()));
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", zip_name),
            ),
        ],
        bundle,
    )
        .into_response()
}

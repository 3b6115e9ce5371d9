//! Run control endpoints: start, progress, cancel and results.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use super::super::{AppState, LastExport};
use super::helpers::{json_error, json_message};
use crate::export::{summarize, write_results, ExportError, ExportFiles, Summary};
use crate::input::{keys_from_upload, parse_key_text};
use crate::models::{Completion, ProgressSnapshot, Record, RunOutcome};
use crate::work_queue::RunError;

/// Body of `POST /start_scraping`. Keys come from the uploaded file when
/// one is given, otherwise from `keys_text`.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub keys_text: Option<String>,
    pub file_name: Option<String>,
    pub file_contents: Option<String>,
    pub session_id: Option<String>,
    pub max_workers: Option<usize>,
    pub delay: Option<f64>,
    pub nic: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub message: String,
    pub total_vehicles: usize,
}

pub async fn start_scraping(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Response {
    if state.coordinator.is_running().await {
        return json_error(StatusCode::BAD_REQUEST, RunError::Busy.to_string());
    }

    let session = req
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or(state.settings.session_id.as_deref())
        .unwrap_or_default()
        .to_string();
    if session.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Session ID is required");
    }

    let keys = match (req.file_name.as_deref(), req.file_contents.as_deref()) {
        (Some(name), Some(contents)) => match keys_from_upload(name, contents) {
            Ok(keys) => keys,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
        },
        _ => parse_key_text(req.keys_text.as_deref().unwrap_or_default()),
    };
    if keys.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "No vehicle numbers provided");
    }

    let config = match state.settings.fetch_config(
        req.max_workers,
        req.delay,
        req.nic.as_deref(),
        req.contact.as_deref(),
        &session,
    ) {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let total = keys.len();
    let mut last_export = state.last_export.write().await;
    let handle = match state
        .coordinator
        .start(keys, config, state.fetcher.clone())
        .await
    {
        Ok(handle) => handle,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let run_id = last_export.run_id + 1;
    *last_export = LastExport {
        run_id,
        ..LastExport::default()
    };
    drop(last_export);

    tokio::spawn(export_when_done(state.clone(), run_id, handle));

    Json(StartResponse {
        message: "Scraping started successfully".to_string(),
        total_vehicles: total,
    })
    .into_response()
}

/// Write the run's records to the results directory once it ends,
/// whether it finished, was cancelled or aborted.
async fn export_when_done(state: AppState, run_id: u64, handle: JoinHandle<RunOutcome>) {
    let outcome = state.coordinator.wait(handle).await;
    let dir = state.settings.results_dir.clone();
    let records = outcome.records;

    let written = tokio::task::spawn_blocking(move || write_results(&dir, &records)).await;
    store_export(&state, run_id, written).await;
}

/// Record an export outcome, unless a newer run has claimed the slot.
pub(crate) async fn store_export(
    state: &AppState,
    run_id: u64,
    written: Result<Result<ExportFiles, ExportError>, JoinError>,
) {
    let mut last_export = state.last_export.write().await;
    if last_export.run_id != run_id {
        warn!(
            "Discarding export of run {}; run {} has started since",
            run_id, last_export.run_id
        );
        return;
    }
    last_export.done = true;
    match written {
        Ok(Ok(files)) => last_export.files = Some(files),
        Ok(Err(e)) => {
            error!("Failed to save results: {}", e);
            last_export.error = Some(e.to_string());
        }
        Err(e) => {
            error!("Export task failed: {}", e);
            last_export.error = Some(e.to_string());
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub snapshot: ProgressSnapshot,
    /// The run is over and its export step has finished.
    pub completed: bool,
    pub cancelled: bool,
    pub error: Option<String>,
    pub results: Vec<Record>,
    pub csv_file: Option<String>,
    pub json_file: Option<String>,
}

pub async fn progress(State(state): State<AppState>) -> Json<ProgressResponse> {
    let snapshot = state.coordinator.snapshot().await;
    let results = state.coordinator.records().await;
    let last_export = state.last_export.read().await.clone();

    let error = match &snapshot.completion {
        Some(Completion::Aborted(reason)) => Some(reason.clone()),
        _ => last_export.error.clone(),
    };

    Json(ProgressResponse {
        completed: snapshot.is_terminal() && last_export.done,
        cancelled: snapshot.completion == Some(Completion::Cancelled),
        error,
        results,
        csv_file: last_export.files.as_ref().map(|f| f.csv_name()),
        json_file: last_export.files.as_ref().map(|f| f.json_name()),
        snapshot,
    })
}

pub async fn cancel_scraping(State(state): State<AppState>) -> Response {
    if state.coordinator.request_stop().await {
        info!("Cancel requested from web front end");
        json_message("Scraping cancelled")
    } else {
        json_message("No scraping process is running")
    }
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<Record>,
    pub summary: Summary,
    pub completion: Option<Completion>,
}

pub async fn results(State(state): State<AppState>) -> Json<ResultsResponse> {
    let results = state.coordinator.records().await;
    let completion = state.coordinator.snapshot().await.completion;
    Json(ResultsResponse {
        summary: summarize(&results),
        results,
        completion,
    })
}

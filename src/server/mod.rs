//! Web front end for running lookups from a browser.
//!
//! One page with a form posts keys and run options, then polls
//! `/progress` until the run ends and offers the CSV/JSON exports for
//! download. All routes share a single [`RunCoordinator`], so only one
//! run can be active per process.

mod handlers;
mod routes;
mod templates;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Settings;
use crate::export::ExportFiles;
use crate::scrapers::{HttpClient, RecordFetcher};
use crate::work_queue::RunCoordinator;

/// Export state of the most recent run.
#[derive(Debug, Clone, Default)]
pub struct LastExport {
    /// Bumped on every accepted start; an export only lands in the slot
    /// of the run that produced it.
    pub run_id: u64,
    /// Set once the background task has finished writing (or failed to).
    pub done: bool,
    pub files: Option<ExportFiles>,
    pub error: Option<String>,
}

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub coordinator: RunCoordinator,
    pub fetcher: Arc<dyn RecordFetcher>,
    pub last_export: Arc<RwLock<LastExport>>,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let fetcher = Arc::new(HttpClient::new(&settings)?);
        Ok(Self::with_fetcher(settings, fetcher))
    }

    /// State backed by an arbitrary fetcher.
    pub fn with_fetcher(settings: Settings, fetcher: Arc<dyn RecordFetcher>) -> Self {
        Self {
            settings: Arc::new(settings),
            coordinator: RunCoordinator::new(),
            fetcher,
            last_export: Arc::new(RwLock::new(LastExport::default())),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: Settings, addr: SocketAddr) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let state = AppState::new(settings)?;
    let app = create_router(state);

    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::models::InputKey;
    use crate::scrapers::FetchError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    /// Answers every key with a one-row details table, optionally gated.
    struct PageFetcher {
        gate: Option<Arc<Semaphore>>,
    }

    #[async_trait]
    impl RecordFetcher for PageFetcher {
        async fn fetch(&self, key: &InputKey, _config: &FetchConfig) -> Result<String, FetchError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if key.as_str() == "TEST123" || key.as_str().starts_with("CAB") {
                Ok(format!(
                    "<table class=\"table-striped\"><tr><td>Make</td><td>-</td><td>M-{}</td></tr></table>",
                    key
                ))
            } else {
                Err(FetchError::Status {
                    status: 403,
                    reason: "Forbidden".into(),
                })
            }
        }
    }

    fn setup_test_app(gate: Option<Arc<Semaphore>>) -> (axum::Router, AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let settings = Settings {
            results_dir: dir.path().join("results"),
            default_delay_secs: 0.0,
            ..Settings::default()
        };
        settings.ensure_directories().unwrap();
        let state = AppState::with_fetcher(settings, Arc::new(PageFetcher { gate }));
        (create_router(state.clone()), state, dir)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn wait_for_export(app: &axum::Router) -> serde_json::Value {
        for _ in 0..200 {
            let response = app.clone().oneshot(get("/progress")).await.unwrap();
            let json = body_json(response).await;
            if json["completed"] == true {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run did not finish");
    }

    #[tokio::test]
    async fn test_index_page() {
        let (app, _state, _dir) = setup_test_app(None);
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("2200000000"));
        assert!(html.contains("/start_scraping"));
    }

    #[tokio::test]
    async fn test_idle_progress() {
        let (app, _state, _dir) = setup_test_app(None);
        let json = body_json(app.oneshot(get("/progress")).await.unwrap()).await;
        assert_eq!(json["running"], false);
        assert_eq!(json["total"], 0);
        assert_eq!(json["completed"], false);
        assert_eq!(json["results"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_full_run_and_downloads() {
        let (app, _state, _dir) = setup_test_app(None);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/start_scraping",
                serde_json::json!({
                    "keys_text": "cab-1, xyz-2\ncab-1",
                    "session_id": "SESSION",
                    "max_workers": 2,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total_vehicles"], 2);

        let progress = wait_for_export(&app).await;
        assert_eq!(progress["processed"], 2);
        assert_eq!(progress["cancelled"], false);
        let csv_file = progress["csv_file"].as_str().unwrap().to_string();
        assert!(csv_file.starts_with("vehicle_results_"));

        let results = body_json(app.clone().oneshot(get("/results")).await.unwrap()).await;
        let records = results["results"].as_array().unwrap();
        assert_eq!(records[0]["vehicle_number"], "CAB-1");
        assert_eq!(records[0]["make"], "M-CAB-1");
        assert_eq!(records[1]["status"], "fetch_failed");
        assert_eq!(results["summary"]["successful"], 1);
        assert_eq!(results["summary"]["failed"], 1);

        let response = app
            .clone()
            .oneshot(get(&format!("/download/{}", csv_file)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/download_all")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/zip"
        );
    }

    #[tokio::test]
    async fn test_start_rejections() {
        let (app, _state, _dir) = setup_test_app(None);

        let missing_session = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/start_scraping",
                serde_json::json!({ "keys_text": "CAB-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(missing_session.status(), StatusCode::BAD_REQUEST);

        let no_keys = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/start_scraping",
                serde_json::json!({ "keys_text": " , ", "session_id": "S" }),
            ))
            .await
            .unwrap();
        assert_eq!(no_keys.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(no_keys).await["error"], "No vehicle numbers provided");

        let bad_workers = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/start_scraping",
                serde_json::json!({ "keys_text": "CAB-1", "session_id": "S", "max_workers": 11 }),
            ))
            .await
            .unwrap();
        assert_eq!(bad_workers.status(), StatusCode::BAD_REQUEST);

        let bad_file = app
            .oneshot(json_request(
                "POST",
                "/start_scraping",
                serde_json::json!({
                    "file_name": "keys.xlsx",
                    "file_contents": "CAB-1",
                    "session_id": "S",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(bad_file.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_busy_and_cancel() {
        let gate = Arc::new(Semaphore::new(0));
        let (app, state, _dir) = setup_test_app(Some(gate.clone()));

        let cancel_idle = body_json(
            app.clone()
                .oneshot(json_request("POST", "/cancel_scraping", serde_json::json!({})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(cancel_idle["message"], "No scraping process is running");

        let start = serde_json::json!({
            "file_name": "keys.csv",
            "file_contents": "vehicle_number\nCAB-1\nCAB-2\nCAB-3\n",
            "session_id": "S",
            "max_workers": 1,
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/start_scraping", start.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let busy = app
            .clone()
            .oneshot(json_request("POST", "/start_scraping", start))
            .await
            .unwrap();
        assert_eq!(busy.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(busy).await["error"], "Scraping is already in progress");
        assert_eq!(state.coordinator.snapshot().await.total, 3);

        let cancelled = body_json(
            app.clone()
                .oneshot(json_request("POST", "/cancel_scraping", serde_json::json!({})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(cancelled["message"], "Scraping cancelled");

        gate.add_permits(10);
        let progress = wait_for_export(&app).await;
        assert_eq!(progress["cancelled"], true);
        assert!(progress["processed"].as_u64().unwrap() < 3);
    }

    #[tokio::test]
    async fn test_restart_keeps_previous_export_out() {
        let gate = Arc::new(Semaphore::new(1));
        let (app, state, _dir) = setup_test_app(Some(gate.clone()));
        let start = serde_json::json!({ "keys_text": "CAB-1", "session_id": "S" });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/start_scraping", start.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        while state.coordinator.is_running().await {
            tokio::task::yield_now().await;
        }

        // The first run's export may still be pending here.
        let response = app
            .clone()
            .oneshot(json_request("POST", "/start_scraping", start))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let last_export = state.last_export.read().await;
            assert_eq!(last_export.run_id, 2);
            assert!(!last_export.done);
            assert!(last_export.files.is_none());
        }
        let progress = body_json(app.clone().oneshot(get("/progress")).await.unwrap()).await;
        assert_eq!(progress["completed"], false);
        assert!(progress["csv_file"].is_null());

        gate.add_permits(1);
        let progress = wait_for_export(&app).await;
        assert_eq!(progress["processed"], 1);
        assert!(progress["csv_file"].is_string());
        assert_eq!(state.last_export.read().await.run_id, 2);
    }

    #[tokio::test]
    async fn test_stale_export_is_discarded() {
        let (_app, state, dir) = setup_test_app(None);
        state.last_export.write().await.run_id = 3;

        let files = crate::export::write_results(&dir.path().join("results"), &[]).unwrap();
        handlers::store_export(&state, 2, Ok(Ok(files.clone()))).await;
        assert!(!state.last_export.read().await.done);

        handlers::store_export(&state, 3, Ok(Ok(files))).await;
        let last_export = state.last_export.read().await;
        assert!(last_export.done);
        assert!(last_export.files.is_some());
    }

    #[tokio::test]
    async fn test_download_guards() {
        let (app, _state, _dir) = setup_test_app(None);

        let traversal = app
            .clone()
            .oneshot(get("/download/..%2Fsecret.txt"))
            .await
            .unwrap();
        assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);

        let missing = app
            .clone()
            .oneshot(get("/download/vehicle_results_missing.csv"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let no_bundle = app.oneshot(get("/download_all")).await.unwrap();
        assert_eq!(no_bundle.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validate_session() {
        let (app, _state, _dir) = setup_test_app(None);

        let json = body_json(
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/api/validate_session",
                    serde_json::json!({ "session_id": "ABC" }),
                ))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["valid"], true);

        let json = body_json(
            app.oneshot(json_request(
                "POST",
                "/api/validate_session",
                serde_json::json!({ "session_id": "  " }),
            ))
            .await
            .unwrap(),
        )
        .await;
        assert_eq!(json["valid"], false);
        assert_eq!(json["message"], "Session ID is required");
    }
}

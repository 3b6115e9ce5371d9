//! Session credential check.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::super::AppState;
use crate::scrapers;

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub session_id: String,
    pub nic: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub message: String,
}

impl ValidateResponse {
    fn new(valid: bool, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            valid,
            message: message.into(),
        })
    }
}

/// Probe the upstream with the given session. Always answers 200; the
/// verdict is in the body.
pub async fn validate_session(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Json<ValidateResponse> {
    if req.session_id.trim().is_empty() {
        return ValidateResponse::new(false, "Session ID is required");
    }

    let config = match state.settings.fetch_config(
        Some(1),
        Some(0.0),
        req.nic.as_deref(),
        req.contact.as_deref(),
        &req.session_id,
    ) {
        Ok(c) => c,
        Err(e) => return ValidateResponse::new(false, format!("Validation error: {}", e)),
    };

    match scrapers::validate_session(state.fetcher.as_ref(), &config).await {
        Ok(()) => ValidateResponse::new(true, "Session ID appears valid"),
        Err(e) => {
            tracing::warn!("Session check failed: {}", e);
            ValidateResponse::new(false, format!("Session ID may be invalid or expired ({})", e))
        }
    }
}

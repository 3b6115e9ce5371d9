//! Helper types and utility functions for handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// `{"error": ...}` body returned by JSON endpoints on failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// `{"message": ...}` body.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

pub fn json_message(message: impl Into<String>) -> Response {
    Json(MessageBody {
        message: message.into(),
    })
    .into_response()
}

//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; [`AppError`] renders any
//! [`pc_core::Error`] as a JSON body with the status from
//! [`pc_core::Error::http_status`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: pc_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: pc_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<pc_core::Error> for AppError {
    fn from(e: pc_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.inner, "Server error in relay handler");
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.kind(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

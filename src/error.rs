//! Error types for the pdf-watermark-api library.
//!
//! Every request-terminating failure is a [`WatermarkError`]. Each variant
//! knows its HTTP status and renders the `{ok:false, ...}` JSON body the
//! endpoint promises, so handlers just return `Result<Response, WatermarkError>`
//! and let axum turn the error into a response.
//!
//! Cleanup failures (a scratch file that cannot be removed) are deliberately
//! absent: they are swallowed by [`crate::pipeline::scratch::ScratchFile::discard`]
//! and never reach the caller.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Hint attached to every transform failure.
///
/// `curl -o out.pdf` without `-f` writes the JSON error body into `out.pdf`,
/// which then looks like a corrupt PDF rather than a failed request.
pub const CURL_HINT: &str = "If you save the response with curl -o output.pdf, also pass -f \
so an error JSON body is not written to disk as if it were the PDF.";

/// All errors that end a watermark request.
#[derive(Debug, Error)]
pub enum WatermarkError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The multipart body carried no part under the upload field.
    #[error("No file uploaded (field name must be '{field}').")]
    MissingFile { field: &'static str },

    /// More than one part arrived under the upload field.
    #[error("Only one file may be uploaded per request.")]
    DuplicateFile,

    /// The multipart layer rejected the body (malformed, or over the size limit).
    #[error("Invalid multipart body: {reason}")]
    Multipart { status: StatusCode, reason: String },

    /// The upload could not be written to its scratch file.
    #[error("Failed to store upload: {0}")]
    ScratchWrite(#[source] std::io::Error),

    // ── Operation errors ──────────────────────────────────────────────────
    /// `{operation}` in the URL does not name a registered operation.
    #[error("Unknown watermark operation '{name}'")]
    UnknownOperation { name: String },

    // ── Transform errors ──────────────────────────────────────────────────
    /// The external transformer did not exit with code 0.
    #[error("Watermark failed")]
    TransformFailed { detail: String, stdout: String },

    /// The transformer reported success but its output cannot be opened.
    #[error("Failed to open watermarked output '{path}': {source}")]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WatermarkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WatermarkError::MissingFile { .. } | WatermarkError::DuplicateFile => {
                StatusCode::BAD_REQUEST
            }
            WatermarkError::Multipart { status, .. } => *status,
            WatermarkError::UnknownOperation { .. } => StatusCode::NOT_FOUND,
            WatermarkError::ScratchWrite(_)
            | WatermarkError::TransformFailed { .. }
            | WatermarkError::OutputUnavailable { .. }
            | WatermarkError::InvalidConfig(_)
            | WatermarkError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for WatermarkError {
    fn from(err: MultipartError) -> Self {
        WatermarkError::Multipart {
            status: err.status(),
            reason: err.body_text(),
        }
    }
}

/// A body that is not `multipart/form-data` (or has no boundary) carries no
/// `file` part either, so it gets the same answer as an empty form.
impl From<MultipartRejection> for WatermarkError {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::debug!("Request is not multipart: {}", rejection.body_text());
        WatermarkError::MissingFile {
            field: crate::pipeline::intake::FILE_FIELD,
        }
    }
}

impl IntoResponse for WatermarkError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            WatermarkError::TransformFailed { detail, .. } => {
                tracing::warn!(%detail, "Watermark transform failed");
            }
            _ if status.is_server_error() => {
                tracing::error!("Internal service error: {:#}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = match self {
            WatermarkError::TransformFailed { detail, stdout } => json!({
                "ok": false,
                "error": "Watermark failed",
                "detail": detail,
                "stdout": stdout,
                "hint": CURL_HINT,
            }),
            other => json!({ "ok": false, "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_display_names_field() {
        let e = WatermarkError::MissingFile { field: "file" };
        assert_eq!(
            e.to_string(),
            "No file uploaded (field name must be 'file')."
        );
    }

    #[test]
    fn intake_errors_are_client_errors() {
        assert_eq!(
            WatermarkError::MissingFile { field: "file" }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WatermarkError::DuplicateFile.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WatermarkError::UnknownOperation { name: "x".into() }.status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn multipart_keeps_layer_status() {
        let e = WatermarkError::Multipart {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            reason: "length limit exceeded".into(),
        };
        assert_eq!(e.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(e.to_string().contains("length limit exceeded"));
    }

    #[test]
    fn transform_failure_is_server_error() {
        let e = WatermarkError::TransformFailed {
            detail: "bad page tree".into(),
            stdout: String::new(),
        };
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_string(), "Watermark failed");
    }

    #[tokio::test]
    async fn transform_failure_body_carries_diagnostics() {
        let response = WatermarkError::TransformFailed {
            detail: "bad page tree".into(),
            stdout: "page 1".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Watermark failed");
        assert_eq!(body["detail"], "bad page tree");
        assert_eq!(body["stdout"], "page 1");
        assert_eq!(body["hint"], CURL_HINT);
    }

    #[tokio::test]
    async fn client_error_body_is_minimal() {
        let response = WatermarkError::DuplicateFile.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Only one file may be uploaded per request.");
        assert!(body.get("detail").is_none());
    }
}

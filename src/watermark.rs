//! The upload → transform → respond lifecycle for one request.
//!
//! Steps run strictly in order and every scratch file is owned by a guard,
//! so the function can bail out with `?` at any point without leaking.
//! The explicit `discard` calls only make deletion happen *now* rather than
//! whenever the guard happens to drop.

use crate::config::ServerConfig;
use crate::error::WatermarkError;
use crate::pipeline::scratch::ScratchFile;
use crate::pipeline::transform::Transformer;
use crate::pipeline::{intake, respond};
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::response::Response;
use std::time::Instant;
use tracing::{info, warn};

/// Watermark the PDF in `multipart` with the operation named `operation`.
///
/// # Errors
/// - [`WatermarkError::UnknownOperation`] before any of the body is read
/// - intake errors (`400`/`413`) before any process is spawned, including a
///   body that is not `multipart/form-data` at all
/// - [`WatermarkError::TransformFailed`] when the script does not exit 0
/// - [`WatermarkError::OutputUnavailable`] when it exits 0 without writing output
pub async fn watermark(
    config: &ServerConfig,
    transformer: &Transformer,
    operation: &str,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, WatermarkError> {
    let started = Instant::now();

    // ── Step 1: Resolve operation ────────────────────────────────────────
    let spec = config
        .operations
        .get(operation)
        .ok_or_else(|| WatermarkError::UnknownOperation {
            name: operation.to_string(),
        })?;

    // ── Step 2: Intake ───────────────────────────────────────────────────
    let mut multipart = multipart?;
    let upload = intake::receive_upload(&mut multipart, &config.scratch_dir).await?;
    info!(
        operation,
        original_name = %upload.original_name,
        size = upload.size,
        "Received upload"
    );

    // ── Step 3: Transform ────────────────────────────────────────────────
    let output = ScratchFile::reserve(&config.scratch_dir, "wm-out-", "output.pdf")
        .map_err(WatermarkError::ScratchWrite)?;
    let script = config.script_path(&spec);
    let result = transformer
        .run(&script, upload.path(), output.path(), &spec.options)
        .await;

    // ── Step 4: Cleanup & respond ────────────────────────────────────────
    upload.discard();

    if !result.succeeded() {
        output.discard();
        warn!(
            operation,
            exit_code = ?result.exit_code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Watermark request failed"
        );
        return Err(result.into_error());
    }

    info!(
        operation,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Watermark applied, streaming result"
    );
    respond::pdf_response(output, &spec.download_name).await
}

//! Response composition: stream the watermarked PDF, then delete it.
//!
//! The output scratch file travels inside the response body. [`CleanupBody`]
//! deletes it as soon as the stream reaches EOF or fails, and its `Drop`
//! covers the remaining case where hyper abandons the body because the
//! client disconnected. Errors at this stage are logged only: the status
//! line has already been sent and cannot be changed.

use crate::error::WatermarkError;
use crate::pipeline::scratch::ScratchFile;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Build a `200 application/pdf` response that streams `output`.
pub async fn pdf_response(output: ScratchFile, download_name: &str) -> Result<Response, WatermarkError> {
    let file = File::open(output.path())
        .await
        .map_err(|source| WatermarkError::OutputUnavailable {
            path: output.path().to_path_buf(),
            source,
        })?;
    let length = file.metadata().await.ok().map(|m| m.len());

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{download_name}\""))
        .map_err(|e| WatermarkError::Internal(format!("Invalid download name: {e}")))?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_DISPOSITION, disposition);
    if let Some(length) = length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(CleanupBody::new(file, output)))
        .map_err(|e| WatermarkError::Internal(format!("Failed to build response: {e}")))
}

/// File-backed body stream that owns, and finally removes, its scratch file.
struct CleanupBody {
    inner: ReaderStream<File>,
    scratch: Option<ScratchFile>,
    sent: u64,
    finished: bool,
}

impl CleanupBody {
    fn new(file: File, scratch: ScratchFile) -> Self {
        Self {
            inner: ReaderStream::new(file),
            scratch: Some(scratch),
            sent: 0,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(scratch) = self.scratch.take() {
            scratch.discard();
        }
    }
}

impl Stream for CleanupBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                warn!(sent = this.sent, error = %e, "Failed while streaming watermarked PDF");
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                debug!(sent = this.sent, "Watermarked PDF sent");
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for CleanupBody {
    fn drop(&mut self) {
        if !self.finished {
            warn!(sent = self.sent, "Response dropped before the watermarked PDF was fully sent");
        }
        if let Some(scratch) = self.scratch.take() {
            scratch.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::TempDir;

    fn output_with(dir: &TempDir, bytes: &[u8]) -> (ScratchFile, std::path::PathBuf) {
        let (scratch, mut file) = ScratchFile::create(dir.path(), "wm-out-", ".pdf").unwrap();
        file.write_all(bytes).unwrap();
        let path = scratch.path().to_path_buf();
        (scratch, path)
    }

    #[tokio::test]
    async fn streams_file_and_removes_it() {
        let dir = TempDir::new().unwrap();
        let (scratch, path) = output_with(&dir, b"%PDF-1.7 stamped");

        let response = pdf_response(scratch, "invoice-LUNAS.pdf").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"invoice-LUNAS.pdf\""
        );
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "16");
        assert!(path.exists(), "file must survive until the body is consumed");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"%PDF-1.7 stamped");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn abandoned_body_still_removes_file() {
        let dir = TempDir::new().unwrap();
        let (scratch, path) = output_with(&dir, &vec![b'x'; 256 * 1024]);

        let response = pdf_response(scratch, "out.pdf").await.unwrap();
        let mut stream = response.into_body().into_data_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.is_empty());
        assert!(path.exists());

        drop(stream);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unwritten_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchFile::reserve(dir.path(), "wm-out-", "output.pdf").unwrap();

        let err = pdf_response(scratch, "out.pdf").await.unwrap_err();
        assert!(matches!(err, WatermarkError::OutputUnavailable { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

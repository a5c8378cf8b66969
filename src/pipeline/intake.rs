//! Upload intake: stream the multipart `file` part into a scratch file.
//!
//! The upload is written chunk by chunk as it arrives, so memory stays flat
//! regardless of PDF size. The scratch file is created only once a `file`
//! part is seen and is owned by the returned [`UploadedFile`]; any error
//! after that point drops it, which deletes the partial upload.

use crate::error::WatermarkError;
use crate::pipeline::scratch::ScratchFile;
use axum::extract::Multipart;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Multipart field name that carries the PDF.
pub const FILE_FIELD: &str = "file";

/// The caller's PDF, persisted to a scratch file.
#[derive(Debug)]
pub struct UploadedFile {
    /// Filename the client sent. Informational only.
    pub original_name: String,
    pub size: u64,
    scratch: ScratchFile,
}

impl UploadedFile {
    pub fn path(&self) -> &Path {
        self.scratch.path()
    }

    /// Delete the scratch copy; failures are ignored.
    pub fn discard(self) {
        self.scratch.discard();
    }
}

/// Read the whole multipart body, keeping exactly one `file` part.
///
/// Only a part carrying a filename counts as an upload: a plain text field
/// that happens to be named `file` is skipped like any other field. Skipped
/// fields are never read and never influence the transform.
pub async fn receive_upload(
    multipart: &mut Multipart,
    scratch_dir: &Path,
) -> Result<UploadedFile, WatermarkError> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let original_name = match field.file_name() {
            Some(file_name) if name == FILE_FIELD => file_name.to_string(),
            _ => {
                debug!(field = %name, "Skipping multipart field");
                continue;
            }
        };
        if upload.is_some() {
            return Err(WatermarkError::DuplicateFile);
        }

        let (scratch, file) = ScratchFile::create(scratch_dir, "wm-", ".pdf")
            .map_err(WatermarkError::ScratchWrite)?;
        let mut file = tokio::fs::File::from_std(file);
        let mut size = 0u64;

        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(WatermarkError::ScratchWrite)?;
        }
        file.flush().await.map_err(WatermarkError::ScratchWrite)?;
        drop(file);

        debug!(
            original_name = %original_name,
            size,
            path = %scratch.path().display(),
            "Stored upload"
        );

        upload = Some(UploadedFile {
            original_name,
            size,
            scratch,
        });
    }

    upload.ok_or(WatermarkError::MissingFile { field: FILE_FIELD })
}

//! Per-request scratch files.
//!
//! A [`ScratchFile`] owns one uniquely named path in the scratch directory
//! and deletes it when dropped, so every exit path of a request (early `?`,
//! client disconnect, panic unwinding) cleans up without extra code. The
//! random names come from `tempfile`, which also guarantees the name is
//! free at creation time, so concurrent requests never collide.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir, TempPath};
use tracing::debug;

/// A temporary file that lives for one request.
#[derive(Debug)]
pub struct ScratchFile {
    guard: Guard,
}

#[derive(Debug)]
enum Guard {
    /// A file created (and written) by this process.
    File(TempPath),
    /// A path inside a private directory, for a file another process may
    /// or may not write. Removing the directory removes the file with it.
    Reserved { dir: TempDir, path: PathBuf },
}

impl ScratchFile {
    /// Create a new, empty scratch file and return it with an open handle.
    pub fn create(dir: &Path, prefix: &str, suffix: &str) -> io::Result<(Self, File)> {
        let named = Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)?;
        let (file, path) = named.into_parts();
        debug!("Created scratch file {}", path.display());
        Ok((
            Self {
                guard: Guard::File(path),
            },
            file,
        ))
    }

    /// Reserve a unique path for a file someone else will write.
    ///
    /// Nothing is created at the returned path: it lives in a fresh private
    /// directory, so the file exists only if the writer actually produced it.
    pub fn reserve(dir: &Path, prefix: &str, file_name: &str) -> io::Result<Self> {
        let dir = Builder::new().prefix(prefix).tempdir_in(dir)?;
        let path = dir.path().join(file_name);
        debug!("Reserved scratch path {}", path.display());
        Ok(Self {
            guard: Guard::Reserved { dir, path },
        })
    }

    pub fn path(&self) -> &Path {
        match &self.guard {
            Guard::File(path) => path,
            Guard::Reserved { path, .. } => path,
        }
    }

    /// Attempt deletion; any failure is intentionally discarded.
    ///
    /// A file that is already gone, or one the OS refuses to remove, is left
    /// to the temp-dir reaper. Cleanup never changes a request's outcome.
    pub fn discard(self) {
        let shown = self.path().display().to_string();
        let removed = match self.guard {
            Guard::File(path) => path.close(),
            Guard::Reserved { dir, .. } => dir.close(),
        };
        match removed {
            Ok(()) => debug!("Removed scratch file {shown}"),
            Err(e) => debug!("Ignoring cleanup failure for {shown}: {e}"),
        }
    }
}

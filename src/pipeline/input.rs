//! Input loading: read a PDF from a local path or stdin into memory.
//!
//! The pipeline works on an in-memory byte blob; this module is the only
//! place that touches the input file system. The PDF magic bytes (`%PDF`)
//! are checked so callers get a meaningful error rather than a pdfium one.
//! An empty file is returned as-is and rejected later as a missing document.

use crate::error::OcrError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path value that selects standard input.
pub const STDIN_PATH: &str = "-";

/// Read a PDF from `path`, or from stdin when `path` is `-`.
pub async fn read_pdf(path: impl AsRef<Path>) -> Result<Vec<u8>, OcrError> {
    let path = path.as_ref();

    let bytes = if path.as_os_str() == STDIN_PATH {
        read_stdin().await?
    } else {
        read_local(path).await?
    };

    check_magic(path, &bytes)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

async fn read_local(path: &Path) -> Result<Vec<u8>, OcrError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(OcrError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(OcrError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

async fn read_stdin() -> Result<Vec<u8>, OcrError> {
    tokio::task::spawn_blocking(|| {
        let mut buf = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .map(|_| buf)
            .map_err(|e| OcrError::Internal(format!("Failed to read stdin: {e}")))
    })
    .await
    .map_err(|e| OcrError::Internal(format!("stdin task panicked: {e}")))?
}

/// Reject non-empty content that does not start with `%PDF`.
pub fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), OcrError> {
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(OcrError::NotAPdf {
            path: PathBuf::from(path),
            magic,
        });
    }
    Ok(())
}

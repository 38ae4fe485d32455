// RuleCheck - platform/fs.rs
//
// File access for the CLI: bounded reads of input files and atomic writes
// of the report workbook.

use crate::util::error::{DatasetError, ExportError, Result, RuleCheckError};
use std::io::Write;
use std::path::Path;

/// Read a dataset file, rejecting it before reading if it exceeds `max_size`.
pub fn read_dataset_file(path: &Path, max_size: u64) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path).map_err(|e| io_error(path, "stat", e))?;
    if metadata.len() > max_size {
        return Err(DatasetError::TooLarge {
            size: metadata.len(),
            max_size,
        }
        .into());
    }

    let bytes = std::fs::read(path).map_err(|e| io_error(path, "read", e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Dataset file read");
    Ok(bytes)
}

/// Read a rule script as raw bytes. Size and encoding are checked by the
/// loader, so a non-UTF-8 file surfaces as a compile failure there.
pub fn read_script_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|e| io_error(path, "read", e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Rule script read");
    Ok(bytes)
}

/// Write `bytes` to `path` atomically.
///
/// The data goes to a sibling temp file which is then renamed over `path`,
/// so an interrupted export never leaves a truncated workbook behind. The
/// temp file is removed if anything fails before the rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::result::Result<(), ExportError> {
    let export_io = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(export_io)?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(export_io)?;
    tmp.persist(path).map_err(|e| export_io(e.error))?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "Report written");
    Ok(())
}

fn io_error(path: &Path, operation: &'static str, source: std::io::Error) -> RuleCheckError {
    RuleCheckError::Io {
        path: path.to_path_buf(),
        operation,
        source,
    }
}

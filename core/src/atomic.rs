//! Atomic document writes.

use std::path::Path;

use crate::error::DocumentError;

/// Write to `.tmp_<name>` beside `path`, then rename over it. Readers see
/// either the old document or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), DocumentError> {
    let io_err = |detail: String| DocumentError::Io {
        path: path.display().to_string(),
        detail,
    };
    let dir = path
        .parent()
        .ok_or_else(|| io_err("no parent directory".into()))?;
    let temp_name = format!(
        ".tmp_{}",
        path.file_name().unwrap_or_default().to_string_lossy()
    );
    let temp_path = dir.join(temp_name);

    std::fs::write(&temp_path, content)
        .map_err(|e| io_err(format!("write {}: {e}", temp_path.display())))?;
    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        io_err(format!("rename {}: {e}", temp_path.display()))
    })
}

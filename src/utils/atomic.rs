//! Atomic JSON document writes.
//!
//! Collections are persisted as whole JSON documents; a reader must never
//! observe a half-written file, so every write goes through a temp file in
//! the target directory followed by a rename.

use serde::Serialize;
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Missing parent directories are created first.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory"))?
        .to_path_buf();
    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    tokio::fs::create_dir_all(&parent).await?;
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        use std::io::Write;

        let mut temp_file = NamedTempFile::new_in(&parent)?;
        temp_file.write_all(&bytes)?;
        temp_file.flush()?;
        // persist consumes the temp file, so nothing is left behind on success
        temp_file.persist(&target)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}

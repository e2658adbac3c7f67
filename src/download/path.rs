//! Destination path planning.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::DownloadError;

/// Where a download will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPath {
    /// Absolute destination directory.
    pub directory: PathBuf,
    /// Absolute destination file.
    pub file_path: PathBuf,
}

/// Resolves `directory` to an absolute path and joins `file_name` onto it.
///
/// Missing directories are created unless `dry_run` is set.
///
/// # Errors
///
/// Returns [`DownloadError::PathResolution`] if the path exists but is not a
/// directory, cannot be created, or is read-only.
pub async fn plan_destination(
    directory: &Path,
    file_name: &str,
    dry_run: bool,
) -> Result<PlannedPath, DownloadError> {
    let directory = std::path::absolute(directory).map_err(|e| {
        DownloadError::path_io(directory, "cannot resolve to an absolute path", e)
    })?;

    match tokio::fs::metadata(&directory).await {
        Ok(meta) if !meta.is_dir() => {
            return Err(DownloadError::path_resolution(
                &directory,
                "exists but is not a directory",
            ));
        }
        Ok(meta) if meta.permissions().readonly() => {
            return Err(DownloadError::path_resolution(&directory, "directory is read-only"));
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if dry_run {
                debug!(path = %directory.display(), "dry run: directory would be created");
            } else {
                tokio::fs::create_dir_all(&directory).await.map_err(|e| {
                    DownloadError::path_io(&directory, "cannot create directory", e)
                })?;
                debug!(path = %directory.display(), "created destination directory");
            }
        }
        Err(e) => {
            return Err(DownloadError::path_io(&directory, "cannot inspect directory", e));
        }
    }

    let file_path = directory.join(file_name);
    Ok(PlannedPath {
        directory,
        file_path,
    })
}

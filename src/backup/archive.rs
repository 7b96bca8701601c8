// backupservice/src/backup/archive.rs
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;
use which::which;

use crate::errors::{BackupError, Result};

/// Finds the tar executable in the system PATH.
fn find_tar_executable() -> Result<PathBuf> {
    which("tar").map_err(|_| BackupError::ToolMissing { tool: "tar".into() })
}

/// Creates a gzipped tar archive of `source_dir` at `artifact_path` using
/// the external tar binary. Paths inside the archive are relative to the
/// source directory's parent, so extraction reproduces the tree under one
/// top-level directory.
pub async fn archive_directory(source_dir: &Path, artifact_path: &Path) -> Result<()> {
    let tar = find_tar_executable()?;

    // Canonicalize so a bare relative name like "uploads" still yields a
    // usable -C parent.
    let source_dir = source_dir.canonicalize()?;
    let parent = source_dir
        .parent()
        .ok_or_else(|| {
            BackupError::InvalidInput(format!(
                "cannot archive filesystem root {}",
                source_dir.display()
            ))
        })?
        .to_path_buf();
    let dir_name = source_dir.file_name().ok_or_else(|| {
        BackupError::InvalidInput(format!(
            "source directory {} has no name",
            source_dir.display()
        ))
    })?;

    info!(
        source = %source_dir.display(),
        artifact = %artifact_path.display(),
        "running tar"
    );

    let output = Command::new(&tar)
        .arg("-czf")
        .arg(artifact_path)
        .arg("-C")
        .arg(&parent)
        .arg(dir_name)
        .output()
        .await?;

    if !output.status.success() {
        let _ = tokio::fs::remove_file(artifact_path).await;
        return Err(BackupError::ToolExecution {
            tool: "tar".into(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}

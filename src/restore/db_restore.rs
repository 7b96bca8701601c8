// backupservice/src/restore/db_restore.rs
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;
use which::which;

use crate::errors::{BackupError, Result};

/// Finds the pg_restore executable in the system PATH.
fn find_pg_restore_executable() -> Result<PathBuf> {
    which("pg_restore").map_err(|_| BackupError::ToolMissing {
        tool: "pg_restore".into(),
    })
}

/// Replays a custom-format dump into the target database.
///
/// `--clean --if-exists` drops every object in the dump before recreating
/// it, so existing target state is destroyed. `--no-owner` keeps the restore
/// usable when the restoring role differs from the dumping one.
pub async fn run_pg_restore(database_url: &str, artifact_path: &Path) -> Result<()> {
    let pg_restore = find_pg_restore_executable()?;
    info!(artifact = %artifact_path.display(), "running pg_restore");

    let output = Command::new(&pg_restore)
        .arg("--clean")
        .arg("--if-exists")
        .arg("--no-owner")
        .arg("-d")
        .arg(database_url)
        .arg(artifact_path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(BackupError::ToolExecution {
            tool: "pg_restore".into(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}

// backupservice/src/retention/mod.rs
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use walkdir::WalkDir;

use crate::errors::Result;
use crate::store::ArtifactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted_count: u64,
}

/// Retires artifacts past their retention window.
pub struct RetentionManager {
    artifacts: Arc<ArtifactStore>,
}

impl RetentionManager {
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self { artifacts }
    }

    /// Deletes every artifact whose modification time is older than
    /// `now - keep_days` days and reports how many went. Rerunning with the
    /// same cutoff deletes nothing further.
    pub fn cleanup_old_backups(&self, keep_days: u32) -> Result<CleanupReport> {
        let cutoff = Utc::now() - Duration::days(i64::from(keep_days));
        let mut deleted_count = 0u64;

        for entry in WalkDir::new(self.artifacts.root()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let modified: DateTime<Utc> = entry
                .metadata()
                .map_err(std::io::Error::from)?
                .modified()?
                .into();
            if modified < cutoff {
                std::fs::remove_file(entry.path())?;
                deleted_count += 1;
                info!(
                    filename = %entry.file_name().to_string_lossy(),
                    modified = %modified,
                    "expired artifact deleted"
                );
            }
        }

        if deleted_count > 0 {
            info!(deleted_count, keep_days, "retention cleanup finished");
        }
        Ok(CleanupReport { deleted_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    #[test]
    fn zero_day_cutoff_deletes_existing_artifacts_once() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = Arc::new(ArtifactStore::open(dir.path())?);
        let retention = RetentionManager::new(Arc::clone(&artifacts));

        fs::write(artifacts.path_for("database_backup_a.gz"), b"a")?;
        fs::write(artifacts.path_for("files_backup_b.tar.gz"), b"b")?;
        // Subdirectories are left alone.
        fs::create_dir(artifacts.path_for("keep"))?;

        let before = artifacts.inventory()?.backup_count;
        // Ensure mtimes fall strictly before the cutoff taken at call time.
        sleep(StdDuration::from_millis(20));

        let report = retention.cleanup_old_backups(0)?;
        assert_eq!(report.deleted_count, 2);

        let after = artifacts.inventory()?.backup_count;
        assert_eq!(before, after + report.deleted_count as usize);
        assert!(artifacts.path_for("keep").is_dir());

        // Idempotent: nothing left to delete.
        let rerun = retention.cleanup_old_backups(0)?;
        assert_eq!(rerun.deleted_count, 0);
        Ok(())
    }

    #[test]
    fn fresh_artifacts_survive_a_long_window() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = Arc::new(ArtifactStore::open(dir.path())?);
        let retention = RetentionManager::new(Arc::clone(&artifacts));

        fs::write(artifacts.path_for("database_backup_now.gz"), b"fresh")?;

        let report = retention.cleanup_old_backups(30)?;
        assert_eq!(report.deleted_count, 0);
        assert!(artifacts.path_for("database_backup_now.gz").is_file());
        Ok(())
    }
}

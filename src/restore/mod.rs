// backupservice/src/restore/mod.rs
pub(crate) mod db_restore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::errors::Result;
use crate::store::ArtifactStore;

#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub filename: String,
    pub completed_at: DateTime<Utc>,
}

/// Replays a named database artifact into the target database.
pub struct RestoreExecutor {
    artifacts: Arc<ArtifactStore>,
    database_url: String,
}

impl RestoreExecutor {
    pub fn new(artifacts: Arc<ArtifactStore>, database_url: impl Into<String>) -> Self {
        Self {
            artifacts,
            database_url: database_url.into(),
        }
    }

    /// Restores the database from `filename`.
    ///
    /// **Destructive**: existing tables covered by the dump are dropped
    /// before recreation and the operation is not reversible. The filename
    /// is validated and resolved first; an unknown artifact returns
    /// `NotFound` without touching the target database.
    pub async fn restore_database(&self, filename: &str) -> Result<RestoreResult> {
        let path = self.artifacts.resolve(filename)?;
        db_restore::run_pg_restore(&self.database_url, &path).await?;

        info!(filename = %filename, "database restore finished");
        Ok(RestoreResult {
            filename: filename.to_string(),
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BackupError;

    // Resolution failures must short-circuit before pg_restore is spawned;
    // these run safely with no database anywhere near them.

    #[tokio::test]
    async fn missing_artifact_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = Arc::new(ArtifactStore::open(dir.path())?);
        let executor = RestoreExecutor::new(artifacts, "postgres://localhost/unused");

        let err = executor.restore_database("nonexistent.gz").await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn traversal_filenames_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = Arc::new(ArtifactStore::open(dir.path())?);
        let executor = RestoreExecutor::new(artifacts, "postgres://localhost/unused");

        let err = executor
            .restore_database("../../etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::InvalidInput(_)));
        Ok(())
    }
}

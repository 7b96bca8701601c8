// backupservice/src/backup/mod.rs
pub(crate) mod archive;
pub(crate) mod db_dump;
mod s3_upload;

pub use s3_upload::ArtifactUploader;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dispatch::JobRunner;
use crate::errors::Result;
use crate::store::ArtifactStore;
use crate::tasks::{BackupOutcome, TaskKind};

/// Produces one backup artifact per invocation by driving the external
/// dump/archive tools, then offers the result to the uploader.
pub struct BackupRunner {
    artifacts: Arc<ArtifactStore>,
    database_url: String,
    uploads_dir: PathBuf,
    uploader: ArtifactUploader,
}

impl BackupRunner {
    pub fn new(
        artifacts: Arc<ArtifactStore>,
        database_url: impl Into<String>,
        uploads_dir: impl Into<PathBuf>,
        uploader: ArtifactUploader,
    ) -> Self {
        Self {
            artifacts,
            database_url: database_url.into(),
            uploads_dir: uploads_dir.into(),
            uploader,
        }
    }

    /// Dumps the database into a fresh `.gz` artifact.
    pub async fn create_database_backup(&self) -> Result<BackupOutcome> {
        let filename = self.artifacts.next_filename(TaskKind::Database);
        let path = self.artifacts.path_for(&filename);

        db_dump::dump_database(&self.database_url, &path).await?;

        let mut artifact = self.artifacts.finalize(TaskKind::Database, &filename).await?;
        artifact.remote_url = self.uploader.upload(&artifact).await;
        info!(
            filename = %artifact.filename,
            size_bytes = artifact.size_bytes,
            "database backup created"
        );
        Ok(BackupOutcome::Created(artifact))
    }

    /// Archives the uploads tree into a fresh `.tar.gz` artifact. A missing
    /// uploads directory is a skip, not a failure.
    pub async fn create_files_backup(&self) -> Result<BackupOutcome> {
        if !self.uploads_dir.is_dir() {
            let reason = format!(
                "uploads directory {} does not exist",
                self.uploads_dir.display()
            );
            warn!("{}, skipping files backup", reason);
            return Ok(BackupOutcome::Skipped { reason });
        }

        let filename = self.artifacts.next_filename(TaskKind::Files);
        let path = self.artifacts.path_for(&filename);

        archive::archive_directory(&self.uploads_dir, &path).await?;

        let mut artifact = self.artifacts.finalize(TaskKind::Files, &filename).await?;
        artifact.remote_url = self.uploader.upload(&artifact).await;
        info!(
            filename = %artifact.filename,
            size_bytes = artifact.size_bytes,
            "files backup created"
        );
        Ok(BackupOutcome::Created(artifact))
    }
}

#[async_trait]
impl JobRunner for BackupRunner {
    async fn run(&self, kind: TaskKind) -> Result<BackupOutcome> {
        match kind {
            TaskKind::Database => self.create_database_backup().await,
            TaskKind::Files => self.create_files_backup().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn files_backup_skips_missing_uploads_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = Arc::new(ArtifactStore::open(dir.path().join("artifacts"))?);
        let runner = BackupRunner::new(
            artifacts.clone(),
            "postgres://localhost/unused",
            dir.path().join("no-such-uploads"),
            ArtifactUploader::disabled(),
        );

        match runner.create_files_backup().await? {
            BackupOutcome::Skipped { reason } => assert!(reason.contains("does not exist")),
            other => panic!("expected skip, got {:?}", other),
        }
        // Nothing was written.
        assert_eq!(artifacts.inventory()?.backup_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn files_backup_produces_an_artifact_without_remote_storage() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads)?;
        std::fs::write(uploads.join("report.txt"), b"contents")?;

        let artifacts = Arc::new(ArtifactStore::open(dir.path().join("artifacts"))?);
        let runner = BackupRunner::new(
            artifacts.clone(),
            "postgres://localhost/unused",
            &uploads,
            ArtifactUploader::disabled(),
        );

        match runner.create_files_backup().await? {
            BackupOutcome::Created(artifact) => {
                assert_eq!(artifact.kind, TaskKind::Files);
                assert!(artifact.filename.ends_with(".tar.gz"));
                assert!(artifact.size_bytes > 0);
                assert_eq!(artifact.remote_url, None);
                assert!(artifact.local_path.is_file());
            }
            other => panic!("expected artifact, got {:?}", other),
        }
        Ok(())
    }
}

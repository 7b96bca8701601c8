// backupservice/src/service/mod.rs
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditSink, LogAuditSink};
use crate::backup::{ArtifactUploader, BackupRunner};
use crate::config::{DispatchMode, ServiceConfig};
use crate::dispatch::{ImmediateDispatcher, JobDispatcher, QueuedDispatcher, Submission};
use crate::errors::Result;
use crate::restore::{RestoreExecutor, RestoreResult};
use crate::retention::{CleanupReport, RetentionManager};
use crate::store::{ArtifactInventory, ArtifactStore};
use crate::tasks::{
    BackupTask, InMemoryTaskStore, PostgresTaskStore, TaskKind, TaskStatusStore, TaskSummary,
};

/// Retention window applied by the scheduled maintenance pass.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Outcome of one scheduled maintenance pass. A `None` step errored and was
/// logged; `Blocked` submissions are normal and tolerated.
#[derive(Debug)]
pub struct MaintenanceReport {
    pub database: Option<Submission>,
    pub files: Option<Submission>,
    pub cleanup: Option<CleanupReport>,
}

/// The backup subsystem behind one explicitly constructed facade.
///
/// All collaborators are injected here at the composition root; the
/// artifact-root check happens when the [`ArtifactStore`] is opened, so a
/// service instance that exists is usable.
pub struct BackupService {
    artifacts: Arc<ArtifactStore>,
    tasks: Arc<dyn TaskStatusStore>,
    dispatcher: Arc<dyn JobDispatcher>,
    restore: RestoreExecutor,
    retention: RetentionManager,
}

impl BackupService {
    pub fn new(
        artifacts: Arc<ArtifactStore>,
        tasks: Arc<dyn TaskStatusStore>,
        dispatcher: Arc<dyn JobDispatcher>,
        restore: RestoreExecutor,
        retention: RetentionManager,
    ) -> Self {
        Self {
            artifacts,
            tasks,
            dispatcher,
            restore,
            retention,
        }
    }

    /// Standard wiring from configuration: artifact store (fails fast on an
    /// unusable root), backup runner with optional S3 offload, durable or
    /// in-memory task store, and the configured dispatch strategy.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let artifacts = Arc::new(ArtifactStore::open(&config.backup_dir)?);

        let uploader = ArtifactUploader::new(config.spaces.clone());
        let runner = Arc::new(BackupRunner::new(
            Arc::clone(&artifacts),
            config.database_url.clone(),
            config.uploads_dir.clone(),
            uploader,
        ));

        let tasks: Arc<dyn TaskStatusStore> = match &config.status_database_url {
            Some(url) => Arc::new(PostgresTaskStore::connect(url).await?),
            None => Arc::new(InMemoryTaskStore::new()),
        };

        let audit: Arc<dyn AuditSink> = Arc::new(LogAuditSink);
        let dispatcher: Arc<dyn JobDispatcher> = match config.dispatch {
            DispatchMode::Queued => Arc::new(QueuedDispatcher::start(
                Arc::clone(&tasks),
                runner,
                audit,
                config.worker_count,
            )),
            DispatchMode::Immediate => Arc::new(ImmediateDispatcher::new(runner, audit)),
        };

        let restore = RestoreExecutor::new(Arc::clone(&artifacts), config.database_url.clone());
        let retention = RetentionManager::new(Arc::clone(&artifacts));

        Ok(Self::new(artifacts, tasks, dispatcher, restore, retention))
    }

    /// Submits a new backup job of `kind`.
    pub async fn create(&self, kind: TaskKind, requested_by: &str) -> Result<Submission> {
        self.dispatcher.submit(kind, requested_by).await
    }

    /// Fetches one task record; unknown ids are `None`.
    pub async fn status(&self, task_id: Uuid) -> Result<Option<BackupTask>> {
        self.tasks.get_status(task_id).await
    }

    /// Denormalized summary over every task record.
    pub async fn statuses(&self) -> Result<TaskSummary> {
        self.tasks.all_statuses().await
    }

    /// Artifact inventory, most recent first.
    pub fn list(&self) -> Result<ArtifactInventory> {
        self.artifacts.inventory()
    }

    /// Restores the database from a named artifact. **Destructive**; see
    /// [`RestoreExecutor::restore_database`].
    pub async fn restore(&self, filename: &str) -> Result<RestoreResult> {
        self.restore.restore_database(filename).await
    }

    /// Deletes artifacts older than `keep_days` days.
    pub fn cleanup(&self, keep_days: u32) -> Result<CleanupReport> {
        self.retention.cleanup_old_backups(keep_days)
    }

    /// The periodic trigger contract: submit a database backup, submit a
    /// files backup, then retire expired artifacts. Every outcome is logged;
    /// `Blocked` and per-step failures never abort the pass.
    pub async fn run_scheduled_maintenance(&self) -> MaintenanceReport {
        let database = self.maintenance_create(TaskKind::Database).await;
        let files = self.maintenance_create(TaskKind::Files).await;

        let cleanup = match self.cleanup(DEFAULT_RETENTION_DAYS) {
            Ok(report) => {
                info!(deleted_count = report.deleted_count, "maintenance cleanup done");
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "maintenance cleanup failed");
                None
            }
        };

        MaintenanceReport {
            database,
            files,
            cleanup,
        }
    }

    async fn maintenance_create(&self, kind: TaskKind) -> Option<Submission> {
        match self.create(kind, "scheduler").await {
            Ok(Submission::Blocked) => {
                warn!(kind = %kind, "maintenance backup blocked, one is already in flight");
                Some(Submission::Blocked)
            }
            Ok(submission) => {
                info!(kind = %kind, "maintenance backup submitted");
                Some(submission)
            }
            Err(e) => {
                error!(kind = %kind, error = %e, "maintenance backup submission failed");
                None
            }
        }
    }
}

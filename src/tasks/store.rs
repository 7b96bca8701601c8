// backupservice/src/tasks/store.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::{BackupTask, TaskSummary};
use crate::errors::Result;

/// Outcome of asking the store to admit a new task.
///
/// `Blocked` is a normal outcome, not an error: it means a non-terminal task
/// of the same kind already exists and no new record was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Blocked,
}

/// Durable registry of task lifecycle records.
///
/// Admission is a single atomic operation on the store: the existence check
/// and the insert cannot interleave with a concurrent submission, so two
/// near-simultaneous callers can never both be admitted for one kind.
#[async_trait]
pub trait TaskStatusStore: Send + Sync {
    /// Upsert the record keyed by its task id.
    async fn set_status(&self, task: &BackupTask) -> Result<()>;

    /// Fetch one record; unknown ids are `None`, never an error.
    async fn get_status(&self, task_id: Uuid) -> Result<Option<BackupTask>>;

    /// Scan every record into a denormalized summary.
    async fn all_statuses(&self) -> Result<TaskSummary>;

    /// Insert `task` unless a non-terminal task of the same kind exists.
    /// The caller passes a freshly created `Queued` record.
    async fn try_admit(&self, task: &BackupTask) -> Result<Admission>;
}

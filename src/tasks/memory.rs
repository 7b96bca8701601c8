// backupservice/src/tasks/memory.rs
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::store::{Admission, TaskStatusStore};
use super::{BackupTask, TaskSummary};
use crate::errors::Result;

/// Mutex-guarded map of task records. Serves tests and single-process
/// deployments; the mutex makes `try_admit` check-and-insert atomic.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    records: Mutex<HashMap<Uuid, BackupTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStatusStore for InMemoryTaskStore {
    async fn set_status(&self, task: &BackupTask) -> Result<()> {
        let mut records = self.records.lock().expect("task store mutex poisoned");
        records.insert(task.task_id, task.clone());
        Ok(())
    }

    async fn get_status(&self, task_id: Uuid) -> Result<Option<BackupTask>> {
        let records = self.records.lock().expect("task store mutex poisoned");
        Ok(records.get(&task_id).cloned())
    }

    async fn all_statuses(&self) -> Result<TaskSummary> {
        let records = self.records.lock().expect("task store mutex poisoned");
        Ok(TaskSummary::from_tasks(records.values().cloned().collect()))
    }

    async fn try_admit(&self, task: &BackupTask) -> Result<Admission> {
        let mut records = self.records.lock().expect("task store mutex poisoned");
        let busy = records
            .values()
            .any(|t| t.kind == task.kind && !t.state.is_terminal());
        if busy {
            return Ok(Admission::Blocked);
        }
        records.insert(task.task_id, task.clone());
        Ok(Admission::Admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{BackupOutcome, TaskKind, TaskState};

    #[tokio::test]
    async fn admits_then_blocks_same_kind() -> anyhow::Result<()> {
        let store = InMemoryTaskStore::new();

        let first = BackupTask::queued(TaskKind::Database, "a");
        assert_eq!(store.try_admit(&first).await?, Admission::Admitted);

        let second = BackupTask::queued(TaskKind::Database, "b");
        assert_eq!(store.try_admit(&second).await?, Admission::Blocked);

        // A blocked submission must not leave a record behind.
        assert!(store.get_status(second.task_id).await?.is_none());
        assert_eq!(store.all_statuses().await?.total_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn other_kind_is_not_blocked() -> anyhow::Result<()> {
        let store = InMemoryTaskStore::new();
        store
            .try_admit(&BackupTask::queued(TaskKind::Database, "a"))
            .await?;

        let files = BackupTask::queued(TaskKind::Files, "a");
        assert_eq!(store.try_admit(&files).await?, Admission::Admitted);
        Ok(())
    }

    #[tokio::test]
    async fn terminal_task_frees_the_kind() -> anyhow::Result<()> {
        let store = InMemoryTaskStore::new();

        let mut first = BackupTask::queued(TaskKind::Files, "a");
        store.try_admit(&first).await?;
        first.mark_running();
        store.set_status(&first).await?;

        // Still running: blocked.
        let blocked = BackupTask::queued(TaskKind::Files, "b");
        assert_eq!(store.try_admit(&blocked).await?, Admission::Blocked);

        first.complete(BackupOutcome::Skipped {
            reason: "uploads directory missing".into(),
        });
        store.set_status(&first).await?;

        let admitted = BackupTask::queued(TaskKind::Files, "b");
        assert_eq!(store.try_admit(&admitted).await?, Admission::Admitted);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_task_id_is_none() -> anyhow::Result<()> {
        let store = InMemoryTaskStore::new();
        assert!(store.get_status(Uuid::new_v4()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn summary_reflects_state_transitions() -> anyhow::Result<()> {
        let store = InMemoryTaskStore::new();

        let mut task = BackupTask::queued(TaskKind::Database, "a");
        store.try_admit(&task).await?;
        task.mark_running();
        store.set_status(&task).await?;

        let summary = store.all_statuses().await?;
        assert_eq!(summary.running_count, 1);
        assert_eq!(summary.completed_count, 0);

        task.fail("pg_dump missing");
        store.set_status(&task).await?;

        let summary = store.all_statuses().await?;
        assert_eq!(summary.running_count, 0);
        assert_eq!(summary.failed_count, 1);
        match &summary.tasks[0].state {
            TaskState::Failed { error } => assert_eq!(error, "pg_dump missing"),
            other => panic!("expected failed, got {:?}", other),
        }
        Ok(())
    }
}

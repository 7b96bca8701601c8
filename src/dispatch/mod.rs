// backupservice/src/dispatch/mod.rs
mod worker;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::errors::{BackupError, Result};
use crate::tasks::{Admission, BackupOutcome, BackupTask, TaskKind, TaskStatusStore};

/// What a submission produced.
///
/// `Processing` with a task id means the job was admitted to the queue and
/// can be polled; without one it runs fire-and-forget and is observable only
/// through the audit sink. `Blocked` means a job of that kind is already in
/// flight and nothing new was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Processing { task_id: Option<Uuid> },
    Blocked,
}

/// The execution routine shared by both dispatch strategies: build the
/// artifact, offer it to the uploader, report the outcome. Implemented by
/// the backup runner; tests substitute stubs.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, kind: TaskKind) -> Result<BackupOutcome>;
}

/// Scheduling strategy seam. Exactly one strategy is wired at composition
/// time; both drive the same [`JobRunner`].
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn submit(&self, kind: TaskKind, requested_by: &str) -> Result<Submission>;
}

/// Runs the job inline on the host runtime, fire-and-forget. No admission
/// check, no task record: the caller learns the outcome only from the audit
/// sink.
pub struct ImmediateDispatcher {
    runner: Arc<dyn JobRunner>,
    audit: Arc<dyn AuditSink>,
}

impl ImmediateDispatcher {
    pub fn new(runner: Arc<dyn JobRunner>, audit: Arc<dyn AuditSink>) -> Self {
        Self { runner, audit }
    }
}

#[async_trait]
impl JobDispatcher for ImmediateDispatcher {
    async fn submit(&self, kind: TaskKind, requested_by: &str) -> Result<Submission> {
        debug!(kind = %kind, requested_by, "dispatching inline");
        let runner = Arc::clone(&self.runner);
        let audit = Arc::clone(&self.audit);
        tokio::spawn(async move {
            match runner.run(kind).await {
                Ok(outcome) => audit.record(AuditEvent::completed(kind, None, &outcome)).await,
                Err(e) => audit.record(AuditEvent::failed(kind, None, e.to_string())).await,
            }
        });
        Ok(Submission::Processing { task_id: None })
    }
}

/// Admits a task through the status store, then hands it to a pool of
/// workers fed from one shared queue. Each task is delivered to exactly one
/// worker.
pub struct QueuedDispatcher {
    tasks: Arc<dyn TaskStatusStore>,
    queue: mpsc::UnboundedSender<BackupTask>,
}

impl QueuedDispatcher {
    /// Spawns `worker_count` workers (at least one) and returns the
    /// dispatcher feeding them.
    pub fn start(
        tasks: Arc<dyn TaskStatusStore>,
        runner: Arc<dyn JobRunner>,
        audit: Arc<dyn AuditSink>,
        worker_count: usize,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let worker_count = worker_count.max(1);
        for worker_id in 0..worker_count {
            tokio::spawn(worker::run_worker(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&tasks),
                Arc::clone(&runner),
                Arc::clone(&audit),
            ));
        }
        info!(worker_count, "backup worker pool started");
        Self { tasks, queue }
    }
}

#[async_trait]
impl JobDispatcher for QueuedDispatcher {
    async fn submit(&self, kind: TaskKind, requested_by: &str) -> Result<Submission> {
        let task = BackupTask::queued(kind, requested_by);
        match self.tasks.try_admit(&task).await? {
            Admission::Blocked => {
                info!(kind = %kind, "submission blocked, a job of this kind is in flight");
                Ok(Submission::Blocked)
            }
            Admission::Admitted => {
                let task_id = task.task_id;
                if self.queue.send(task.clone()).is_err() {
                    // Workers are gone; don't leave the record queued forever.
                    let mut task = task;
                    task.fail("worker pool unavailable");
                    self.tasks.set_status(&task).await?;
                    return Err(BackupError::Dispatch("worker pool unavailable".into()));
                }
                debug!(kind = %kind, task_id = %task_id, "task enqueued");
                Ok(Submission::Processing {
                    task_id: Some(task_id),
                })
            }
        }
    }
}

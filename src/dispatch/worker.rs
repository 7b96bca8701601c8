// backupservice/src/dispatch/worker.rs
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use super::JobRunner;
use crate::audit::{AuditEvent, AuditSink};
use crate::tasks::{BackupTask, TaskStatusStore};

/// Worker loop: pull one task at a time off the shared queue, drive it
/// through `Running` to its terminal state, persist each transition and emit
/// one audit event for the outcome. Exits when the queue closes.
pub(crate) async fn run_worker(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<BackupTask>>>,
    tasks: Arc<dyn TaskStatusStore>,
    runner: Arc<dyn JobRunner>,
    audit: Arc<dyn AuditSink>,
) {
    loop {
        // The lock is held only while waiting for the next message, so
        // delivery stays single-consumer while processing runs unlocked.
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(mut task) = next else {
            debug!(worker_id, "queue closed, worker exiting");
            break;
        };

        debug!(worker_id, task_id = %task.task_id, kind = %task.kind, "task picked up");
        task.mark_running();
        persist(&tasks, &task).await;

        let event = match runner.run(task.kind).await {
            Ok(outcome) => {
                let event = AuditEvent::completed(task.kind, Some(task.task_id), &outcome);
                task.complete(outcome);
                event
            }
            Err(e) => {
                let message = e.to_string();
                task.fail(message.clone());
                AuditEvent::failed(task.kind, Some(task.task_id), message)
            }
        };
        persist(&tasks, &task).await;
        audit.record(event).await;
    }
}

/// Status writes must not kill the worker; an unreachable store is logged
/// and the job carries on so the artifact work still happens.
async fn persist(tasks: &Arc<dyn TaskStatusStore>, task: &BackupTask) {
    if let Err(e) = tasks.set_status(task).await {
        error!(
            task_id = %task.task_id,
            status = task.state.name(),
            error = %e,
            "failed to persist task status"
        );
    }
}

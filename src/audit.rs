// backupservice/src/audit.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::tasks::{BackupOutcome, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Completed,
    Failed,
}

/// One job outcome, mirrored to the audit trail. These records are derived
/// copies; the task store stays authoritative.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub kind: TaskKind,
    pub outcome: AuditOutcome,
    /// Absent for jobs run through the immediate strategy.
    pub task_id: Option<Uuid>,
    pub filename: Option<String>,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn completed(kind: TaskKind, task_id: Option<Uuid>, result: &BackupOutcome) -> Self {
        Self {
            kind,
            outcome: AuditOutcome::Completed,
            task_id,
            filename: result.artifact().map(|a| a.filename.clone()),
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(kind: TaskKind, task_id: Option<Uuid>, error: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: AuditOutcome::Failed,
            task_id,
            filename: None,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// Where completed/failed job events are recorded. The production sink
/// lives outside this crate; this is its boundary.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Default sink: structured log lines only.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, event: AuditEvent) {
        match event.outcome {
            AuditOutcome::Completed => info!(
                kind = %event.kind,
                task_id = ?event.task_id,
                filename = ?event.filename,
                "backup job completed"
            ),
            AuditOutcome::Failed => error!(
                kind = %event.kind,
                task_id = ?event.task_id,
                error = ?event.error,
                "backup job failed"
            ),
        }
    }
}

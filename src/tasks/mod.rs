// backupservice/src/tasks/mod.rs
mod memory;
mod postgres;
mod store;

pub use memory::InMemoryTaskStore;
pub use postgres::PostgresTaskStore;
pub use store::{Admission, TaskStatusStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::BackupError;
use crate::store::BackupArtifact;

/// Backup category. Each kind has at most one non-terminal task at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Database,
    Files,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Database => "database",
            TaskKind::Files => "files",
        }
    }

    /// Artifact extension for this kind: `.gz` for database dumps,
    /// `.tar.gz` for file-tree archives.
    pub fn artifact_extension(&self) -> &'static str {
        match self {
            TaskKind::Database => "gz",
            TaskKind::Files => "tar.gz",
        }
    }

    pub fn parse(s: &str) -> crate::errors::Result<Self> {
        match s {
            "database" => Ok(TaskKind::Database),
            "files" => Ok(TaskKind::Files),
            other => Err(BackupError::InvalidInput(format!(
                "unknown backup kind '{}', expected 'database' or 'files'",
                other
            ))),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful backup job produced.
///
/// `Skipped` exists only for the files backup whose source directory is
/// absent; every other completion carries the artifact it created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum BackupOutcome {
    Created(BackupArtifact),
    Skipped { reason: String },
}

impl BackupOutcome {
    pub fn artifact(&self) -> Option<&BackupArtifact> {
        match self {
            BackupOutcome::Created(artifact) => Some(artifact),
            BackupOutcome::Skipped { .. } => None,
        }
    }
}

/// Task lifecycle state. The payload lives on the terminal variants so an
/// invalid combination (a result on a queued task, a completed task without
/// one) cannot be constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Completed { result: BackupOutcome },
    Failed { error: String },
}

impl TaskState {
    pub fn name(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Completed { .. } => "completed",
            TaskState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed { .. } | TaskState::Failed { .. })
    }
}

/// One tracked execution attempt of a backup job.
///
/// Records are created at admission, mutated only by the worker executing
/// the job, and kept as history after reaching a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupTask {
    pub task_id: Uuid,
    pub kind: TaskKind,
    #[serde(flatten)]
    pub state: TaskState,
    pub requested_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BackupTask {
    pub fn queued(kind: TaskKind, requested_by: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            kind,
            state: TaskState::Queued,
            requested_by: requested_by.into(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = TaskState::Running;
    }

    pub fn complete(&mut self, result: BackupOutcome) {
        self.state = TaskState::Completed { result };
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = TaskState::Failed { error: error.into() };
        self.completed_at = Some(Utc::now());
    }
}

/// Denormalized view over every task record, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub tasks: Vec<BackupTask>,
    pub total_count: usize,
    pub running_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
}

impl TaskSummary {
    pub fn from_tasks(mut tasks: Vec<BackupTask>) -> Self {
        tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let total_count = tasks.len();
        let running_count = tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Running))
            .count();
        let completed_count = tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Completed { .. }))
            .count();
        let failed_count = tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Failed { .. }))
            .count();
        Self {
            tasks,
            total_count,
            running_count,
            completed_count,
            failed_count,
        }
    }
}

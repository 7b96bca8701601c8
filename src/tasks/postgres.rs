// backupservice/src/tasks/postgres.rs
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use super::store::{Admission, TaskStatusStore};
use super::{BackupTask, TaskKind, TaskState, TaskSummary};
use crate::errors::{BackupError, Result};

/// Unique-violation SQLSTATE; raised by the partial index below when a
/// second non-terminal task of one kind is inserted.
const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS backup_tasks (
    task_id      UUID PRIMARY KEY,
    kind         TEXT NOT NULL,
    status       TEXT NOT NULL,
    requested_by TEXT NOT NULL,
    started_at   TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ,
    error        TEXT,
    result       JSONB
);
"#;

/// One active (queued or running) task per kind, enforced by the database
/// rather than by a read-then-write check.
const ACTIVE_KIND_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS backup_tasks_one_active_per_kind
    ON backup_tasks (kind)
    WHERE status IN ('queued', 'running');
"#;

/// Task store backed by a dedicated `backup_tasks` table. Connections are
/// acquired from the pool per call and released on drop.
pub struct PostgresTaskStore {
    pool: PgPool,
}

impl PostgresTaskStore {
    /// Connects and bootstraps the schema. Fails fast if the status
    /// database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query(ACTIVE_KIND_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

fn state_columns(state: &TaskState) -> Result<(Option<String>, Option<serde_json::Value>)> {
    match state {
        TaskState::Queued | TaskState::Running => Ok((None, None)),
        TaskState::Completed { result } => Ok((None, Some(serde_json::to_value(result)?))),
        TaskState::Failed { error } => Ok((Some(error.clone()), None)),
    }
}

fn task_from_row(row: &PgRow) -> Result<BackupTask> {
    let status: String = row.try_get("status")?;
    let state = match status.as_str() {
        "queued" => TaskState::Queued,
        "running" => TaskState::Running,
        "completed" => {
            let result: Option<serde_json::Value> = row.try_get("result")?;
            let result = result.ok_or_else(|| {
                BackupError::InvalidInput("completed task record without a result".into())
            })?;
            TaskState::Completed {
                result: serde_json::from_value(result)?,
            }
        }
        "failed" => TaskState::Failed {
            error: row.try_get("error")?,
        },
        other => {
            return Err(BackupError::InvalidInput(format!(
                "unknown task status '{}' in store",
                other
            )));
        }
    };

    let kind: String = row.try_get("kind")?;
    Ok(BackupTask {
        task_id: row.try_get("task_id")?,
        kind: TaskKind::parse(&kind)?,
        state,
        requested_by: row.try_get("requested_by")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl TaskStatusStore for PostgresTaskStore {
    async fn set_status(&self, task: &BackupTask) -> Result<()> {
        let (error, result) = state_columns(&task.state)?;
        sqlx::query(
            r#"
            INSERT INTO backup_tasks
                (task_id, kind, status, requested_by, started_at, completed_at, error, result)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (task_id) DO UPDATE SET
                status = EXCLUDED.status,
                completed_at = EXCLUDED.completed_at,
                error = EXCLUDED.error,
                result = EXCLUDED.result
            "#,
        )
        .bind(task.task_id)
        .bind(task.kind.as_str())
        .bind(task.state.name())
        .bind(&task.requested_by)
        .bind(task.started_at)
        .bind(task.completed_at)
        .bind(error)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_status(&self, task_id: Uuid) -> Result<Option<BackupTask>> {
        let row = sqlx::query("SELECT * FROM backup_tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn all_statuses(&self) -> Result<TaskSummary> {
        let rows = sqlx::query("SELECT * FROM backup_tasks ORDER BY started_at DESC")
            .fetch_all(&self.pool)
            .await?;
        let tasks = rows
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(TaskSummary::from_tasks(tasks))
    }

    async fn try_admit(&self, task: &BackupTask) -> Result<Admission> {
        let (error, result) = state_columns(&task.state)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO backup_tasks
                (task_id, kind, status, requested_by, started_at, completed_at, error, result)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(task.task_id)
        .bind(task.kind.as_str())
        .bind(task.state.name())
        .bind(&task.requested_by)
        .bind(task.started_at)
        .bind(task.completed_at)
        .bind(error)
        .bind(result)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(Admission::Admitted),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Ok(Admission::Blocked)
            }
            Err(e) => Err(e.into()),
        }
    }
}

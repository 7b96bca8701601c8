//! Backup service CLI
//!
//! Maps command verbs onto the backup service operations: submitting backup
//! jobs, polling their status, restoring, listing and retiring artifacts.

// backupservice/src/main.rs
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use uuid::Uuid;

use backupservice::config::ServiceConfig;
use backupservice::dispatch::Submission;
use backupservice::service::{BackupService, DEFAULT_RETENTION_DAYS};
use backupservice::tasks::{TaskKind, TaskState};

/// Main entry point for the backup service CLI
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("backupservice=info")),
        )
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // Expects config.json next to the executable or in the project root
    // when running with `cargo run`; environment variables override it.
    let config_path = PathBuf::from("config.json");
    let config = ServiceConfig::load(&config_path)
        .context(format!("Failed to load configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    let service = BackupService::from_config(&config)
        .await
        .context("Failed to initialise the backup service")?;

    match choice.as_str() {
        "1" | "backup-db" => {
            println!("🚀 Submitting database backup...");
            if !check_database_connection(&config.database_url).await {
                anyhow::bail!("Cannot proceed with backup - database connection failed");
            }
            submit_and_wait(&service, TaskKind::Database).await?;
        }
        "2" | "backup-files" => {
            println!("🚀 Submitting files backup...");
            submit_and_wait(&service, TaskKind::Files).await?;
        }
        "3" | "restore" => {
            let filename = match args.get(2) {
                Some(name) => name.clone(),
                None => prompt_line("Enter the artifact filename to restore: ")?,
            };
            println!("⚠️ Restore drops existing tables in the target database before recreating them.");
            println!("🔄 Restoring from {}...", filename);
            let result = service
                .restore(&filename)
                .await
                .context("Restore process failed")?;
            println!("✓ Restored {} at {}", result.filename, result.completed_at);
        }
        "4" | "cleanup" => {
            let keep_days = match args.get(2) {
                Some(days) => days
                    .parse()
                    .context("cleanup takes the number of days to keep as an integer")?,
                None => DEFAULT_RETENTION_DAYS,
            };
            println!("🧹 Deleting artifacts older than {} days...", keep_days);
            let report = service.cleanup(keep_days)?;
            println!("✓ Deleted {} expired artifact(s)", report.deleted_count);
        }
        "5" | "list" => {
            let inventory = service.list()?;
            println!(
                "📦 {} artifact(s), {} bytes total",
                inventory.backup_count, inventory.total_size_bytes
            );
            if let Some(latest) = &inventory.latest_backup {
                println!("Latest: {}", latest);
            }
            for entry in &inventory.backups {
                println!(
                    "  {}  {:>12} bytes  {}",
                    entry.filename, entry.size_bytes, entry.modified_at
                );
            }
        }
        "6" | "status" => {
            let task_id: Uuid = args
                .get(2)
                .context("status takes a task id")?
                .parse()
                .context("task id must be a UUID")?;
            match service.status(task_id).await? {
                Some(task) => println!("{}", serde_json::to_string_pretty(&task)?),
                None => println!("No task found with id {}", task_id),
            }
        }
        "7" | "statuses" => {
            let summary = service.statuses().await?;
            println!(
                "📊 {} task(s): {} running, {} completed, {} failed",
                summary.total_count,
                summary.running_count,
                summary.completed_count,
                summary.failed_count
            );
            for task in &summary.tasks {
                println!(
                    "  {}  {}  {}  requested by {}",
                    task.task_id,
                    task.kind,
                    task.state.name(),
                    task.requested_by
                );
            }
        }
        "8" | "maintenance" => {
            println!("🗓 Running scheduled maintenance pass...");
            let report = service.run_scheduled_maintenance().await;
            println!(
                "✓ database: {}, files: {}, cleanup: {}",
                describe_submission(&report.database),
                describe_submission(&report.files),
                report
                    .cleanup
                    .map(|c| format!("{} deleted", c.deleted_count))
                    .unwrap_or_else(|| "failed".to_string()),
            );
        }
        _ => {
            println!("❌ Invalid choice. Run without arguments to see the menu.");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Submits a job and polls its status until it reaches a terminal state.
async fn submit_and_wait(service: &BackupService, kind: TaskKind) -> Result<()> {
    match service.create(kind, "cli").await? {
        Submission::Blocked => {
            println!("⚠️ A {} backup is already in flight; nothing was submitted.", kind);
            Ok(())
        }
        Submission::Processing { task_id: None } => {
            println!("🚀 Backup running in the background; outcome goes to the audit log.");
            Ok(())
        }
        Submission::Processing { task_id: Some(id) } => {
            println!("⏳ Task {} submitted, waiting...", id);
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let Some(task) = service.status(id).await? else {
                    anyhow::bail!("Task {} disappeared from the status store", id);
                };
                match &task.state {
                    TaskState::Completed { result } => {
                        match result.artifact() {
                            Some(artifact) => {
                                println!(
                                    "✓ Backup completed: {} ({} bytes{})",
                                    artifact.filename,
                                    artifact.size_bytes,
                                    artifact
                                        .remote_url
                                        .as_deref()
                                        .map(|u| format!(", uploaded to {}", u))
                                        .unwrap_or_default()
                                );
                            }
                            None => println!("✓ Backup completed with nothing to do."),
                        }
                        return Ok(());
                    }
                    TaskState::Failed { error } => {
                        anyhow::bail!("Backup task {} failed: {}", id, error);
                    }
                    TaskState::Queued | TaskState::Running => {}
                }
            }
        }
    }
}

fn describe_submission(submission: &Option<Submission>) -> String {
    match submission {
        Some(Submission::Processing { task_id: Some(id) }) => format!("submitted ({})", id),
        Some(Submission::Processing { task_id: None }) => "submitted".to_string(),
        Some(Submission::Blocked) => "blocked".to_string(),
        None => "failed".to_string(),
    }
}

/// Quick connectivity probe so an unreachable database fails the run before
/// a job is submitted.
async fn check_database_connection(database_url: &str) -> bool {
    use sqlx::Connection;
    match sqlx::postgres::PgConnection::connect(database_url).await {
        Ok(conn) => {
            let _ = conn.close().await;
            println!("✅ Database connection verified");
            true
        }
        Err(e) => {
            eprintln!("❌ Database connection failed: {}", e);
            false
        }
    }
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    println!("Select an operation:");
    println!("1. Database backup (or type 'backup-db')");
    println!("2. Files backup (or type 'backup-files')");
    println!("3. Restore a database backup (or type 'restore')");
    println!("4. Delete expired artifacts (or type 'cleanup')");
    println!("5. List artifacts (or type 'list')");
    println!("6. Show one task (or type 'status')");
    println!("7. Show all tasks (or type 'statuses')");
    println!("8. Scheduled maintenance pass (or type 'maintenance')");
    prompt_line("Enter your choice: ")
}

fn prompt_line(prompt: &str) -> Result<String> {
    use std::io::{stdin, stdout, Write};

    print!("{}", prompt);
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}

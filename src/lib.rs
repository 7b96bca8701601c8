// backupservice/src/lib.rs
//! Backup job orchestration for the licensing platform backend.
//!
//! Creates database and file-tree backups as asynchronous jobs, tracks
//! their lifecycle in a durable status store, keeps at most one job of a
//! kind in flight, optionally offloads artifacts to S3-compatible object
//! storage, and retires old artifacts on a retention policy. The HTTP layer
//! maps its verbs onto [`service::BackupService`]; the bundled CLI does the
//! same.

pub mod audit;
pub mod backup;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod restore;
pub mod retention;
pub mod service;
pub mod store;
pub mod tasks;

pub use errors::{BackupError, Result};
pub use service::BackupService;

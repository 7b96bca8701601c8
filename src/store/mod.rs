// backupservice/src/store/mod.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{BackupError, Result};
use crate::tasks::TaskKind;

/// Upper bound on the `backups` page returned by [`ArtifactStore::inventory`].
/// Count and size totals still cover everything on disk.
const LIST_PAGE_LIMIT: usize = 100;

/// A single finished backup file. Immutable once written; only the
/// retention pass deletes the underlying file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub kind: TaskKind,
    pub filename: String,
    pub size_bytes: u64,
    pub local_path: PathBuf,
    pub remote_url: Option<String>,
    /// SHA-256 over the artifact file, hex-encoded.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub filename: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInventory {
    pub backup_count: usize,
    pub total_size_bytes: u64,
    pub latest_backup: Option<String>,
    pub backups: Vec<ArtifactEntry>,
}

/// Local filesystem area holding backup artifacts.
///
/// The root directory is resolved and created at construction; a root that
/// cannot be created disables the whole service (`Uninitialized`).
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| BackupError::Uninitialized {
            path: root.clone(),
            source,
        })?;
        debug!(root = %root.display(), "artifact store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Timestamped artifact name for a new backup of `kind`, e.g.
    /// `database_backup_20260807_141503.gz`. Second resolution is enough:
    /// same-kind concurrency is excluded at admission and kinds carry
    /// distinct prefixes.
    pub fn next_filename(&self, kind: TaskKind) -> String {
        format!(
            "{}_backup_{}.{}",
            kind.as_str(),
            Utc::now().format("%Y%m%d_%H%M%S"),
            kind.artifact_extension()
        )
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Resolves an existing artifact by bare filename. Rejects anything that
    /// could escape the root and reports missing files as `NotFound`;
    /// callers check this before spawning any destructive tool.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename.contains("..")
        {
            return Err(BackupError::InvalidInput(format!(
                "'{}' is not a plain artifact filename",
                filename
            )));
        }
        let path = self.root.join(filename);
        if !path.is_file() {
            return Err(BackupError::NotFound(format!(
                "backup artifact '{}' does not exist",
                filename
            )));
        }
        Ok(path)
    }

    /// Builds the artifact record for a file the dump/archive tool just
    /// wrote under the root: size from metadata, checksum streamed off disk.
    pub async fn finalize(&self, kind: TaskKind, filename: &str) -> Result<BackupArtifact> {
        let path = self.root.join(filename);
        let metadata = tokio::fs::metadata(&path).await?;
        let checksum = file_checksum(&path).await?;
        Ok(BackupArtifact {
            kind,
            filename: filename.to_string(),
            size_bytes: metadata.len(),
            local_path: path,
            remote_url: None,
            checksum,
            created_at: Utc::now(),
        })
    }

    /// Inventory of everything under the root, most recent first.
    pub fn inventory(&self) -> Result<ArtifactInventory> {
        let mut entries = Vec::new();
        let mut total_size_bytes = 0u64;

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata().map_err(std::io::Error::from)?;
            total_size_bytes += metadata.len();
            entries.push(ArtifactEntry {
                filename: entry.file_name().to_string_lossy().into_owned(),
                size_bytes: metadata.len(),
                modified_at: metadata.modified()?.into(),
            });
        }

        entries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        let backup_count = entries.len();
        let latest_backup = entries.first().map(|e| e.filename.clone());
        entries.truncate(LIST_PAGE_LIMIT);

        Ok(ArtifactInventory {
            backup_count,
            total_size_bytes,
            latest_backup,
            backups: entries,
        })
    }
}

async fn file_checksum(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_the_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("artifacts");
        assert!(!root.exists());

        let store = ArtifactStore::open(&root)?;
        assert!(store.root().is_dir());
        Ok(())
    }

    #[test]
    fn open_fails_fast_when_root_is_unusable() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // A regular file where a directory is needed.
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"x")?;

        let err = ArtifactStore::open(blocker.join("nested")).unwrap_err();
        assert!(matches!(err, BackupError::Uninitialized { .. }));
        Ok(())
    }

    #[test]
    fn filenames_follow_the_kind_scheme() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::open(dir.path())?;

        let db = store.next_filename(TaskKind::Database);
        assert!(db.starts_with("database_backup_"), "got {}", db);
        assert!(db.ends_with(".gz"));

        let files = store.next_filename(TaskKind::Files);
        assert!(files.starts_with("files_backup_"), "got {}", files);
        assert!(files.ends_with(".tar.gz"));
        Ok(())
    }

    #[test]
    fn resolve_rejects_traversal_and_missing_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::open(dir.path())?;

        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(BackupError::InvalidInput(_))
        ));
        assert!(matches!(
            store.resolve("sub/dir.gz"),
            Err(BackupError::InvalidInput(_))
        ));
        assert!(matches!(
            store.resolve("nonexistent.gz"),
            Err(BackupError::NotFound(_))
        ));

        std::fs::write(store.path_for("real.gz"), b"dump")?;
        assert_eq!(store.resolve("real.gz")?, store.path_for("real.gz"));
        Ok(())
    }

    #[tokio::test]
    async fn finalize_records_size_and_checksum() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::open(dir.path())?;
        std::fs::write(store.path_for("database_backup_x.gz"), b"dump-bytes")?;

        let artifact = store
            .finalize(TaskKind::Database, "database_backup_x.gz")
            .await?;
        assert_eq!(artifact.size_bytes, 10);
        assert_eq!(artifact.checksum.len(), 64);
        assert!(artifact.remote_url.is_none());

        // Same content, same checksum.
        std::fs::write(store.path_for("copy.gz"), b"dump-bytes")?;
        let copy = store.finalize(TaskKind::Database, "copy.gz").await?;
        assert_eq!(copy.checksum, artifact.checksum);
        Ok(())
    }

    #[test]
    fn inventory_is_newest_first_with_totals() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::open(dir.path())?;

        std::fs::write(store.path_for("older.gz"), vec![0u8; 100])?;
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(store.path_for("newer.tar.gz"), vec![0u8; 50])?;
        // Directories are not artifacts.
        std::fs::create_dir(store.path_for("scratch"))?;

        let inventory = store.inventory()?;
        assert_eq!(inventory.backup_count, 2);
        assert_eq!(inventory.total_size_bytes, 150);
        assert_eq!(inventory.latest_backup.as_deref(), Some("newer.tar.gz"));
        assert_eq!(inventory.backups[0].filename, "newer.tar.gz");
        assert_eq!(inventory.backups[1].filename, "older.gz");
        Ok(())
    }
}

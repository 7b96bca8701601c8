// backupservice/src/backup/s3_upload.rs
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use tracing::{info, warn};

use crate::config::SpacesConfig;
use crate::errors::{BackupError, Result};
use crate::store::BackupArtifact;

/// Remote object keys live under one fixed prefix in the bucket.
const REMOTE_KEY_PREFIX: &str = "backups";

/// Copies finished artifacts to an S3-compatible object store (DigitalOcean
/// Spaces and friends).
///
/// Without configuration every upload is a silent no-op; with it, a failed
/// upload is logged and swallowed: the artifact stays valid locally and the
/// backup never fails because of the offload.
pub struct ArtifactUploader {
    config: Option<SpacesConfig>,
}

impl ArtifactUploader {
    pub fn new(config: Option<SpacesConfig>) -> Self {
        Self { config }
    }

    pub fn disabled() -> Self {
        Self { config: None }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Returns the remote URL of the uploaded copy, or `None` when remote
    /// storage is unconfigured or the upload failed.
    pub async fn upload(&self, artifact: &BackupArtifact) -> Option<String> {
        let config = self.config.as_ref()?;
        match put_artifact(config, artifact).await {
            Ok(url) => {
                info!(filename = %artifact.filename, remote_url = %url, "artifact uploaded");
                Some(url)
            }
            Err(e) => {
                warn!(
                    filename = %artifact.filename,
                    error = %e,
                    "artifact upload failed, keeping local copy only"
                );
                None
            }
        }
    }
}

async fn put_artifact(config: &SpacesConfig, artifact: &BackupArtifact) -> Result<String> {
    let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
        .endpoint_url(&config.endpoint_url)
        .region(Region::new(config.region.clone()))
        .credentials_provider(s3::config::Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "Static",
        ))
        .load()
        .await;

    let client = s3::Client::new(&sdk_config);
    let key = format!("{}/{}", REMOTE_KEY_PREFIX, artifact.filename);

    let body = ByteStream::from_path(&artifact.local_path)
        .await
        .map_err(|e| BackupError::StorageUpload(e.to_string()))?;

    client
        .put_object()
        .bucket(&config.bucket_name)
        .key(&key)
        .body(body)
        .send()
        .await
        .map_err(|e| BackupError::StorageUpload(e.to_string()))?;

    Ok(format!("s3://{}/{}", config.bucket_name, key))
}

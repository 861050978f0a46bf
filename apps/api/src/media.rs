//! Media upload module.
//!
//! Files arrive as multipart parts, are staged under the upload directory,
//! pushed to Cloudinary, and the staged copy is removed whatever the outcome.
//!
//! ```text
//! multipart part ──► UPLOAD_DIR/<uuid>-<name> ──► Cloudinary ──► secure_url
//!                                   │
//!                                   └── removed after the attempt
//! ```

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::CloudinaryConfig;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    /// Public (https) URL of the stored asset.
    pub url: String,
    pub public_id: String,
    /// Seconds, only reported for audio/video.
    pub duration: Option<f64>,
}

/// Upload errors.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Media storage is not configured")]
    NotConfigured,

    #[error("Failed to read staged file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Remote blob storage.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Sends one local file to the provider.
    async fn upload_file(&self, local_path: &Path) -> Result<UploadedMedia, MediaError>;

    /// Uploads `local_path` if given, then removes the local file.
    ///
    /// `None` returns `Ok(None)` without contacting the provider.
    async fn upload(&self, local_path: Option<&Path>) -> Result<Option<UploadedMedia>, MediaError> {
        let Some(path) = local_path else {
            return Ok(None);
        };

        let result = self.upload_file(path).await;
        remove_staged_file(path).await;

        result.map(Some)
    }
}

/// Deletes a staged upload. A file that is already gone is fine.
pub async fn remove_staged_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed staged file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged file"),
    }
}

// =============================================================================
// Cloudinary
// =============================================================================

#[derive(Debug, Deserialize)]
struct CloudinaryUpload {
    url: String,
    secure_url: Option<String>,
    public_id: String,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorBody {
    error: CloudinaryErrorMessage,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorMessage {
    message: String,
}

/// Uploads to Cloudinary's `auto` endpoint with a signed request.
pub struct CloudinaryUploader {
    client: Client,
    config: Option<CloudinaryConfig>,
}

impl CloudinaryUploader {
    /// `None` builds an uploader whose every upload fails with
    /// [`MediaError::NotConfigured`].
    pub fn new(config: Option<CloudinaryConfig>) -> Result<Self, MediaError> {
        let client = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(CloudinaryUploader { client, config })
    }

    fn endpoint(config: &CloudinaryConfig) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            config.cloud_name
        )
    }
}

/// Cloudinary request signature: hex SHA-256 of the sorted signed
/// parameters followed by the API secret.
fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload_file(&self, local_path: &Path) -> Result<UploadedMedia, MediaError> {
        let config = self.config.as_ref().ok_or(MediaError::NotConfigured)?;

        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(&[("timestamp", timestamp.clone())], &config.api_secret);

        let form = Form::new()
            .text("api_key", config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .part("file", Part::bytes(bytes).file_name(file_name));

        debug!(path = %local_path.display(), "Uploading to Cloudinary");

        let response = self
            .client
            .post(Self::endpoint(config))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<CloudinaryErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!(status = status.as_u16(), %message, "Cloudinary rejected upload");
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: CloudinaryUpload = response.json().await?;
        info!(public_id = %body.public_id, "File uploaded to Cloudinary");

        Ok(UploadedMedia {
            url: body.secure_url.unwrap_or(body.url),
            public_id: body.public_id,
            duration: body.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_sha256_of_sorted_params_and_secret() {
        let signature = sign_params(&[("timestamp", "1315060510".to_string())], "abcd");
        assert_eq!(
            signature,
            "5652e549a70bdc03f73a633a23b7d3f3b067d72fff26dd15b25997f46fdf6439"
        );
    }

    #[test]
    fn test_signature_param_order_does_not_matter() {
        let a = sign_params(
            &[("timestamp", "1".to_string()), ("folder", "x".to_string())],
            "s",
        );
        let b = sign_params(
            &[("folder", "x".to_string()), ("timestamp", "1".to_string())],
            "s",
        );
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_absent_path_is_not_an_error() {
        let uploader = CloudinaryUploader::new(None).unwrap();
        assert_eq!(uploader.upload(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_staged_file_removed_after_failed_upload() {
        let dir = std::env::temp_dir().join(format!("vidtube-media-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("clip.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();

        let uploader = CloudinaryUploader::new(None).unwrap();
        let result = uploader.upload(Some(&path)).await;

        assert!(matches!(result, Err(MediaError::NotConfigured)));
        assert!(!path.exists());

        // second removal of a missing file is silent
        remove_staged_file(&path).await;
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}

//! Capture sinks — local persistence and the remote analysis upload.
//!
//! Both sinks are fire-and-forget from the session's point of view: a
//! failure is logged and surfaced as status text, never rolled back into
//! the state machine, and the artifact stays available for manual retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{CaptureArtifact, CaptureTrigger};
use crate::config::UploadConfig;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("metadata encoding failed: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("analysis service rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Local persistence sink: captured PNGs land in one directory.
pub struct PersistSink {
    dir: PathBuf,
}

impl PersistSink {
    /// Create the sink, making the capture directory if needed. Fails fast
    /// at session start when the directory is unusable.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the artifact; returns the stored path.
    pub async fn store(&self, artifact: &CaptureArtifact) -> Result<PathBuf, SinkError> {
        let path = self.dir.join(&artifact.filename);
        tokio::fs::write(&path, &artifact.bytes).await?;
        tracing::debug!(path = %path.display(), bytes = artifact.bytes.len(), "capture persisted");
        Ok(path)
    }
}

/// Receipt returned by the analysis service for an accepted upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub file_id: Option<String>,
    pub url: Option<String>,
}

#[derive(Serialize)]
struct UploadMetadata<'a> {
    filename: &'a str,
    timestamp_ms: i64,
    width: u32,
    height: u32,
    trigger: &'a str,
}

/// Remote analysis sink: multipart upload with bearer auth.
pub struct AnalysisUploader {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl AnalysisUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Send `(bytes, filename, metadata)` to the analysis service.
    pub async fn upload(
        &self,
        artifact: &CaptureArtifact,
        trigger: CaptureTrigger,
    ) -> Result<UploadReceipt, SinkError> {
        let metadata = serde_json::to_string(&UploadMetadata {
            filename: &artifact.filename,
            timestamp_ms: artifact.timestamp_ms,
            width: artifact.width,
            height: artifact.height,
            trigger: trigger.as_str(),
        })?;

        let file = reqwest::multipart::Part::bytes(artifact.bytes.clone())
            .file_name(artifact.filename.clone())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("metadata", metadata);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let receipt: UploadReceipt = response.json().await?;
        tracing::info!(
            file_id = receipt.file_id.as_deref().unwrap_or("-"),
            url = receipt.url.as_deref().unwrap_or("-"),
            "upload accepted"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::capture_frame;
    use lumicam_video::{TestPatternSource, VideoSource};

    #[tokio::test]
    async fn test_persist_sink_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let sink = PersistSink::new(dir.path()).unwrap();

        let frame = TestPatternSource::new(8, 8).grab().unwrap().unwrap();
        let artifact = capture_frame(&frame).unwrap();
        let path = sink.store(&artifact).await.unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes);
    }

    #[test]
    fn test_persist_sink_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/captures");
        let sink = PersistSink::new(&nested).unwrap();
        assert!(sink.dir().exists());
    }

    #[test]
    fn test_receipt_deserializes_service_response() {
        let receipt: UploadReceipt = serde_json::from_str(
            r#"{"file_id": "2gp2517EQO", "url": "https://cdn.example/results.zip"}"#,
        )
        .unwrap();
        assert_eq!(receipt.file_id.as_deref(), Some("2gp2517EQO"));
        assert_eq!(receipt.url.as_deref(), Some("https://cdn.example/results.zip"));

        // Services may omit fields on async processing.
        let sparse: UploadReceipt = serde_json::from_str(r#"{"file_id": "abc"}"#).unwrap();
        assert!(sparse.url.is_none());
    }
}

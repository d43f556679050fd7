//! Publishing a new video: blob upload first, then the video record.

use crate::api::{ApiError, NewVideo, VideoPublisher, VideoRecord};
use crate::session::{AuthRequired, SessionState};
use crate::util::validate_media_url;
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Largest file accepted for upload.
pub const MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024; // 200MB

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Not a file: {0}")]
    NotAFile(PathBuf),
    #[error("File is empty: {0}")]
    EmptyFile(PathBuf),
    #[error("File too large: {size} bytes (max {max})", max = MAX_UPLOAD_BYTES)]
    TooLarge { size: u64 },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    AuthRequired(#[from] AuthRequired),
    #[error("Storage upload failed: {0}")]
    Storage(#[source] ApiError),
    #[error("Storage returned an unusable URL: {0}")]
    BadStorageUrl(String),
    #[error("Creating the video failed: {0}")]
    Publish(#[source] ApiError),
}

/// Accepts bytes at a caller-chosen path and returns a public URL for them.
pub trait BlobStore: Send + Sync {
    fn put(
        &self,
        path: String,
        bytes: Vec<u8>,
        content_type: &'static str,
    ) -> impl Future<Output = Result<Url, ApiError>> + Send;
}

/// Blob store reached by `PUT {endpoint}{path}`.
///
/// The response may carry `{ "url": ... }`; otherwise the object URL itself
/// is taken as the public URL.
#[derive(Clone)]
pub struct HttpBlobStore {
    http: reqwest::Client,
    endpoint: Url,
    session: Option<SecretString>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct PutResponse {
    #[serde(default)]
    url: Option<String>,
}

impl HttpBlobStore {
    /// `endpoint` must end with `/`; see [`crate::util::validate_endpoint_url`].
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        session: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint,
            session,
            timeout,
        }
    }
}

impl BlobStore for HttpBlobStore {
    async fn put(&self, path: String, bytes: Vec<u8>, content_type: &'static str) -> Result<Url, ApiError> {
        let object_url = self.endpoint.join(&path)?;
        let size = bytes.len();
        let mut request = self
            .http
            .put(object_url.clone())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.session {
            request = request.bearer_auth(token.expose_secret());
        }

        tracing::info!(path = %path, size, "Uploading blob");
        // Uploads get a longer budget than API calls.
        let response = tokio::time::timeout(self.timeout * 10, request.send())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(ApiError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                message: None,
            });
        }

        let body = response.text().await.map_err(ApiError::Network)?;
        let public = serde_json::from_str::<PutResponse>(&body)
            .ok()
            .and_then(|r| r.url);
        match public {
            Some(url) => Ok(Url::parse(&url)?),
            None => Ok(object_url),
        }
    }
}

// ============================================================================
// Upload flow
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file: PathBuf,
    pub title: String,
    pub description: Option<String>,
}

/// Checked upload inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidUpload {
    title: String,
    description: Option<String>,
    file_name: String,
}

impl UploadRequest {
    fn validate(&self) -> Result<ValidUpload, UploadError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(UploadError::MissingTitle);
        }
        let file_name = self
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::NotAFile(self.file.clone()))?
            .to_string();
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Ok(ValidUpload {
            title: title.to_string(),
            description,
            file_name,
        })
    }
}

/// Content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Storage path for a new upload: `videos/{unix_ms}_{file_name}`.
pub fn storage_path(unix_ms: i64, file_name: &str) -> String {
    format!("videos/{unix_ms}_{file_name}")
}

/// Short public id for the share link.
fn new_uid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(11)
        .map(char::from)
        .collect()
}

async fn read_upload(path: &Path) -> Result<Vec<u8>, UploadError> {
    let io_err = |source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let meta = tokio::fs::metadata(path).await.map_err(io_err)?;
    if !meta.is_file() {
        return Err(UploadError::NotAFile(path.to_path_buf()));
    }
    if meta.len() == 0 {
        return Err(UploadError::EmptyFile(path.to_path_buf()));
    }
    if meta.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size: meta.len() });
    }
    tokio::fs::read(path).await.map_err(io_err)
}

/// Validates, uploads the file, then creates the video record.
///
/// Input problems are reported before any request is made.
pub async fn publish<B: BlobStore, P: VideoPublisher>(
    blob: &B,
    publisher: &P,
    session: &SessionState,
    request: &UploadRequest,
) -> Result<VideoRecord, UploadError> {
    let valid = request.validate()?;
    let bytes = read_upload(&request.file).await?;
    session.require()?;

    let path = storage_path(chrono::Utc::now().timestamp_millis(), &valid.file_name);
    let url = blob
        .put(path.clone(), bytes, content_type_for(&request.file))
        .await
        .map_err(UploadError::Storage)?;
    let url = validate_media_url(url.as_str())
        .map_err(|_| UploadError::BadStorageUrl(url.to_string()))?;

    let video = NewVideo {
        uid: new_uid(),
        title: valid.title,
        description: valid.description,
        storage_path: path,
        video_url: url.to_string(),
    };
    let record = publisher
        .create_video(video)
        .await
        .map_err(UploadError::Publish)?;
    tracing::info!(video_id = %record.id, uid = %record.uid, "Video published");
    Ok(record)
}

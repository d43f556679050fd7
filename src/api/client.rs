use super::error::ApiError;
use super::source::{CommentSource, ReactionSource, VideoPublisher, VideoSource};
use super::types::{
    CommentPage, CreatedComment, NewVideo, ReactionSummary, ReactionType, VideoPage, VideoRecord,
    Viewer,
};
use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

const SESSION_COOKIE: &str = "next-auth.session-token";
const SECURE_SESSION_COOKIE: &str = "__Secure-next-auth.session-token";

/// HTTP client for the video service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: Option<SecretString>,
    timeout: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("session", &self.session.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Limit redirects to 3 hops and refuse loops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Builds the shared reqwest client with the pool settings used everywhere.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    let client = reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(timeout)
        .user_agent(concat!("shortfeed/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

// ============================================================================
// Wire envelopes
// ============================================================================

#[derive(Deserialize)]
struct CountBody {
    #[serde(default, alias = "totalCount")]
    count: Option<u64>,
}

#[derive(Deserialize)]
struct CreatedVideoBody {
    video: VideoRecord,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    app_user_id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl SessionUser {
    fn into_viewer(self) -> Option<Viewer> {
        let id = self.app_user_id.or(self.id)?;
        Some(Viewer {
            id,
            username: self.username,
            name: self.name,
        })
    }
}

/// Pulls a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        Err(_) => Some(crate::util::truncate_to_width(trimmed, 120).into_owned()),
    }
}

/// Rejects `{ "ok": false }` envelopes that arrive with a 2xx status.
fn check_envelope(value: &serde_json::Value) -> Result<(), ApiError> {
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let message = value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("request rejected")
            .to_string();
        return Err(ApiError::Rejected(message));
    }
    Ok(())
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ApiError::Decode("invalid UTF-8 in response".into()))
}

// ============================================================================
// Client
// ============================================================================

impl ApiClient {
    /// `base` must already be validated; see [`crate::util::validate_base_url`].
    pub fn new(
        http: reqwest::Client,
        base: Url,
        session: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base,
            session,
            timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.session {
            let name = if self.base.scheme() == "https" {
                SECURE_SESSION_COOKIE
            } else {
                SESSION_COOKIE
            };
            request = request.header(
                reqwest::header::COOKIE,
                format!("{name}={}", token.expose_secret()),
            );
        }
        request.header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends the request and returns the body as JSON after status and
    /// envelope checks.
    async fn send_json(&self, request: RequestBuilder) -> Result<serde_json::Value, ApiError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(ApiError::Network)?;

        let status = response.status();
        let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "API request failed");
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        check_envelope(&value)?;
        Ok(value)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let value = self.send_json(self.request(Method::GET, url)).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_with_body<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T, ApiError> {
        let value = self.send_json(self.request(method, url).json(body)).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Resolves the signed-in viewer. An empty session body means signed out.
    pub async fn fetch_viewer(&self) -> Result<Option<Viewer>, ApiError> {
        if self.session.is_none() {
            return Ok(None);
        }
        let url = self.endpoint(&["api", "auth", "session"])?;
        let value = self.send_json(self.request(Method::GET, url)).await?;
        if value.is_null() {
            return Ok(None);
        }
        let body: SessionBody =
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(body.user.and_then(SessionUser::into_viewer))
    }
}

impl VideoSource for ApiClient {
    async fn fetch_videos(&self, cursor: Option<String>, limit: u32) -> Result<VideoPage, ApiError> {
        let mut url = self.endpoint(&["api", "videos"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(cursor) = &cursor {
                query.append_pair("cursor", cursor);
            }
        }
        let page: VideoPage = self.get(url).await?;
        tracing::debug!(
            count = page.videos.len(),
            has_more = page.next_cursor.is_some(),
            "Fetched video page"
        );
        Ok(page)
    }
}

impl CommentSource for ApiClient {
    async fn list_comments(
        &self,
        video_id: String,
        cursor: Option<String>,
        take: u32,
    ) -> Result<CommentPage, ApiError> {
        let mut url = self.endpoint(&["api", "videos", &video_id, "comments"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("take", &take.to_string());
            if let Some(cursor) = &cursor {
                query.append_pair("cursor", cursor);
            }
        }
        self.get(url).await
    }

    async fn comment_count(&self, video_id: String) -> Result<u64, ApiError> {
        let url = self.endpoint(&["api", "videos", &video_id, "comment-count"])?;
        let body: CountBody = self.get(url).await?;
        body.count
            .ok_or_else(|| ApiError::Decode("missing count".into()))
    }

    async fn create_comment(&self, video_id: String, body: String) -> Result<CreatedComment, ApiError> {
        let url = self.endpoint(&["api", "videos", &video_id, "comments"])?;
        let payload = serde_json::json!({ "body": body });
        self.send_with_body(Method::POST, url, &payload).await
    }

    async fn delete_comment(&self, comment_id: String) -> Result<u64, ApiError> {
        let url = self.endpoint(&["api", "comments", &comment_id])?;
        let body: CountBody = self.send_json(self.request(Method::DELETE, url)).await.and_then(
            |value| serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string())),
        )?;
        body.count
            .ok_or_else(|| ApiError::Decode("missing totalCount".into()))
    }
}

impl ReactionSource for ApiClient {
    async fn get_reaction(&self, video_id: String) -> Result<ReactionSummary, ApiError> {
        let url = self.endpoint(&["api", "videos", &video_id, "reaction"])?;
        self.get(url).await
    }

    async fn set_reaction(
        &self,
        video_id: String,
        reaction: ReactionType,
    ) -> Result<ReactionSummary, ApiError> {
        let url = self.endpoint(&["api", "videos", &video_id, "reaction"])?;
        let payload = serde_json::json!({ "type": reaction });
        self.send_with_body(Method::POST, url, &payload).await
    }
}

impl VideoPublisher for ApiClient {
    async fn create_video(&self, video: NewVideo) -> Result<VideoRecord, ApiError> {
        let url = self.endpoint(&["api", "videos"])?;
        let body: CreatedVideoBody = self.send_with_body(Method::POST, url, &video).await?;
        Ok(body.video)
    }
}

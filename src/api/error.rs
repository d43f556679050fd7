use thiserror::Error;

/// Errors from talking to the video service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx status. `message` is the server's `{ message }` or `{ error }`
    /// field when the body carried one.
    #[error("HTTP error: status {status}{}", message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default())]
    HttpStatus { status: u16, message: Option<String> },
    /// 2xx response whose envelope said `ok: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The task driving the request panicked before it produced a result.
    #[error("Internal error: {0}")]
    TaskFailed(String),
}

/// How a failure is surfaced to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Redirect to sign-in; the action is never dropped silently.
    AuthRequired,
    /// Shown inline next to the offending control.
    Validation,
    /// Transient, dismissible, retried manually.
    Transport,
    /// Not-found or forbidden; no retry offered.
    Blocking,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::HttpStatus { status, .. } => match *status {
                401 => ErrorKind::AuthRequired,
                400 | 413 | 422 => ErrorKind::Validation,
                403 | 404 | 410 => ErrorKind::Blocking,
                _ => ErrorKind::Transport,
            },
            ApiError::Rejected(_) => ErrorKind::Validation,
            ApiError::Timeout
            | ApiError::Network(_)
            | ApiError::Decode(_)
            | ApiError::ResponseTooLarge(_)
            | ApiError::InvalidUrl(_)
            | ApiError::TaskFailed(_) => ErrorKind::Transport,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A failure converted to UI state at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub kind: ErrorKind,
}

impl Notice {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Build a notice for `err`, prefixed with what was being attempted.
    pub fn from_error(context: &str, err: &ApiError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Transport => format!("{context}: {err} (press R to retry)"),
            _ => format!("{context}: {err}"),
        };
        Self { message, kind }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transport
    }

    pub fn is_blocking(&self) -> bool {
        self.kind == ErrorKind::Blocking
    }
}

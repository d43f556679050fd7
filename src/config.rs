//! Configuration file parser for ~/.config/shortfeed/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and reported with a warning so typos
//! don't go unnoticed.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level client configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// `Debug` is implemented by hand and masks `session_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service origin, e.g. `https://shorts.example.com`.
    pub base_url: String,

    /// Session cookie issued by the identity provider. The
    /// `SHORTFEED_SESSION_TOKEN` env var takes precedence.
    pub session_token: Option<String>,

    /// Videos requested per listing page.
    pub page_size: u32,

    /// Comments requested per page (the server caps this at 50).
    pub comment_page_size: u32,

    /// Minimum signed distance, in pixels, for a gesture to navigate.
    pub swipe_threshold_px: f32,

    /// Pixel delta reported for one mouse-wheel notch.
    pub wheel_step_px: f32,

    /// Pixels represented by one terminal row of mouse drag.
    pub row_px: f32,

    /// Settle window after a navigation step, in milliseconds.
    pub settle_ms: u64,

    /// Items mounted before and after the active index.
    pub render_radius: usize,

    /// Initial global mute state.
    pub start_muted: bool,

    /// Revert the optimistic reaction delta when the persist request fails.
    pub rollback_failed_reactions: bool,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Nominal length of the terminal playback clip, in seconds.
    pub clip_seconds: u64,

    /// Blob storage endpoint for uploads. Defaults to `{base_url}/storage/`.
    pub storage_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            session_token: None,
            page_size: 10,
            comment_page_size: 20,
            swipe_threshold_px: 50.0,
            wheel_step_px: 60.0,
            row_px: 16.0,
            settle_ms: 350,
            render_radius: 2,
            start_muted: true,
            rollback_failed_reactions: true,
            request_timeout_secs: 20,
            clip_seconds: 30,
            storage_url: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("page_size", &self.page_size)
            .field("comment_page_size", &self.comment_page_size)
            .field("swipe_threshold_px", &self.swipe_threshold_px)
            .field("wheel_step_px", &self.wheel_step_px)
            .field("row_px", &self.row_px)
            .field("settle_ms", &self.settle_ms)
            .field("render_radius", &self.render_radius)
            .field("start_muted", &self.start_muted)
            .field("rollback_failed_reactions", &self.rollback_failed_reactions)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("clip_seconds", &self.clip_seconds)
            .field("storage_url", &self.storage_url)
            .finish()
    }
}

const KNOWN_KEYS: &[&str] = &[
    "base_url",
    "session_token",
    "page_size",
    "comment_page_size",
    "swipe_threshold_px",
    "wheel_step_px",
    "row_px",
    "settle_ms",
    "render_radius",
    "start_muted",
    "rollback_failed_reactions",
    "request_timeout_secs",
    "clip_seconds",
    "storage_url",
];

/// Hard server-side cap on comment page size.
pub const MAX_COMMENT_PAGE: u32 = 50;

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), base_url = %config.base_url, "Loaded configuration");
        Ok(config)
    }

    /// Session token with the env var taking precedence over the file.
    pub fn session_token(&self) -> Option<SecretString> {
        std::env::var("SHORTFEED_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.session_token.clone())
            .map(SecretString::from)
    }

    /// Comment page size clamped to `1..=MAX_COMMENT_PAGE`.
    pub fn comment_take(&self) -> u32 {
        self.comment_page_size.clamp(1, MAX_COMMENT_PAGE)
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Blob storage endpoint, falling back to `storage/` under the base URL.
    pub fn storage_endpoint(&self) -> String {
        match &self.storage_url {
            Some(url) => url.clone(),
            None => format!("{}/storage/", self.base_url.trim_end_matches('/')),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("shortfeed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.comment_page_size, 20);
        assert_eq!(config.swipe_threshold_px, 50.0);
        assert_eq!(config.settle_ms, 350);
        assert_eq!(config.render_radius, 2);
        assert!(config.start_muted);
        assert!(config.rollback_failed_reactions);
        assert!(config.session_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/shortfeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "  \n \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.settle_ms, 350);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "page_size = 5\nstart_muted = false\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 5);
        assert!(!config.start_muted);
        assert_eq!(config.render_radius, 2);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config("unknown", "page_size = 7\nnot_a_key = true\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 7);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "settle_ms = \"fast\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_comment_take_is_clamped() {
        let mut config = Config::default();
        config.comment_page_size = 500;
        assert_eq!(config.comment_take(), 50);
        config.comment_page_size = 0;
        assert_eq!(config.comment_take(), 1);
    }

    #[test]
    fn test_storage_endpoint_defaults_under_base() {
        let config = Config {
            base_url: "https://shorts.example.com/".to_string(),
            ..Config::default()
        };
        assert_eq!(config.storage_endpoint(), "https://shorts.example.com/storage/");
        let config = Config {
            storage_url: Some("https://blobs.example.com/bucket/".to_string()),
            ..Config::default()
        };
        assert_eq!(config.storage_endpoint(), "https://blobs.example.com/bucket/");
    }

    #[test]
    fn test_debug_masks_session_token() {
        let config = Config {
            session_token: Some("super-secret-cookie".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-cookie"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}

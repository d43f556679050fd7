//! Utility functions shared by the client core and the terminal front-end.
//!
//! - **URL validation**: service origin and media URL checks
//! - **Text processing**: Unicode-aware width, truncation, control-char stripping,
//!   clock formatting for the playback bar

mod text;
mod url_validator;

pub use text::{display_width, format_clock, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_base_url, validate_endpoint_url, validate_media_url, UrlValidationError};

//! HTTP boundary to the video service.
//!
//! - [`types`] - wire types for videos, comments, reactions and sessions
//! - [`error`] - [`ApiError`] and its user-facing classification
//! - [`source`] - collaborator traits the client core is written against
//! - [`client`] - the reqwest-backed [`ApiClient`] implementing every trait
//!
//! The core (`feed`, `comments`, `reaction`) only sees the traits, so tests
//! substitute in-memory fakes and the terminal UI passes an `ApiClient`.

mod client;
mod error;
mod source;
mod types;

pub use client::{build_http_client, ApiClient};
pub use error::{ApiError, ErrorKind, Notice};
pub use source::{CommentSource, ReactionSource, VideoPublisher, VideoSource};
pub use types::{
    Comment, CommentPage, CommentUser, CreatedComment, NewVideo, ReactionKind, ReactionSummary,
    ReactionType, VideoPage, VideoRecord, VideoRef, Viewer,
};

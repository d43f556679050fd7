//! Terminal client for a short-form video feed.
//!
//! The client core (`feed`, `playback`, `comments`, `reaction`,
//! `action_bar`) is written against the collaborator traits in [`api`] and
//! performs no I/O of its own; `ui` drives it from a tokio event loop.

pub mod action_bar;
pub mod api;
pub mod app;
pub mod comments;
pub mod config;
pub mod feed;
pub mod playback;
pub mod reaction;
pub mod session;
pub mod ui;
pub mod upload;
pub mod util;

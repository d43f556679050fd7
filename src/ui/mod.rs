//! Terminal User Interface module.
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard and mouse handling
//! - `events` - Background task event processing
//! - `render` - Layout and dispatch to the widgets
//! - `helpers` - Background task spawning and panic capture
//! - `feed`, `player`, `comments`, `status` - Widgets

mod comments;
mod events;
mod feed;
mod helpers;
mod input;
mod loop_runner;
mod player;
mod render;
mod status;

pub use loop_runner::{run, Action};

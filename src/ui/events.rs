//! Background task event processing.
//!
//! Applies [`AppEvent`]s to the [`App`] and starts whatever follow-up work
//! they imply.

use crate::app::{App, AppEvent};
use crate::playback::MediaEvent;
use crate::reaction::Reconciled;
use tokio::sync::mpsc;

use super::helpers::{spawn_activation, spawn_drawer_fetch};

pub(super) fn handle_app_event(app: &mut App, event: AppEvent, event_tx: &mpsc::Sender<AppEvent>) {
    match event {
        AppEvent::PageLoaded { request, result } => {
            let (outcome, activation) = app.apply_page(request, result);
            tracing::debug!(
                added = outcome.added,
                advanced = outcome.advanced,
                stale = outcome.stale,
                "Page applied"
            );
            if let Some(activation) = activation {
                spawn_activation(app, activation, event_tx);
            }
        }
        AppEvent::CommentsPrefetched {
            ticket,
            list,
            count,
        } => {
            if let Some(fetch) = app.apply_prefetch(ticket, list, count) {
                spawn_drawer_fetch(app, fetch, event_tx);
            }
        }
        AppEvent::DrawerPage { ticket, result } => {
            app.apply_drawer_page(ticket, result);
        }
        AppEvent::DrawerCount { ticket, result } => {
            app.apply_drawer_count(ticket, result);
        }
        AppEvent::CommentPosted { ticket, result } => {
            app.apply_posted(ticket, result);
        }
        AppEvent::CommentDeleted { ticket, result } => {
            app.apply_deleted(ticket, result);
        }
        AppEvent::CommentCountLoaded { refresh, result } => {
            app.action_bar.complete_count_refresh(refresh, result);
        }
        AppEvent::ReactionLoaded {
            video_id,
            seq,
            result,
        } => {
            app.apply_reaction_loaded(&video_id, seq, result);
        }
        AppEvent::ReactionSaved { intent, result } => {
            let video_id = intent.video_id.clone();
            match app.apply_reaction_saved(intent, result) {
                Reconciled::RolledBack => {
                    tracing::info!(video_id = %video_id, "Reaction rolled back");
                }
                Reconciled::Stale => {
                    tracing::debug!(video_id = %video_id, "Reaction result superseded");
                }
                Reconciled::Confirmed | Reconciled::Kept => {}
            }
        }
        AppEvent::ViewerResolved { result } => {
            app.apply_viewer(result);
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {} (see log)", task));
        }
    }
}

/// Applies a media event; redraws only when playback state changed.
pub(super) fn handle_media_event(app: &mut App, event: MediaEvent) {
    if app.handle_media_event(event) {
        app.needs_redraw = true;
    }
}

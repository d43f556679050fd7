//! Input handling for the TUI.
//!
//! Keys and mouse events are routed to the comment drawer while it is open
//! and to the feed otherwise. Mouse wheel and drag go through the same
//! gesture tracker as every other pointer input.

use crate::api::ReactionKind;
use crate::app::{App, AppEvent};
use crate::feed::{Direction, GestureInput, PointerKind, Step};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use tokio::sync::mpsc;

use super::helpers::{
    open_active_media, open_pending_sign_in, spawn_activation, spawn_delete, spawn_drawer_fetch,
    spawn_drawer_page, spawn_page_load, spawn_reaction_save, spawn_submit,
};
use super::Action;

/// Seconds skipped by the seek keys.
const SEEK_STEP_SECS: f64 = 5.0;

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(Action::Quit);
    }

    let action = if app.pending_delete.is_some() {
        handle_confirm_input(app, code, event_tx)
    } else if app.drawer.is_open() {
        handle_drawer_input(app, code, modifiers, event_tx)
    } else {
        handle_feed_input(app, code, event_tx)
    };

    open_pending_sign_in(app);
    Ok(action)
}

// ============================================================================
// Feed
// ============================================================================

fn handle_feed_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('j') | KeyCode::Down | KeyCode::PageDown => {
            navigate(app, Direction::Next, event_tx)
        }
        KeyCode::Char('k') | KeyCode::Up | KeyCode::PageUp => {
            navigate(app, Direction::Prev, event_tx)
        }
        KeyCode::Char(' ') | KeyCode::Char('p') => app.playback.toggle_play(),
        KeyCode::Char('m') => {
            app.playback.toggle_mute();
            let label = if app.playback.muted() { "Muted" } else { "Sound on" };
            app.set_status(label);
        }
        KeyCode::Left => app.playback.seek_by(-SEEK_STEP_SECS),
        KeyCode::Right => app.playback.seek_by(SEEK_STEP_SECS),
        KeyCode::Char('l') => react(app, ReactionKind::Like, event_tx),
        KeyCode::Char('d') => react(app, ReactionKind::Dislike, event_tx),
        KeyCode::Char('c') | KeyCode::Enter => open_comments(app, event_tx),
        KeyCode::Char('r') => {
            if let Some(request) = app.reload() {
                app.set_status("Reloading feed...");
                spawn_page_load(&app.api, request, event_tx);
            }
        }
        KeyCode::Char('R') => retry_page(app, event_tx),
        KeyCode::Char('o') => open_active_media(app),
        KeyCode::Char('y') => match app.share_url() {
            Some(url) => app.set_status(format!("Share: {}", url)),
            None => app.set_status("Nothing to share yet"),
        },
        KeyCode::Char('s') => {
            if let Some(viewer) = app.session.viewer() {
                let who = viewer.username.clone().unwrap_or_else(|| viewer.id.clone());
                app.set_status(format!("Already signed in as {}", who));
            } else {
                app.sign_in_request = Some(app.session.sign_in_url());
            }
        }
        KeyCode::Esc => {
            app.pager.dismiss_error();
            app.status_message = None;
        }
        _ => {}
    }
    Action::Continue
}

/// Takes one feed step and starts whatever the step needs.
pub(super) fn navigate(app: &mut App, direction: Direction, event_tx: &mpsc::Sender<AppEvent>) {
    let step = app.step(direction);
    apply_step(app, step, event_tx);
}

fn apply_step(app: &mut App, step: Step, event_tx: &mpsc::Sender<AppEvent>) {
    match step {
        Step::Moved { index } => {
            tracing::trace!(index, "Feed step");
            let activation = app.sync_active();
            spawn_activation(app, activation, event_tx);
        }
        Step::NeedsPage(request) => spawn_page_load(&app.api, request, event_tx),
        Step::AtEnd => {
            if app.pager.last_error().is_none() {
                app.set_status("You're all caught up");
            }
        }
        Step::Loading | Step::Settling | Step::Empty | Step::AtStart => {}
    }
}

fn retry_page(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    match app.pager.begin_load() {
        Some(request) => {
            app.set_status("Retrying...");
            spawn_page_load(&app.api, request, event_tx);
        }
        None if app.pager.is_exhausted() => app.set_status("No more videos"),
        None => {}
    }
}

fn react(app: &mut App, kind: ReactionKind, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(intent) = app.react(kind) {
        spawn_reaction_save(&app.api, intent, event_tx);
    }
}

fn open_comments(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    use crate::comments::DrawerOpen;

    match app.open_comments() {
        Some(DrawerOpen::Fetch(fetch)) => spawn_drawer_fetch(app, fetch, event_tx),
        Some(DrawerOpen::WarmStart) | Some(DrawerOpen::AwaitPrefetch) => {}
        None => app.set_status("No video selected"),
    }
}

// ============================================================================
// Comment drawer
// ============================================================================

fn handle_drawer_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Esc => app.close_comments(),
        KeyCode::Enter => submit_comment(app, event_tx),
        KeyCode::Backspace => app.drawer.pop_char(),
        KeyCode::Up => app.drawer.select_prev(),
        KeyCode::Down => {
            app.drawer.select_next();
            if app.drawer.near_end() {
                load_more_comments(app, event_tx);
            }
        }
        KeyCode::Delete => request_delete(app),
        KeyCode::Char('d') if ctrl => request_delete(app),
        KeyCode::Char('r') if ctrl => {
            if let Some(fetch) = app.drawer.begin_refresh() {
                spawn_drawer_fetch(app, fetch, event_tx);
            }
        }
        KeyCode::Char(c) if !ctrl => app.drawer.push_char(c),
        _ => {}
    }
    Action::Continue
}

fn submit_comment(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    match app.drawer.begin_submit(&app.session) {
        Ok(Some(ticket)) => spawn_submit(&app.api, ticket, event_tx),
        Ok(None) => {}
        Err(auth) => app.require_sign_in(auth),
    }
}

fn load_more_comments(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(ticket) = app.drawer.begin_page() {
        spawn_drawer_page(app, ticket, event_tx);
    }
}

fn request_delete(app: &mut App) {
    let Some(comment) = app.drawer.selected_comment() else {
        return;
    };
    let id = comment.id.clone();
    app.pending_delete = Some(id);
    app.set_status("Delete this comment? (y/n)");
}

fn handle_confirm_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    let Some(comment_id) = app.pending_delete.take() else {
        return Action::Continue;
    };
    if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
        match app.drawer.begin_delete(&comment_id, &app.session) {
            Ok(Some(ticket)) => spawn_delete(&app.api, ticket, event_tx),
            Ok(None) => {}
            Err(auth) => app.require_sign_in(auth),
        }
    }
    app.status_message = None;
    Action::Continue
}

// ============================================================================
// Mouse
// ============================================================================

/// Converts a terminal mouse event to pixel-unit gesture input.
pub(super) fn to_gesture(event: &MouseEvent, wheel_step_px: f32, row_px: f32) -> Option<GestureInput> {
    let y = f32::from(event.row) * row_px;
    match event.kind {
        MouseEventKind::ScrollDown => Some(GestureInput::Wheel {
            delta_y: wheel_step_px,
        }),
        MouseEventKind::ScrollUp => Some(GestureInput::Wheel {
            delta_y: -wheel_step_px,
        }),
        MouseEventKind::Down(MouseButton::Left) => Some(GestureInput::PressStart {
            kind: PointerKind::Mouse,
            y,
            pointers: 1,
        }),
        MouseEventKind::Drag(MouseButton::Left) => Some(GestureInput::PressMove {
            kind: PointerKind::Mouse,
            y,
            pointers: 1,
        }),
        MouseEventKind::Up(MouseButton::Left) => Some(GestureInput::PressEnd {
            kind: PointerKind::Mouse,
        }),
        _ => None,
    }
}

pub(super) fn handle_mouse(app: &mut App, event: MouseEvent, event_tx: &mpsc::Sender<AppEvent>) {
    if app.drawer.is_open() {
        match event.kind {
            MouseEventKind::ScrollDown => {
                app.drawer.select_next();
                if app.drawer.near_end() {
                    load_more_comments(app, event_tx);
                }
                return;
            }
            MouseEventKind::ScrollUp => {
                app.drawer.select_prev();
                return;
            }
            _ => {}
        }
    }

    let Some(input) = to_gesture(&event, app.config.wheel_step_px, app.config.row_px) else {
        return;
    };
    if let Some(step) = app.handle_gesture(input) {
        apply_step(app, step, event_tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::classify;

    fn mouse(kind: MouseEventKind, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column: 10,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_wheel_maps_to_signed_delta() {
        let down = to_gesture(&mouse(MouseEventKind::ScrollDown, 0), 60.0, 16.0);
        assert_eq!(down, Some(GestureInput::Wheel { delta_y: 60.0 }));
        let up = to_gesture(&mouse(MouseEventKind::ScrollUp, 0), 60.0, 16.0);
        assert_eq!(up, Some(GestureInput::Wheel { delta_y: -60.0 }));
    }

    #[test]
    fn test_default_wheel_notch_is_one_step() {
        assert_eq!(classify(60.0, 50.0), Some(Direction::Next));
    }

    #[test]
    fn test_drag_rows_scale_to_pixels() {
        let start = to_gesture(&mouse(MouseEventKind::Down(MouseButton::Left), 20), 60.0, 16.0);
        assert_eq!(
            start,
            Some(GestureInput::PressStart {
                kind: PointerKind::Mouse,
                y: 320.0,
                pointers: 1,
            })
        );
        // Three rows of drag is 48px: under the 50px threshold.
        assert_eq!(classify(3.0 * 16.0, 50.0), None);
        assert_eq!(classify(4.0 * 16.0, 50.0), Some(Direction::Next));
    }

    #[test]
    fn test_right_button_ignored() {
        assert_eq!(
            to_gesture(&mouse(MouseEventKind::Down(MouseButton::Right), 5), 60.0, 16.0),
            None
        );
    }
}

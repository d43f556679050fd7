//! Render functions for the TUI.
//!
//! Feed window on the left, the active video on the right, status bar at the
//! bottom, and the comment drawer drawn over everything while open.

use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    text::Line,
    widgets::Paragraph,
    Frame,
};

use super::{comments, feed, player, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 50;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &App) {
    let area = f.area();

    // EDGE-001: Guard against zero-width/height to prevent panics
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(vec![
                Line::from("Terminal too small"),
                Line::from(""),
                Line::from(format!("Minimum: {}x{}", MIN_WIDTH, MIN_HEIGHT)),
                Line::from(format!("Current: {}x{}", area.width, area.height)),
            ])
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[0]);

    feed::render(f, app, columns[0]);
    player::render(f, app, columns[1]);
    status::render(f, app, rows[1]);

    if app.drawer.is_open() {
        comments::render(f, app);
    }
}

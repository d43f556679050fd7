use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    // EDGE-001: Guard against zero-width/height areas
    if area.width < 1 || area.height < 1 {
        return;
    }

    let mut style = Style::default().bg(Color::DarkGray).fg(Color::White);

    // Status message first, then a sticky feed error, then key hints
    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if let Some(notice) = app.pager.last_error() {
        style = style.fg(Color::Yellow);
        Cow::Borrowed(notice.message.as_str())
    } else if app.pending_delete.is_some() {
        Cow::Borrowed("Delete this comment? (y/n)")
    } else if app.drawer.is_open() {
        Cow::Borrowed("[Enter]post [Up/Down]select [Del]delete [Ctrl+r]refresh [Esc]close")
    } else {
        Cow::Borrowed(
            "[j/k]next/prev [space]play [m]ute [</>]seek [l]ike [d]islike [c]omments [r]eload [o]pen [y]share [q]uit",
        )
    };

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}

use crate::app::App;
use crate::util::{strip_control_chars, truncate_to_width};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Render the feed window: the active video and its neighbours.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let pager = &app.pager;
    let window = pager.render_window();
    let inner_width = area.width.saturating_sub(4) as usize;

    let items: Vec<ListItem> = if pager.is_empty() {
        let msg = if pager.is_loading() {
            "Loading videos..."
        } else if pager.last_error().is_some() {
            "Could not load videos (R to retry)"
        } else {
            "No videos"
        };
        vec![ListItem::new(msg)]
    } else {
        pager
            .visible()
            .iter()
            .enumerate()
            .map(|(offset, video)| {
                let index = window.start + offset;
                let is_active = index == pager.active_index();
                let marker = if is_active { "▶ " } else { "  " };
                let title = strip_control_chars(&video.title);
                let label = format!("{:>3}. {}", index + 1, title);
                let style = if is_active {
                    Style::default()
                        .bg(Color::DarkGray)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Cyan)),
                    Span::styled(
                        truncate_to_width(&label, inner_width.saturating_sub(2)).into_owned(),
                        style,
                    ),
                ]))
            })
            .collect()
    };

    let suffix = if pager.is_loading() {
        " ..."
    } else if pager.is_exhausted() {
        " (end)"
    } else {
        ""
    };
    let title = if pager.is_empty() {
        format!("Feed{}", suffix)
    } else {
        format!("Feed {}/{}{}", pager.active_index() + 1, pager.len(), suffix)
    };

    let border_style = if app.modal_open() {
        Style::default()
    } else {
        Style::default().fg(Color::Cyan)
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title),
    );
    f.render_widget(list, area);
}

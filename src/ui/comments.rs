use crate::app::App;
use crate::comments::MAX_COMMENT_CHARS;
use crate::util::{strip_control_chars, truncate_to_width};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

/// Render the comment drawer over the lower part of the screen.
pub fn render(f: &mut Frame, app: &App) {
    let screen = f.area();
    let height = (screen.height * 2 / 3).max(8).min(screen.height.saturating_sub(1));
    let area = Rect::new(
        screen.x,
        screen.y + screen.height.saturating_sub(height + 1),
        screen.width,
        height,
    );
    if area.width < 20 || area.height < 6 {
        return;
    }
    f.render_widget(Clear, area);

    let drawer = &app.drawer;
    let title = if drawer.is_loading() {
        format!(" Comments ({}) loading... ", drawer.total_count())
    } else {
        format!(" Comments ({}) ", drawer.total_count())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    render_list(f, app, chunks[0]);
    render_notice(f, app, chunks[1]);
    render_composer(f, app, chunks[2]);
}

fn render_list(f: &mut Frame, app: &App, area: Rect) {
    let drawer = &app.drawer;
    let width = area.width as usize;

    let mut items: Vec<ListItem> = drawer
        .items()
        .iter()
        .map(|comment| {
            let name = strip_control_chars(comment.user.display_name()).into_owned();
            let body = strip_control_chars(&comment.body).replace('\n', " ");
            let own = app.session.owns(&comment.user_id);
            let name_style = if own {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            let when = comment.created_at.format("%Y-%m-%d %H:%M").to_string();
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(name, name_style),
                    Span::styled(format!("  {}", when), Style::default().fg(Color::DarkGray)),
                ]),
                Line::from(truncate_to_width(&body, width.saturating_sub(2)).into_owned()),
            ])
        })
        .collect();

    if items.is_empty() && !drawer.is_loading() {
        items.push(ListItem::new("No comments yet. Be the first!"));
    } else if drawer.has_more() {
        items.push(ListItem::new(Span::styled(
            "  more below",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = ListState::default();
    if !drawer.items().is_empty() {
        state.select(Some(drawer.selected()));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn render_notice(f: &mut Frame, app: &App, area: Rect) {
    let drawer = &app.drawer;
    let line = if let Some(err) = drawer.input_error() {
        Line::from(Span::styled(err.to_string(), Style::default().fg(Color::Yellow)))
    } else if let Some(notice) = drawer.notice() {
        let color = if notice.is_blocking() { Color::Red } else { Color::Yellow };
        Line::from(Span::styled(notice.message.clone(), Style::default().fg(color)))
    } else if drawer.is_posting() {
        Line::from(Span::styled("Posting...", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from("")
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_composer(f: &mut Frame, app: &App, area: Rect) {
    let drawer = &app.drawer;
    let count = drawer.composer().chars().count();
    let counter = format!(" {}/{}", count, MAX_COMMENT_CHARS);
    let budget = (area.width as usize).saturating_sub(counter.len() + 2);

    let text = if drawer.composer().is_empty() {
        Span::styled(
            if app.session.is_signed_in() {
                "Write a comment, Enter to post"
            } else {
                "Sign in to comment"
            },
            Style::default().fg(Color::DarkGray),
        )
    } else {
        // Keep the tail visible while typing.
        let composer = drawer.composer();
        let skip = count.saturating_sub(budget);
        Span::raw(composer.chars().skip(skip).collect::<String>())
    };

    let counter_style = if count > MAX_COMMENT_CHARS {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        text,
        Span::styled(counter, counter_style),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

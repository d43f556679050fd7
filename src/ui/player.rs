use crate::api::ReactionKind;
use crate::app::App;
use crate::util::{format_clock, strip_control_chars, truncate_to_width};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

/// Render the active video: details, playback bar and action bar.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Now playing ");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.width < 10 || inner.height < 4 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    render_details(f, app, chunks[0]);
    render_playback_bar(f, app, chunks[1]);
    render_action_bar(f, app, chunks[2]);
}

fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let Some(video) = app.active_video() else {
        f.render_widget(Paragraph::new("Nothing playing"), area);
        return;
    };
    let width = area.width as usize;
    let mut lines = vec![
        Line::from(Span::styled(
            strip_control_chars(&video.title).into_owned(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            truncate_to_width(&video.media_url, width).into_owned(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if let Some(poster) = &video.poster_url {
        lines.push(Line::from(Span::styled(
            format!("poster: {}", truncate_to_width(poster, width.saturating_sub(8))),
            Style::default().fg(Color::DarkGray),
        )));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}

fn render_playback_bar(f: &mut Frame, app: &App, area: Rect) {
    let snap = *app.playback_rx.borrow();
    let icon = if snap.is_playing { "▶" } else { "⏸" };
    let sound = if snap.muted { "muted" } else { "sound" };
    let label = format!(
        "{} {} / {}  [{}]",
        icon,
        format_clock(snap.current_time),
        format_clock(snap.duration),
        sound
    );
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(snap.progress().clamp(0.0, 1.0))
        .label(label);
    f.render_widget(gauge, area);
}

fn render_action_bar(f: &mut Frame, app: &App, area: Rect) {
    let bar = &app.action_bar;
    let Some(reactions) = bar.reactions() else {
        return;
    };
    let mine = reactions.my_reaction();
    let highlight = |kind: ReactionKind, color: Color| {
        if mine == Some(kind) {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    let pending = if reactions.is_loaded() { "" } else { " …" };
    let line = Line::from(vec![
        Span::styled(
            format!("[l] like {}", reactions.like_count()),
            highlight(ReactionKind::Like, Color::Green),
        ),
        Span::raw("   "),
        Span::styled(
            format!("[d] dislike {}", reactions.dislike_count()),
            highlight(ReactionKind::Dislike, Color::Red),
        ),
        Span::raw("   "),
        Span::raw(format!("[c] comments {}", bar.comment_count())),
        Span::styled(pending, Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

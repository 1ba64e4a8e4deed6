//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use super::app::{App, Pane};
use super::compose;
use super::messages;
use super::notifications;
use super::sidebar;
use crate::chat::notifications::badge;
use crate::chat::{ChatState, LinkState};

const SIDEBAR_WIDTH: u16 = 32;

fn link_color(link: LinkState) -> Color {
    match link {
        LinkState::Online => Color::Green,
        LinkState::Connecting | LinkState::Reconnecting => Color::Yellow,
        LinkState::Offline | LinkState::Failed => Color::Red,
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let chat = app.chat();
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), chat);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
            .areas(main_area);

    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        &chat.conversations,
        chat.active().map(|c| c.id),
        app.active_pane == Pane::Sidebar,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        chat,
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        chat.active().map(|c| c.name.as_str()),
        app.active_pane == Pane::Compose,
    );

    render_status(status_area, frame.buffer_mut(), app);

    if app.bell.open {
        notifications::render_popup(frame, &app.bell, &chat.notifications);
    }
}

/// Title on the left; bell, unread total and user on the right.
fn render_header(area: Rect, buf: &mut Buffer, chat: &ChatState) {
    let title = " Venue Chat";

    let bell = match badge(chat.unread_notifications()) {
        Some(count) => format!(" [n] \u{1F514} {} ", count),
        None => " [n] \u{1F514} ".to_string(),
    };
    let unread = match chat.total_unread() {
        0 => String::new(),
        n => format!(" {} unread ", n),
    };
    let user = chat
        .viewer()
        .map(|s| format!(" {} ({}) ", s.name, s.role.as_str()))
        .unwrap_or_default();

    let right_width = unicode_width::UnicodeWidthStr::width(bell.as_str())
        + unread.chars().count()
        + user.chars().count();
    let padding = (area.width as usize).saturating_sub(title.len() + right_width);

    let bell_style = if chat.unread_notifications() > 0 {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(bell, bell_style),
        Span::styled(unread, Style::default().fg(Color::Yellow)),
        Span::styled(user, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", msg), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let chat = app.chat();
    let link = chat.link();
    let connection = Span::styled(
        format!(" \u{25CF} {} ", link.label()),
        Style::default().fg(link_color(link)),
    );

    let sep_style = Style::default().fg(Color::DarkGray);

    let conversation = chat
        .active()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "(none)".to_string());

    let status_line = Line::from(vec![
        connection,
        Span::styled(" | ", sep_style),
        Span::styled(conversation, Style::default().fg(Color::Yellow)),
        Span::styled(" | ", sep_style),
        Span::styled(
            format!("Tab: {} ", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(" | ", sep_style),
        Span::styled(
            "a: assistant  n: notifications  r: refresh  q: quit",
            Style::default().fg(Color::Gray),
        ),
    ]);

    Paragraph::new(status_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

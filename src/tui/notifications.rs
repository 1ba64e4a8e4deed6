//! Notification bell popup.

use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::chat::notifications::{format_relative, NotificationFeed};
use crate::models::NotificationId;

const POPUP_WIDTH: u16 = 64;
const POPUP_HEIGHT: u16 = 20;

/// Rows per notification: title line + message line.
const ROWS_PER_ITEM: usize = 2;

#[derive(Default)]
pub struct BellState {
    pub open: bool,
    pub selected: usize,
}

impl BellState {
    pub fn toggle(&mut self) {
        self.open = !self.open;
        self.selected = 0;
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, feed: &NotificationFeed) {
        if self.selected + 1 < feed.items().len() {
            self.selected += 1;
        }
    }

    pub fn selected_id(&self, feed: &NotificationFeed) -> Option<NotificationId> {
        feed.items().get(self.selected).map(|n| n.id)
    }
}

/// Render the popup centered over the screen.
pub fn render_popup(frame: &mut Frame, state: &BellState, feed: &NotificationFeed) {
    let area = frame.area();
    let popup_w = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let popup_h = POPUP_HEIGHT.min(area.height.saturating_sub(2));
    let popup_area = centered_rect(popup_w, popup_h, area);

    frame.render_widget(Clear, popup_area);

    let unread = feed.unread_count();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(
                " NOTIFICATIONS ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("({} unread) ", unread), Style::default().fg(Color::Gray)),
        ]))
        .title_bottom(Line::from(Span::styled(
            " Enter: open  m: mark all read  Esc: close ",
            Style::default().fg(Color::Gray),
        )));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let items = feed.items();
    if items.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                " No notifications",
                Style::default().fg(Color::DarkGray),
            ))),
            inner,
        );
        return;
    }

    let capacity = (inner.height as usize / ROWS_PER_ITEM).max(1);
    let offset = state.selected.saturating_sub(capacity - 1);
    let now = Local::now();
    let width = inner.width as usize;

    let mut lines: Vec<Line<'_>> = Vec::new();
    for (idx, n) in items.iter().enumerate().skip(offset).take(capacity) {
        let selected = idx == state.selected;
        let dot = if n.is_read { " " } else { "\u{25CF}" };
        let when = n
            .created_at
            .map(|t| format_relative(t, &now))
            .unwrap_or_default();

        let mut title_style = if n.is_read {
            Style::default().fg(Color::Gray)
        } else {
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        };
        if selected {
            title_style = title_style.bg(Color::DarkGray);
        }

        let title: String = n.title.chars().take(width.saturating_sub(when.len() + 4)).collect();
        let pad = width.saturating_sub(title.chars().count() + when.len() + 3);
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", dot), Style::default().fg(Color::Yellow)),
            Span::styled(title, title_style),
            Span::styled(" ".repeat(pad), title_style),
            Span::styled(format!(" {}", when), Style::default().fg(Color::DarkGray)),
        ]));

        let message: String = n.message.chars().take(width.saturating_sub(2)).collect();
        lines.push(Line::from(Span::styled(
            format!("  {}", message),
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Return a centered sub-rect of the given size within `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

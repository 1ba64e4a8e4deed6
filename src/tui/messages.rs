//! Messages pane: the active conversation with day separators, sender
//! grouping and the counterparty's presence in the header.

use chrono::{DateTime, Local, TimeZone};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::chat::messages::{layout, Row};
use crate::chat::ChatState;
use crate::models::{ConversationSummary, Message, PresenceStatus, UserId};

/// Scroll state for the messages pane. Offsets count from the newest line
/// so incoming messages stay in view unless the user scrolled up.
#[derive(Default)]
pub struct MessagesState {
    pub scroll_from_bottom: usize,
}

impl MessagesState {
    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }

    pub fn reset(&mut self) {
        self.scroll_from_bottom = 0;
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the messages pane into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &MessagesState, chat: &ChatState, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let Some(active) = chat.active() else {
        render_hint(inner, buf, "Select a conversation, or Enter on the assistant to ask a question");
        return;
    };

    let header_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_header(header_area, buf, active, chat.presence.status());

    let messages_area = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if messages_area.height == 0 {
        return;
    }

    if chat.stream.is_loading() {
        render_hint(messages_area, buf, "Loading messages...");
        return;
    }
    if chat.stream.messages().is_empty() {
        render_hint(messages_area, buf, "No messages yet. Say hello!");
        return;
    }

    let viewer = chat.viewer().map(|s| s.id);
    let lines = build_message_lines(
        chat.stream.messages(),
        viewer,
        messages_area.width as usize,
        &Local::now(),
    );
    let total_lines = lines.len();
    let visible_height = messages_area.height as usize;

    let max_scroll = total_lines.saturating_sub(visible_height);
    let from_bottom = state.scroll_from_bottom.min(max_scroll);
    let scroll = max_scroll - from_bottom;

    for (row, line) in lines.into_iter().skip(scroll).take(visible_height).enumerate() {
        let line_area = Rect::new(messages_area.x, messages_area.y + row as u16, messages_area.width, 1);
        Paragraph::new(line).render(line_area, buf);
    }

    // Scroll indicators.
    if total_lines > visible_height {
        let indicator_x = messages_area.x + messages_area.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(indicator_x, messages_area.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if from_bottom > 0 {
            let bottom_y = messages_area.y + messages_area.height.saturating_sub(1);
            let cell = &mut buf[(indicator_x, bottom_y)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

fn render_hint(area: Rect, buf: &mut Buffer, text: &str) {
    let line = Line::from(Span::styled(
        format!(" {}", text),
        Style::default().fg(Color::DarkGray),
    ));
    Paragraph::new(line).render(Rect::new(area.x, area.y, area.width, 1), buf);
}

/// Conversation name, kind and the counterparty's status.
fn render_header(area: Rect, buf: &mut Buffer, active: &ConversationSummary, status: PresenceStatus) {
    let (dot, label, color) = if status.is_online() {
        ("\u{25CF}", "Online", Color::Green)
    } else {
        ("\u{25CB}", "Offline", Color::DarkGray)
    };
    let mut spans = vec![
        Span::styled(
            format!(" {} ", active.name),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("({}) ", active.kind.label()),
            Style::default().fg(Color::Gray),
        ),
    ];
    if let Some(venue) = active.venue {
        spans.push(Span::styled(
            format!("venue #{} ", venue),
            Style::default().fg(Color::Gray),
        ));
    }
    spans.push(Span::styled(format!("{} {}", dot, label), Style::default().fg(color)));
    let line = Line::from(spans);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Flatten the conversation into display lines. The viewer's messages are
/// right-aligned; a run of messages from one sender shows the time only
/// under its last message.
fn build_message_lines<Tz: TimeZone>(
    messages: &[Message],
    viewer: Option<UserId>,
    width: usize,
    now: &DateTime<Tz>,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let bubble_width = (width * 3 / 4).max(10).min(width.saturating_sub(2));

    for row in layout(messages, now) {
        match row {
            Row::Separator(label) => {
                let text = format!(" {} ", label);
                let side = width.saturating_sub(text.chars().count()) / 2;
                lines.push(Line::from(Span::styled(
                    format!("{}{}{}", "\u{2500}".repeat(side), text, "\u{2500}".repeat(side)),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            Row::Bubble {
                message,
                last_from_sender,
            } => {
                let own = viewer == Some(message.sender_id);
                let style = if own {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::White)
                };

                for text in wrap_text(&message.content, bubble_width.saturating_sub(2)) {
                    lines.push(aligned(format!(" {} ", text), own, width, style));
                }

                if last_from_sender {
                    let time = message
                        .created_at
                        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
                        .unwrap_or_default();
                    let footer = if own {
                        format!("{} ", time)
                    } else {
                        format!(" #{}  {}", message.sender_id, time)
                    };
                    lines.push(aligned(footer, own, width, Style::default().fg(Color::DarkGray)));
                    lines.push(Line::from(""));
                }
            }
        }
    }

    lines
}

fn aligned(text: String, right: bool, width: usize, style: Style) -> Line<'static> {
    if right {
        let pad = width.saturating_sub(text.chars().count());
        Line::from(vec![Span::raw(" ".repeat(pad)), Span::styled(text, style)])
    } else {
        Line::from(Span::styled(text, style))
    }
}

/// Simple word-wrapping: split content by newlines first, then wrap long lines.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();
            if current.is_empty() {
                current = word.to_string();
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::take(&mut current));
                current = word.to_string();
            }
            // Hard-split words longer than a line.
            while current.chars().count() > max_width {
                let head: String = current.chars().take(max_width).collect();
                let tail: String = current.chars().skip(max_width).collect();
                result.push(head);
                current = tail;
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationId;
    use chrono::Utc;

    fn msg(sender: u64, content: &str) -> Message {
        Message {
            conversation_id: ConversationId(1),
            sender_id: UserId(sender),
            content: content.to_string(),
            created_at: None,
            is_read: false,
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("hello world", 20), vec!["hello world"]);
        assert_eq!(wrap_text("hello world", 7), vec!["hello", "world"]);
        assert_eq!(wrap_text("a\nb", 5), vec!["a", "b"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(wrap_text("anything", 0).is_empty());
    }

    #[test]
    fn test_grouped_messages_show_one_footer() {
        let messages = vec![msg(2, "hi"), msg(2, "are you there?"), msg(1, "yes")];
        let lines = build_message_lines(&messages, Some(UserId(1)), 40, &Utc::now());
        let rendered: Vec<String> = lines.iter().map(text).collect();

        let footers = rendered.iter().filter(|l| l.contains("#2")).count();
        assert_eq!(footers, 1);
        // Viewer's own bubble is right-aligned.
        let own = rendered.iter().find(|l| l.contains("yes")).unwrap();
        assert!(own.starts_with("  "));
        assert!(own.trim_end().ends_with("yes"));
    }

    #[test]
    fn test_scroll_clamps_at_newest() {
        let mut state = MessagesState::default();
        state.scroll_up(3);
        state.scroll_down(10);
        assert_eq!(state.scroll_from_bottom, 0);
    }
}

//! Sidebar widget: assistant banner followed by the conversation list.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::api::preview;
use crate::chat::conversations::{ConversationStore, Entry};
use crate::chat::notifications::badge;
use crate::models::{ConversationId, ASSISTANT_NAME};

/// Rows per conversation: name line + preview line.
const ROWS_PER_ENTRY: usize = 2;

/// What Enter on the selected entry should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Open the assistant thread, creating it first if there is none.
    Assistant(Option<ConversationId>),
    Conversation(ConversationId),
}

/// Sidebar navigation state. The entries themselves live in the store.
#[derive(Default)]
pub struct SidebarState {
    /// Index into `ConversationStore::entries()`
    pub selected: usize,
}

impl SidebarState {
    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, store: &ConversationStore) {
        let count = store.entries().len();
        if self.selected + 1 < count {
            self.selected += 1;
        }
    }

    /// Clamp selected index after the list was refreshed.
    pub fn clamp_selection(&mut self, store: &ConversationStore) {
        let count = store.entries().len();
        if self.selected >= count {
            self.selected = count.saturating_sub(1);
        }
    }

    pub fn selection(&self, store: &ConversationStore) -> Option<Selection> {
        match store.entries().get(self.selected)? {
            Entry::Assistant(thread) => Some(Selection::Assistant(thread.map(|c| c.id))),
            Entry::Conversation(c) => Some(Selection::Conversation(c.id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the sidebar into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &SidebarState,
    store: &ConversationStore,
    active: Option<ConversationId>,
    focused: bool,
) {
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
        .border_style(border_style)
        .title(Span::styled(
            " Messages ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let entries = store.entries();
    let available = inner.height as usize / ROWS_PER_ENTRY;
    if available == 0 {
        return;
    }

    let scroll_offset = compute_scroll_offset(state.selected, available, entries.len());

    for (slot, idx) in (scroll_offset..entries.len()).take(available).enumerate() {
        let y = inner.y + (slot * ROWS_PER_ENTRY) as u16;
        let ctx = RowCtx {
            area: Rect::new(inner.x, y, inner.width, ROWS_PER_ENTRY as u16),
            selected: idx == state.selected,
        };
        render_entry(buf, &ctx, &entries[idx], active);
    }

    // Empty list hint below the assistant banner.
    let hint_y = inner.y + ROWS_PER_ENTRY as u16;
    if entries.len() == 1 && hint_y < inner.y + inner.height {
        let hint = if store.is_loaded() {
            " No conversations yet"
        } else {
            " Loading..."
        };
        let line = Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(inner.x, hint_y, inner.width, 1), buf);
    }
}

/// Simple scroll offset: keep selected item visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    let max_offset = total.saturating_sub(height);
    selected.saturating_sub(height - 1).min(max_offset)
}

/// Rendering context for one sidebar entry.
struct RowCtx {
    area: Rect,
    selected: bool,
}

/// Style for an entry based on selection and unread state.
fn item_style(selected: bool, has_unread: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if has_unread {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn badge_style(selected: bool) -> Style {
    let style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    if selected {
        style.bg(Color::DarkGray)
    } else {
        style
    }
}

fn render_entry(buf: &mut Buffer, ctx: &RowCtx, entry: &Entry<'_>, active: Option<ConversationId>) {
    let cursor = if ctx.selected { "\u{25BA}" } else { " " };
    let name_area = Rect::new(ctx.area.x, ctx.area.y, ctx.area.width, 1);
    let preview_area = Rect::new(ctx.area.x, ctx.area.y + 1, ctx.area.width, 1);

    match entry {
        Entry::Assistant(thread) => {
            let unread = thread.map_or(0, |c| c.unread);
            let label = format!("{}\u{2726} {}", cursor, ASSISTANT_NAME);
            let style = if ctx.selected {
                item_style(true, false).fg(Color::Magenta)
            } else {
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD)
            };
            let badge = badge(unread as usize).unwrap_or_default();
            render_row(buf, name_area, &label, &badge, style, badge_style(ctx.selected));

            let sub = match thread {
                Some(c) if c.unread > 0 || c.last_message.is_some() => preview(c),
                _ => "Ask about venues and bookings".to_string(),
            };
            render_preview(buf, preview_area, &sub);
        }

        Entry::Conversation(c) => {
            let marker = if active == Some(c.id) { "*" } else { " " };
            let label = format!("{}{}{}", cursor, marker, c.name);
            let badge = badge(c.unread as usize).unwrap_or_default();
            let style = item_style(ctx.selected, c.unread > 0);
            let bstyle = if c.unread > 0 {
                badge_style(ctx.selected)
            } else {
                style
            };
            render_row(buf, name_area, &label, &badge, style, bstyle);
            render_preview(buf, preview_area, &preview(c));
        }
    }
}

fn render_preview(buf: &mut Buffer, area: Rect, text: &str) {
    let line: String = format!("   {}", text)
        .chars()
        .take(area.width as usize)
        .collect();
    Paragraph::new(Line::from(Span::styled(
        line,
        Style::default().fg(Color::DarkGray),
    )))
    .render(area, buf);
}

/// Render a row with left-aligned text and an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_len = badge.chars().count();
    let max_left = if badge_len > 0 {
        width.saturating_sub(badge_len + 1)
    } else {
        width
    };

    let left_truncated: String = left.chars().take(max_left).collect();
    let left_len = left_truncated.chars().count();
    let pad = width.saturating_sub(left_len + badge_len);

    let line = Line::from(vec![
        Span::styled(left_truncated, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);

    Paragraph::new(line).render(area, buf);
}

//! Compose box: single-line message input.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
}

impl ComposeState {
    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let end = self.char_to_byte(self.cursor_pos);
            let start = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(start..end);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character at the cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            let start = self.char_to_byte(self.cursor_pos);
            let end = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(start..end);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    /// Ctrl+U
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Take the trimmed text and clear the box. Whitespace-only input is
    /// left untouched and yields nothing.
    pub fn take(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.clear();
        Some(text)
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Border + input line + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Render the compose box. `target` is the active conversation's name;
/// `None` renders the box disabled.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, target: Option<&str>, focused: bool) {
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
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let width = input_area.width as usize;

    let line = match (target, state.input.is_empty()) {
        (None, _) => Line::from(Span::styled(
            " No conversation open",
            Style::default().fg(Color::DarkGray),
        )),
        (Some(name), true) => {
            let placeholder: String = format!(" Message {}...", name).chars().take(width).collect();
            Line::from(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
        }
        (Some(_), false) => {
            let display = visible_window(&state.input, state.cursor_pos, width);
            if focused {
                let x = input_area.x + 1 + display.cursor_offset as u16;
                frame.set_cursor_position((x, input_area.y));
            }
            Line::from(Span::styled(
                format!(" {}", display.visible),
                Style::default().fg(Color::White),
            ))
        }
    };

    if focused && state.input.is_empty() && target.is_some() {
        frame.set_cursor_position((input_area.x + 1, input_area.y));
    }

    frame.render_widget(Paragraph::new(line), input_area);
}

/// What part of the input fits and where the cursor lands in it.
struct DisplayText {
    visible: String,
    /// Cursor column within `visible`.
    cursor_offset: usize,
}

/// Scroll the input horizontally so the cursor stays visible.
fn visible_window(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    // One column goes to the leading space.
    let avail = width.saturating_sub(1);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= avail {
        return DisplayText {
            visible: input.to_string(),
            cursor_offset: cursor_pos,
        };
    }

    let start = if cursor_pos < avail {
        0
    } else {
        cursor_pos - avail + 1
    };
    let end = (start + avail).min(chars.len());
    DisplayText {
        visible: chars[start..end].iter().collect(),
        cursor_offset: cursor_pos - start,
    }
}

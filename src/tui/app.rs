//! TUI application state and main event loop

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;

use super::compose::ComposeState;
use super::messages::MessagesState;
use super::notifications::BellState;
use super::sidebar::{Selection, SidebarState};
use super::ui;
use crate::chat::{live, ChatRuntime, ChatState, Fetched, Update};
use crate::config::Config;
use crate::models::{UserId, VenueId};
use crate::realtime::{LinkEvent, ServerEvent};

/// Redraw period when nothing happens, so relative times stay current.
const IDLE_REDRAW: Duration = Duration::from_secs(30);

/// Lines moved per PageUp/PageDown in the messages pane.
const PAGE_LINES: usize = 10;

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "sidebar",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }

    fn prev(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Compose,
            Pane::Messages => Pane::Sidebar,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// Open a thread with a venue's owner right after startup.
pub struct ContactOwner {
    pub owner: UserId,
    pub venue: VenueId,
    pub venue_name: String,
}

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_exit: bool,
    pub active_pane: Pane,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub bell: BellState,
    /// One-shot message replacing the status bar until the next key press.
    pub status_message: Option<String>,
    pub status_is_error: bool,
    runtime: ChatRuntime,
}

/// What woke the event loop.
enum Input {
    Key(KeyEvent),
    Update(Update),
    Redraw,
    Closed,
}

impl App {
    fn new(runtime: ChatRuntime) -> Self {
        Self {
            should_exit: false,
            active_pane: Pane::default(),
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            bell: BellState::default(),
            status_message: None,
            status_is_error: false,
            runtime,
        }
    }

    pub fn chat(&self) -> &ChatState {
        self.runtime.state()
    }

    fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = Some(message.into());
        self.status_is_error = is_error;
    }

    /// Handle one key press
    fn handle_key(&mut self, key: KeyEvent) {
        self.status_message = None;

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return;
        }

        if self.bell.open {
            self.handle_bell_key(key);
            return;
        }

        if self.active_pane == Pane::Compose {
            self.handle_compose_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Tab => self.active_pane = self.active_pane.next(),
            KeyCode::BackTab => self.active_pane = self.active_pane.prev(),
            KeyCode::Char('n') => self.bell.toggle(),
            KeyCode::Char('a') => {
                self.runtime.apply(|s| s.start_assistant_chat());
                self.messages.reset();
                self.active_pane = Pane::Compose;
            }
            KeyCode::Char('r') => {
                self.runtime.apply(|s| {
                    let mut commands = s.refresh_conversations();
                    commands.extend(s.refresh_notifications());
                    commands
                });
                self.set_status("Refreshing...", false);
            }
            KeyCode::Char('i') if self.chat().active().is_some() => {
                self.active_pane = Pane::Compose;
            }
            _ => match self.active_pane {
                Pane::Sidebar => self.handle_sidebar_key(key),
                Pane::Messages => self.handle_messages_key(key),
                Pane::Compose => {}
            },
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.sidebar.move_up(),
            KeyCode::Down | KeyCode::Char('j') => {
                let store = &self.runtime.state().conversations;
                self.sidebar.move_down(store);
            }
            KeyCode::Enter | KeyCode::Right => {
                let Some(selection) = self.sidebar.selection(&self.chat().conversations) else {
                    return;
                };
                match selection {
                    Selection::Assistant(Some(id)) | Selection::Conversation(id) => {
                        self.runtime.apply(|s| s.open_conversation(id));
                    }
                    Selection::Assistant(None) => {
                        self.runtime.apply(|s| s.start_assistant_chat());
                    }
                }
                self.messages.reset();
                self.active_pane = Pane::Compose;
            }
            _ => {}
        }
    }

    fn handle_messages_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.messages.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.messages.scroll_down(PAGE_LINES),
            KeyCode::End | KeyCode::Char('G') => self.messages.reset(),
            KeyCode::Left => self.active_pane = Pane::Sidebar,
            KeyCode::Esc => {
                self.runtime.apply(|s| {
                    s.close_conversation();
                    Vec::new()
                });
                self.messages.reset();
                self.active_pane = Pane::Sidebar;
            }
            KeyCode::Enter => self.active_pane = Pane::Compose,
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.active_pane = Pane::Messages,
            KeyCode::Tab => self.active_pane = self.active_pane.next(),
            KeyCode::BackTab => self.active_pane = self.active_pane.prev(),
            KeyCode::Enter => self.send(),
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Char(c) if !ctrl => self.compose.insert_char(c),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            _ => {}
        }
    }

    fn send(&mut self) {
        if self.chat().active().is_none() {
            self.set_status("Open a conversation first", true);
            return;
        }
        let Some(text) = self.compose.take() else {
            return;
        };
        self.runtime.apply(|s| s.send_message(&text));
        self.messages.reset();
    }

    fn handle_bell_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => self.bell.toggle(),
            KeyCode::Up | KeyCode::Char('k') => self.bell.move_up(),
            KeyCode::Down | KeyCode::Char('j') => {
                let feed = &self.runtime.state().notifications;
                self.bell.move_down(feed);
            }
            KeyCode::Char('m') => {
                self.runtime.apply(|s| s.mark_all_notifications_read());
            }
            KeyCode::Enter => {
                let Some(id) = self.bell.selected_id(&self.chat().notifications) else {
                    return;
                };
                let mut routed = None;
                self.runtime.apply(|s| match s.activate_notification(id) {
                    Some((intent, commands)) => {
                        routed = Some(intent);
                        commands
                    }
                    None => Vec::new(),
                });
                if let Some(intent) = routed {
                    self.bell.toggle();
                    self.set_status(intent.describe(), false);
                }
            }
            _ => {}
        }
    }

    /// React to what the runtime just applied.
    fn on_update(&mut self, update: Update) {
        match update {
            Update::Fetched(Fetched::Conversations) => {
                let store = &self.runtime.state().conversations;
                self.sidebar.clamp_selection(store);
            }
            Update::Link(LinkEvent::Failed { reason }) => {
                self.set_status(format!("Live updates unavailable: {}", reason), true);
            }
            Update::Link(LinkEvent::Message(ServerEvent::NewNotification(n))) => {
                if self.status_message.is_none() {
                    self.set_status(format!("New notification: {}", n.title), false);
                }
            }
            _ => {}
        }
    }
}

/// Run the TUI for the stored session.
pub async fn run(contact: Option<ContactOwner>) -> Result<()> {
    let config = Config::load()?;
    let session = config.require_session()?.clone();

    let mut runtime = live::runtime(&config)?;
    // The chat panel is always open in the TUI.
    runtime.apply(|s| s.set_chat_open(true));
    runtime.set_session(Some(&session)).await?;
    if let Some(c) = contact {
        runtime.apply(|s| s.contact_owner(c.owner, c.venue, &c.venue_name));
    }

    let mut app = App::new(runtime);
    if app.chat().active().is_none() && app.chat().viewer().is_some() {
        app.set_status(format!("Logged in as {}", session.user.name), false);
    }

    // ratatui::init installs a panic hook that restores the terminal.
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &mut app).await;
    ratatui::restore();

    let App { runtime, .. } = app;
    runtime.shutdown().await;
    result
}

async fn run_app(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    let mut events = EventStream::new();
    let mut redraw = tokio::time::interval(IDLE_REDRAW);

    while !app.should_exit {
        terminal.draw(|frame| ui::render(frame, app))?;

        let input = tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => Input::Key(key),
                Some(Ok(_)) => Input::Redraw,
                Some(Err(e)) => return Err(e.into()),
                None => Input::Closed,
            },
            update = app.runtime.next() => match update {
                Some(update) => Input::Update(update),
                None => Input::Closed,
            },
            _ = redraw.tick() => Input::Redraw,
        };

        match input {
            Input::Key(key) => app.handle_key(key),
            Input::Update(update) => app.on_update(update),
            Input::Redraw => {}
            Input::Closed => break,
        }
    }

    Ok(())
}

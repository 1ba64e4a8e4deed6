//! Venue Chat - terminal client for the venue marketplace
//!
//! Conversations, live messages, presence and notifications from the
//! command line or a full-screen TUI.

mod api;
mod auth;
mod chat;
mod config;
mod models;
mod realtime;
mod tui;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::StartTarget;
use crate::models::{ConversationId, NotificationId, UserId, VenueId};

#[derive(Parser)]
#[command(name = "venue-chat")]
#[command(about = "Terminal client for venue marketplace chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,

        /// Password (prefer VENUE_CHAT_PASSWORD or the prompt)
        #[arg(short, long)]
        password: Option<String>,

        /// Log in again even if a valid session is stored
        #[arg(short, long)]
        force: bool,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show current session status
    Status,

    /// List conversations with unread counts
    Conversations,

    /// Read messages from a conversation
    Read {
        /// Conversation ID (from `conversations` output)
        conversation_id: u64,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message over the realtime channel and wait for delivery
    Send {
        /// Conversation ID (from `conversations` output)
        conversation_id: u64,

        /// Message content
        message: String,
    },

    /// Start (or reopen) a conversation
    Start {
        /// With the marketplace assistant
        #[arg(long, conflicts_with_all = ["owner", "venue"])]
        assistant: bool,

        /// With a venue owner (user ID)
        #[arg(long, requires = "venue", required_unless_present = "assistant")]
        owner: Option<u64>,

        /// The venue the conversation is about
        #[arg(long, requires = "owner")]
        venue: Option<u64>,
    },

    /// List notifications
    Notifications {
        /// Only unread ones
        #[arg(short, long)]
        unread: bool,
    },

    /// Mark one notification read
    MarkRead { notification_id: u64 },

    /// Mark every notification read
    MarkAllRead,

    /// Mark a notification read and show where it leads
    OpenNotification { notification_id: u64 },

    /// Ask whether a user is online
    Presence { user_id: u64 },

    /// Print live messages, status changes and notifications
    Listen,

    /// Launch the terminal user interface
    Tui {
        /// Open a conversation with this venue owner on start
        #[arg(long, requires_all = ["venue", "venue_name"])]
        owner: Option<u64>,

        #[arg(long, requires = "owner")]
        venue: Option<u64>,

        /// Name shown for the new conversation
        #[arg(long, requires = "owner")]
        venue_name: Option<String>,
    },
}

/// Log to stderr, or to a file under the data dir while the TUI owns the
/// terminal.
fn init_logging(verbose: bool, tui: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    if tui {
        let dir = config::Config::data_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join("venue-chat.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, matches!(cli.command, Commands::Tui { .. }))?;

    match cli.command {
        Commands::Login {
            email,
            password,
            force,
        } => {
            auth::login(email, password, force).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Conversations => {
            tracing::debug!("Fetching conversations...");
            api::list_conversations().await?;
        }
        Commands::Read {
            conversation_id,
            limit,
        } => {
            api::read_messages(ConversationId(conversation_id), limit).await?;
        }
        Commands::Send {
            conversation_id,
            message,
        } => {
            chat::live::send(ConversationId(conversation_id), &message).await?;
        }
        Commands::Start {
            assistant,
            owner,
            venue,
        } => {
            let target = match (assistant, owner, venue) {
                (true, _, _) => StartTarget::Assistant,
                (false, Some(owner), Some(venue)) => StartTarget::Owner {
                    owner: UserId(owner),
                    venue: VenueId(venue),
                },
                _ => anyhow::bail!("Use --assistant or --owner <id> --venue <id>"),
            };
            api::start_conversation(target).await?;
        }
        Commands::Notifications { unread } => {
            api::list_notifications(unread).await?;
        }
        Commands::MarkRead { notification_id } => {
            api::mark_read(NotificationId(notification_id)).await?;
        }
        Commands::MarkAllRead => {
            api::mark_all_read().await?;
        }
        Commands::OpenNotification { notification_id } => {
            api::open_notification(NotificationId(notification_id)).await?;
        }
        Commands::Presence { user_id } => {
            chat::live::presence(UserId(user_id)).await?;
        }
        Commands::Listen => {
            chat::live::listen().await?;
        }
        Commands::Tui {
            owner,
            venue,
            venue_name,
        } => {
            let contact = match (owner, venue, venue_name) {
                (Some(owner), Some(venue), Some(venue_name)) => Some(tui::ContactOwner {
                    owner: UserId(owner),
                    venue: VenueId(venue),
                    venue_name,
                }),
                _ => None,
            };
            tui::run(contact).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["venue-chat", "send", "12", "hello there"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Send { conversation_id: 12, ref message } if message == "hello there"
        ));

        let cli = Cli::try_parse_from(["venue-chat", "-v", "start", "--assistant"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Start { assistant: true, .. }));
    }

    #[test]
    fn test_start_requires_a_target() {
        assert!(Cli::try_parse_from(["venue-chat", "start"]).is_err());
        assert!(Cli::try_parse_from(["venue-chat", "start", "--owner", "3"]).is_err());
        assert!(Cli::try_parse_from(["venue-chat", "start", "--owner", "3", "--venue", "9"]).is_ok());
        assert!(
            Cli::try_parse_from(["venue-chat", "start", "--assistant", "--owner", "3"]).is_err()
        );
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! Conversation commands (print to stdout).

use anyhow::{Context, Result};
use chrono::Local;

use super::client::ApiClient;
use super::ChatApi;
use crate::chat::messages::{layout, Row};
use crate::chat::notifications::badge;
use crate::config::Config;
use crate::models::{ConversationId, ConversationSummary, NewConversation, UserId, VenueId};

/// Who to start a conversation with.
pub enum StartTarget {
    Assistant,
    Owner { owner: UserId, venue: VenueId },
}

/// Shorten a preview to `max` characters on a char boundary.
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim().replace('\n', " ");
    if text.chars().count() <= max {
        return text;
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// The list preview: unread threads say so instead of quoting.
pub fn preview(c: &ConversationSummary) -> String {
    if c.unread > 0 {
        "New message".to_string()
    } else {
        c.last_message.as_deref().map(|m| truncate(m, 60)).unwrap_or_default()
    }
}

/// List the user's conversations.
pub async fn list_conversations() -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::from_config(&config)?;
    let viewer = config.require_session()?.user.id;

    let summaries: Vec<ConversationSummary> = client
        .conversations(viewer)
        .await?
        .into_iter()
        .map(|r| r.resolve(viewer))
        .collect();
    let total: u32 = summaries.iter().map(|c| c.unread).sum();

    println!("\nConversations ({} unread):", total);
    println!("{:-<60}", "");

    if summaries.is_empty() {
        println!("  (no conversations yet; try 'venue-chat start --assistant')");
        return Ok(());
    }

    for c in &summaries {
        let unread = badge(c.unread as usize)
            .map(|b| format!(" [{}]", b))
            .unwrap_or_default();
        println!("{}{}  ({})", c.name, unread, c.kind.label());
        println!("  ID: {}", c.id);
        if let Some(at) = c.last_message_at {
            println!("  Last: {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
        }
        let preview = preview(c);
        if !preview.is_empty() {
            println!("  {}", preview);
        }
        println!();
    }

    Ok(())
}

/// Print a conversation's history with day separators.
pub async fn read_messages(id: ConversationId, limit: usize) -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::from_config(&config)?;
    let viewer = config.require_session()?.user.id;

    let history = client.messages(id).await?;
    if history.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let start = history.len().saturating_sub(limit);
    let shown = &history[start..];
    for row in layout(shown, &Local::now()) {
        match row {
            Row::Separator(label) => println!("\n--- {} ---", label),
            Row::Bubble { message, .. } => {
                let time = message
                    .created_at
                    .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
                    .unwrap_or_else(|| "--:--".to_string());
                let sender = if message.sender_id == viewer {
                    "You".to_string()
                } else {
                    format!("#{}", message.sender_id)
                };
                println!("[{}] {}: {}", time, sender, message.content);
            }
        }
    }

    Ok(())
}

/// Create (or fetch the existing) conversation and print its id.
pub async fn start_conversation(target: StartTarget) -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::from_config(&config)?;

    let body = match target {
        StartTarget::Assistant => NewConversation::assistant(),
        StartTarget::Owner { owner, venue } => NewConversation::venue_owner(owner, venue),
    };
    let id = client
        .create_conversation(body)
        .await
        .context("Could not start conversation")?;

    println!("Conversation {} ready.", id);
    println!("  venue-chat read {}", id);
    println!("  venue-chat send {} \"Hello\"", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short \n", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_preview_hides_text_of_unread_threads() {
        let mut c = ConversationSummary::with_owner(ConversationId(1), "Loft", UserId(3), VenueId(2));
        c.last_message = Some("See you Friday".to_string());
        assert_eq!(preview(&c), "See you Friday");
        c.unread = 2;
        assert_eq!(preview(&c), "New message");
    }
}

//! Notification commands (print to stdout).

use anyhow::{bail, Result};
use chrono::Local;

use super::client::ApiClient;
use super::ChatApi;
use crate::chat::notifications::format_relative;
use crate::chat::NotificationIntent;
use crate::config::Config;
use crate::models::{Notification, NotificationId};

fn print_notification(n: &Notification) {
    let marker = if n.is_read { " " } else { "*" };
    let when = n
        .created_at
        .map(|t| format_relative(t, &Local::now()))
        .unwrap_or_default();
    println!("{} [{}] {}  {}", marker, n.id, n.title, when);
    if !n.message.is_empty() {
        println!("    {}", n.message);
    }
}

/// List notifications, newest first as the backend returns them.
pub async fn list_notifications(unread_only: bool) -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::from_config(&config)?;
    let user = config.require_session()?.user.id;

    let items = client.notifications(user).await?;
    let unread = items.iter().filter(|n| !n.is_read).count();

    println!("\nNotifications ({} unread):", unread);
    println!("{:-<60}", "");

    let shown: Vec<&Notification> = items
        .iter()
        .filter(|n| !unread_only || !n.is_read)
        .collect();
    if shown.is_empty() {
        println!("  (nothing here)");
        return Ok(());
    }
    for n in shown {
        print_notification(n);
    }
    Ok(())
}

pub async fn mark_read(id: NotificationId) -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::from_config(&config)?;
    client.mark_notification_read(id).await?;
    println!("Notification {} marked read.", id);
    Ok(())
}

pub async fn mark_all_read() -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::from_config(&config)?;
    let user = config.require_session()?.user.id;
    client.mark_all_notifications_read(user).await?;
    println!("All notifications marked read.");
    Ok(())
}

/// Mark a notification read and print where it leads.
pub async fn open_notification(id: NotificationId) -> Result<()> {
    let config = Config::load()?;
    let client = ApiClient::from_config(&config)?;
    let user = config.require_session()?.user.id;

    let items = client.notifications(user).await?;
    let Some(n) = items.iter().find(|n| n.id == id) else {
        bail!("No notification {}", id);
    };

    print_notification(n);
    if !n.is_read {
        if let Err(e) = client.mark_notification_read(id).await {
            tracing::warn!("{:#}", e);
        }
    }

    println!("\n-> {}", NotificationIntent::classify(n).describe());
    Ok(())
}

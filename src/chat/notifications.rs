//! Notification feed and its unread bookkeeping.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Notification, NotificationId};

#[derive(Debug, Default)]
pub struct NotificationFeed {
    items: Vec<Notification>,
}

impl NotificationFeed {
    pub fn replace(&mut self, items: Vec<Notification>) {
        self.items = items;
    }

    /// A pushed notification goes on top; no refetch.
    pub fn prepend(&mut self, notification: Notification) {
        self.items.insert(0, notification);
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// Derived from the items on every call; there is no separate counter.
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    /// Flip one entry to read. Returns false if it is not in the feed.
    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.is_read = true;
        }
    }
}

/// Badge text for an unread count: nothing at zero, capped at "9+".
pub fn badge(count: usize) -> Option<String> {
    match count {
        0 => None,
        1..=9 => Some(count.to_string()),
        _ => Some("9+".to_string()),
    }
}

/// "Just now", "5m ago", "3h ago", then the month and day in `now`'s zone.
pub fn format_relative<Tz>(at: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let secs = now.clone().with_timezone(&Utc).signed_duration_since(at).num_seconds();
    match secs {
        s if s < 60 => "Just now".to_string(),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        _ => at.with_timezone(&now.timezone()).format("%b %-d").to_string(),
    }
}

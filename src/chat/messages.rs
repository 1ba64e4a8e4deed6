//! Message list of the active conversation, plus its display grouping.

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};

use crate::models::{ConversationId, Message};

#[derive(Debug, Default)]
pub struct MessageStream {
    active: Option<ConversationId>,
    messages: Vec<Message>,
    loading: bool,
}

impl MessageStream {
    /// Switch to `id`. The old list is gone before any fetch resolves.
    pub fn open(&mut self, id: ConversationId) {
        self.active = Some(id);
        self.messages.clear();
        self.loading = true;
    }

    pub fn close(&mut self) {
        self.active = None;
        self.messages.clear();
        self.loading = false;
    }

    #[cfg(test)]
    pub fn active(&self) -> Option<ConversationId> {
        self.active
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Commit fetched history for `id`. Returns false (and changes
    /// nothing) if `id` is no longer active.
    pub fn load(&mut self, id: ConversationId, history: Vec<Message>) -> bool {
        if self.active != Some(id) {
            tracing::debug!(
                "Discarding history of {} (active: {:?})",
                id,
                self.active.map(|a| a.0)
            );
            return false;
        }
        // History is authoritative; it already holds anything echoed so far.
        self.messages = history;
        self.loading = false;
        true
    }

    /// The fetch for `id` failed; keep whatever is shown.
    pub fn load_failed(&mut self, id: ConversationId) {
        if self.active == Some(id) {
            self.loading = false;
        }
    }

    /// Append a realtime message if it belongs to the active conversation.
    pub fn push(&mut self, message: Message) -> bool {
        if self.active != Some(message.conversation_id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}

/// Date separator text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Today,
    Yesterday,
    Date(NaiveDate),
}

impl DayLabel {
    /// Label for the calendar day `at` falls on in `now`'s time zone.
    pub fn for_time<Tz: TimeZone>(at: DateTime<Utc>, now: &DateTime<Tz>) -> Self {
        let day = at.with_timezone(&now.timezone()).date_naive();
        let today = now.date_naive();
        if day == today {
            DayLabel::Today
        } else if today.checked_sub_days(Days::new(1)) == Some(day) {
            DayLabel::Yesterday
        } else {
            DayLabel::Date(day)
        }
    }
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayLabel::Today => f.write_str("Today"),
            DayLabel::Yesterday => f.write_str("Yesterday"),
            DayLabel::Date(d) => write!(f, "{}/{}/{}", d.month(), d.day(), d.year()),
        }
    }
}

/// One rendered line group of the message pane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Row<'a> {
    Separator(DayLabel),
    Bubble {
        message: &'a Message,
        /// No further message from this sender directly after it; the
        /// bubble keeps its tail corner.
        last_from_sender: bool,
    },
}

/// Lay out `messages` in delivery order with a separator at every local
/// calendar-day change. An undated message (a fresh echo) counts as today.
pub fn layout<'a, Tz: TimeZone>(messages: &'a [Message], now: &DateTime<Tz>) -> Vec<Row<'a>> {
    let mut rows = Vec::with_capacity(messages.len() + 4);
    let mut current: Option<DayLabel> = None;

    for (i, message) in messages.iter().enumerate() {
        let label = message
            .created_at
            .map_or(DayLabel::Today, |at| DayLabel::for_time(at, now));
        if current != Some(label) {
            rows.push(Row::Separator(label));
            current = Some(label);
        }
        let last_from_sender = messages
            .get(i + 1)
            .map_or(true, |next| next.sender_id != message.sender_id);
        rows.push(Row::Bubble {
            message,
            last_from_sender,
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use chrono::{FixedOffset, NaiveDateTime};

    fn msg(conversation: u64, sender: u64, content: &str) -> Message {
        Message {
            conversation_id: ConversationId(conversation),
            sender_id: UserId(sender),
            content: content.to_string(),
            created_at: None,
            is_read: false,
        }
    }

    fn at(tz: &FixedOffset, s: &str) -> DateTime<Utc> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        tz.from_local_datetime(&naive)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_switch_discards_late_history() {
        let mut stream = MessageStream::default();
        stream.open(ConversationId(1));
        stream.open(ConversationId(2));
        assert!(stream.messages().is_empty());

        // A's fetch resolves after the switch.
        assert!(!stream.load(ConversationId(1), vec![msg(1, 5, "old")]));
        assert!(stream.messages().is_empty());
        assert!(stream.is_loading());

        assert!(stream.load(ConversationId(2), vec![msg(2, 5, "new")]));
        assert_eq!(stream.messages().len(), 1);
        assert_eq!(stream.messages()[0].conversation_id, ConversationId(2));
        assert!(!stream.is_loading());
    }

    #[test]
    fn test_open_clears_synchronously() {
        let mut stream = MessageStream::default();
        stream.open(ConversationId(1));
        stream.load(ConversationId(1), vec![msg(1, 5, "a"), msg(1, 6, "b")]);
        stream.open(ConversationId(2));
        assert!(stream.messages().is_empty());
        assert_eq!(stream.active(), Some(ConversationId(2)));
    }

    #[test]
    fn test_push_filters_by_active_conversation() {
        let mut stream = MessageStream::default();
        assert!(!stream.push(msg(1, 5, "nobody is looking")));

        stream.open(ConversationId(1));
        assert!(!stream.push(msg(2, 5, "elsewhere")));
        assert!(stream.push(msg(1, 5, "here")));
        assert_eq!(stream.messages().len(), 1);

        stream.close();
        assert!(!stream.push(msg(1, 5, "closed")));
        assert!(stream.messages().is_empty());
    }

    #[test]
    fn test_day_boundary_uses_local_calendar_day() {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = at(&tz, "2024-03-11 08:00:00").with_timezone(&tz);

        let before = at(&tz, "2024-03-10 23:59:59");
        let after = at(&tz, "2024-03-11 00:00:01");
        assert_eq!(DayLabel::for_time(after, &now), DayLabel::Today);
        assert_eq!(DayLabel::for_time(before, &now), DayLabel::Yesterday);

        let mut a = msg(1, 5, "late");
        a.created_at = Some(before);
        let mut b = msg(1, 5, "early");
        b.created_at = Some(after);
        let messages = vec![a, b];
        let rows = layout(&messages, &now);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], Row::Separator(DayLabel::Yesterday));
        assert!(matches!(rows[1], Row::Bubble { .. }));
        assert_eq!(rows[2], Row::Separator(DayLabel::Today));
    }

    #[test]
    fn test_undated_echo_after_old_history_is_today() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at(&tz, "2024-03-11 09:00:00").with_timezone(&tz);

        let mut old = msg(1, 5, "see you tomorrow");
        old.created_at = Some(at(&tz, "2024-03-10 18:00:00"));
        let echo = msg(1, 10, "on my way");
        let messages = vec![old, echo];

        let rows = layout(&messages, &now);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], Row::Separator(DayLabel::Yesterday));
        assert_eq!(rows[2], Row::Separator(DayLabel::Today));
        assert!(matches!(rows[3], Row::Bubble { message, .. } if message.content == "on my way"));
    }

    #[test]
    fn test_day_label_is_not_a_rolling_window() {
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        let now = at(&tz, "2024-03-11 00:00:30").with_timezone(&tz);
        // One minute earlier, but already yesterday.
        assert_eq!(
            DayLabel::for_time(at(&tz, "2024-03-10 23:59:30"), &now),
            DayLabel::Yesterday
        );
        // Two days ago.
        let label = DayLabel::for_time(at(&tz, "2024-03-09 12:00:00"), &now);
        assert_eq!(
            label,
            DayLabel::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
        );
        assert_eq!(label.to_string(), "3/9/2024");
    }

    #[test]
    fn test_bubble_grouping() {
        let messages = vec![msg(1, 5, "a"), msg(1, 5, "b"), msg(1, 6, "c"), msg(1, 5, "d")];
        let now = Utc::now();
        let flags: Vec<bool> = layout(&messages, &now)
            .into_iter()
            .filter_map(|r| match r {
                Row::Bubble {
                    last_from_sender, ..
                } => Some(last_from_sender),
                Row::Separator(_) => None,
            })
            .collect();
        assert_eq!(flags, vec![false, true, true, true]);
    }
}

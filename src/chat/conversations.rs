//! Conversation summaries, refreshed wholesale from the backend.

use crate::models::{ConversationId, ConversationRecord, ConversationSummary, UserId};

/// One row of the conversation list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry<'a> {
    /// Always offered first. Carries the backend thread once one exists.
    Assistant(Option<&'a ConversationSummary>),
    Conversation(&'a ConversationSummary),
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    items: Vec<ConversationSummary>,
    loaded: bool,
}

impl ConversationStore {
    /// Replace every summary with a fresh fetch. Duplicate ids keep the
    /// first occurrence.
    pub fn replace(&mut self, records: Vec<ConversationRecord>, viewer: UserId) {
        let mut items: Vec<ConversationSummary> = Vec::with_capacity(records.len());
        for record in records {
            if items.iter().any(|c| c.id == record.conversation_id) {
                tracing::debug!("Duplicate conversation {} in listing", record.conversation_id);
                continue;
            }
            items.push(record.resolve(viewer));
        }
        self.items = items;
        self.loaded = true;
    }

    /// Insert a conversation the backend just created, unless the listing
    /// already has it. The next refresh supersedes it either way.
    pub fn insert(&mut self, summary: ConversationSummary) {
        if self.get(summary.id).is_none() {
            self.items.insert(0, summary);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, id: ConversationId) -> Option<&ConversationSummary> {
        self.items.iter().find(|c| c.id == id)
    }

    /// The backend thread with the assistant, if there is one.
    pub fn assistant(&self) -> Option<&ConversationSummary> {
        self.items.iter().find(|c| c.is_assistant())
    }

    /// Sum of every summary's unread count, recomputed on each call.
    pub fn total_unread(&self) -> u32 {
        self.items.iter().map(|c| c.unread).sum()
    }

    /// Real conversations, assistant threads excluded.
    pub fn conversations(&self) -> impl Iterator<Item = &ConversationSummary> {
        self.items.iter().filter(|c| !c.is_assistant())
    }

    /// List rows: the assistant entry, then every other conversation.
    pub fn entries(&self) -> Vec<Entry<'_>> {
        std::iter::once(Entry::Assistant(self.assistant()))
            .chain(self.conversations().map(Entry::Conversation))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationKind, VenueId, ASSISTANT_ID};

    const VIEWER: UserId = UserId(10);

    fn record(id: u64, admin: Option<u64>, unread: u32) -> ConversationRecord {
        serde_json::from_value(serde_json::json!({
            "conversation_id": id,
            "name": format!("conv {}", id),
            "conversation_type": if admin.is_some() { "customer_admin" } else { "customer_owner" },
            "user_id": VIEWER.0,
            "admin_id": admin,
            "owner_user_id": if admin.is_none() { Some(30) } else { None },
            "unread": unread,
        }))
        .unwrap()
    }

    #[test]
    fn test_total_unread_is_sum_after_every_replace() {
        let mut store = ConversationStore::default();
        assert_eq!(store.total_unread(), 0);

        store.replace(vec![record(1, None, 2), record(2, Some(7), 3)], VIEWER);
        assert_eq!(store.total_unread(), 5);

        store.replace(vec![record(2, Some(7), 1)], VIEWER);
        assert_eq!(store.total_unread(), 1);
        assert!(store.get(ConversationId(1)).is_none());

        store.replace(vec![], VIEWER);
        assert_eq!(store.total_unread(), 0);
        assert!(store.is_loaded());
    }

    #[test]
    fn test_assistant_thread_suppressed_from_list() {
        let mut store = ConversationStore::default();
        store.replace(
            vec![record(1, None, 0), record(9, Some(ASSISTANT_ID.0), 4)],
            VIEWER,
        );

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        match entries[0] {
            Entry::Assistant(Some(c)) => assert_eq!(c.id, ConversationId(9)),
            other => panic!("unexpected {:?}", other),
        }
        match entries[1] {
            Entry::Conversation(c) => {
                assert_eq!(c.id, ConversationId(1));
                assert_eq!(c.kind, ConversationKind::Owner);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Suppressed from the list, still counted.
        assert_eq!(store.total_unread(), 4);
    }

    #[test]
    fn test_assistant_entry_offered_without_backend_thread() {
        let store = ConversationStore::default();
        assert_eq!(store.entries(), vec![Entry::Assistant(None)]);
        assert_eq!(store.conversations().count(), 0);
    }

    #[test]
    fn test_duplicates_and_insert() {
        let mut store = ConversationStore::default();
        store.replace(vec![record(1, None, 1), record(1, None, 5)], VIEWER);
        assert_eq!(store.total_unread(), 1);

        store.insert(ConversationSummary::with_owner(ConversationId(1), "x", UserId(30), VenueId(1)));
        assert_eq!(store.conversations().count(), 1);

        store.insert(ConversationSummary::with_owner(ConversationId(3), "Loft", UserId(31), VenueId(3)));
        assert_eq!(store.conversations().next().map(|c| c.id), Some(ConversationId(3)));
    }
}

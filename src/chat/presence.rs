//! Online state of the active conversation's counterparty.

use crate::models::{PresenceStatus, StatusUpdate, UserId, ASSISTANT_ID};
use crate::realtime::ClientEvent;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    tracked: Option<UserId>,
    status: PresenceStatus,
}

impl PresenceTracker {
    /// Start tracking `counterparty`; status resets to offline until the
    /// server answers. Returns the status request to emit, if any.
    ///
    /// The assistant is online without asking.
    pub fn track(&mut self, counterparty: Option<UserId>) -> Option<ClientEvent> {
        self.tracked = counterparty;
        self.status = PresenceStatus::Offline;
        match counterparty {
            Some(ASSISTANT_ID) => {
                self.status = PresenceStatus::Online;
                None
            }
            Some(user_id) => Some(ClientEvent::RequestStatus { user_id }),
            None => None,
        }
    }

    /// Ask again for the tracked counterparty (after a reconnect).
    pub fn request(&self) -> Option<ClientEvent> {
        match self.tracked {
            Some(ASSISTANT_ID) | None => None,
            Some(user_id) => Some(ClientEvent::RequestStatus { user_id }),
        }
    }

    /// Apply a status event. Only updates about the counterparty tracked
    /// right now count; anything else is a leftover and is dropped.
    pub fn apply(&mut self, update: &StatusUpdate) -> bool {
        if self.tracked != Some(update.user_id) || update.user_id == ASSISTANT_ID {
            tracing::debug!(
                "Ignoring status of {} (tracking {:?})",
                update.user_id,
                self.tracked.map(|u| u.0)
            );
            return false;
        }
        self.status = update.status;
        true
    }

    pub fn untrack(&mut self) {
        self.tracked = None;
        self.status = PresenceStatus::Offline;
    }

    #[cfg(test)]
    pub fn tracked(&self) -> Option<UserId> {
        self.tracked
    }

    pub fn status(&self) -> PresenceStatus {
        self.status
    }
}

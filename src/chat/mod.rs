//! Chat core: conversation list, active message stream, presence and the
//! notification feed, tied together by a command-emitting state machine.

mod backend;
pub mod conversations;
mod intent;
pub mod live;
pub mod messages;
pub mod notifications;
pub mod presence;
mod runtime;
mod state;

pub use intent::NotificationIntent;
pub use runtime::{ChatRuntime, Fetched, Update};
pub use state::{ChatState, LinkState};

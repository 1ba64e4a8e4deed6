//! Data models for marketplace chat entities

mod chat;
mod ids;
mod message;
mod notification;
mod user;
pub mod wire;

pub use chat::*;
pub use ids::*;
pub use message::*;
pub use notification::*;
pub use user::*;

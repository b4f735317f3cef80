//! Conversation memory

pub mod conversation;

pub use conversation::ConversationStore;

// Discord layer - commands and presence.

#[path = "commands/command_catalog.rs"]
pub mod commands;

// Re-export command types for convenience
pub use commands::moderation::{Data, Error, SharedStore};

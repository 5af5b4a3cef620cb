// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "classification/mod.rs"]
pub mod classification;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "notifications/mod.rs"]
pub mod notifications;

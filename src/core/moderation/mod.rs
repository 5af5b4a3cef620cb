// Core moderation module - request lifecycle, dedup and the store port.

pub mod fingerprint;
pub mod moderation_models;
pub mod moderation_service;
pub mod moderation_store;

pub use moderation_models::*;
pub use moderation_service::*;
pub use moderation_store::*;

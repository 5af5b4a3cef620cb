// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "analytics/analytics_service.rs"]
pub mod analytics;

#[path = "classification/mod.rs"]
pub mod classification;

#[path = "config/app_config.rs"]
pub mod config;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "notifications/mod.rs"]
pub mod notifications;

// Core notifications module - alert channels and the fan-out dispatcher.

pub mod dispatcher;
pub mod notification_models;
pub mod notifier;

pub use dispatcher::NotificationDispatcher;
pub use notification_models::{DeliveryOutcome, DeliveryStatus, ModerationAlert, NotificationChannel};
pub use notifier::{Notifier, NotifyError};

// Persistence port for the moderation core.
//
// The core defines WHAT it needs; infra provides SQLite and in-memory
// implementations. The store owns ids and timestamps.

use super::moderation_models::{
    Classification, ContentStatus, ModerationRequest, ModerationResult, NewModerationRequest,
    NewModerationResult, NotificationLog, RequestRecord,
};
use crate::core::notifications::NotificationChannel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another request already owns this fingerprint.
    #[error("Duplicate content fingerprint: {0}")]
    Duplicate(String),

    #[error("Moderation request {0} not found")]
    NotFound(i64),

    /// The request already reached a terminal state.
    #[error("Moderation request {0} is no longer pending")]
    NotPending(i64),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ModerationStore: Send + Sync {
    async fn find_request_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ModerationRequest>, StoreError>;

    async fn find_request(&self, id: i64) -> Result<Option<ModerationRequest>, StoreError>;

    /// Insert a new `pending` request.
    /// Fails with `StoreError::Duplicate` if the fingerprint is taken.
    async fn create_request(
        &self,
        request: NewModerationRequest,
    ) -> Result<ModerationRequest, StoreError>;

    /// Move a pending request to a terminal status.
    /// A request that is already terminal is left untouched.
    async fn update_request_status(&self, id: i64, status: ContentStatus)
        -> Result<(), StoreError>;

    /// Insert the result and mark its request `completed` in one step.
    async fn create_result(
        &self,
        result: NewModerationResult,
    ) -> Result<ModerationResult, StoreError>;

    async fn get_result(&self, request_id: i64) -> Result<Option<ModerationResult>, StoreError>;

    async fn create_notification_log(
        &self,
        request_id: i64,
        channel: NotificationChannel,
        status: &str,
    ) -> Result<NotificationLog, StoreError>;

    async fn notification_logs_for(
        &self,
        request_id: i64,
    ) -> Result<Vec<NotificationLog>, StoreError>;

    /// Every request from one submitter, newest first.
    async fn requests_for(&self, submitter: &str) -> Result<Vec<RequestRecord>, StoreError>;

    async fn count_requests(&self) -> Result<u64, StoreError>;

    async fn count_requests_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn count_by_status(&self) -> Result<Vec<(ContentStatus, u64)>, StoreError>;

    async fn count_by_classification(&self) -> Result<Vec<(Classification, u64)>, StoreError>;
}

// Lets the orchestrator and the analytics service share one store instance.
#[async_trait]
impl<T: ModerationStore + ?Sized> ModerationStore for Arc<T> {
    async fn find_request_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ModerationRequest>, StoreError> {
        (**self).find_request_by_fingerprint(fingerprint).await
    }

    async fn find_request(&self, id: i64) -> Result<Option<ModerationRequest>, StoreError> {
        (**self).find_request(id).await
    }

    async fn create_request(
        &self,
        request: NewModerationRequest,
    ) -> Result<ModerationRequest, StoreError> {
        (**self).create_request(request).await
    }

    async fn update_request_status(
        &self,
        id: i64,
        status: ContentStatus,
    ) -> Result<(), StoreError> {
        (**self).update_request_status(id, status).await
    }

    async fn create_result(
        &self,
        result: NewModerationResult,
    ) -> Result<ModerationResult, StoreError> {
        (**self).create_result(result).await
    }

    async fn get_result(&self, request_id: i64) -> Result<Option<ModerationResult>, StoreError> {
        (**self).get_result(request_id).await
    }

    async fn create_notification_log(
        &self,
        request_id: i64,
        channel: NotificationChannel,
        status: &str,
    ) -> Result<NotificationLog, StoreError> {
        (**self)
            .create_notification_log(request_id, channel, status)
            .await
    }

    async fn notification_logs_for(
        &self,
        request_id: i64,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        (**self).notification_logs_for(request_id).await
    }

    async fn requests_for(&self, submitter: &str) -> Result<Vec<RequestRecord>, StoreError> {
        (**self).requests_for(submitter).await
    }

    async fn count_requests(&self) -> Result<u64, StoreError> {
        (**self).count_requests().await
    }

    async fn count_requests_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).count_requests_since(since).await
    }

    async fn count_by_status(&self) -> Result<Vec<(ContentStatus, u64)>, StoreError> {
        (**self).count_by_status().await
    }

    async fn count_by_classification(&self) -> Result<Vec<(Classification, u64)>, StoreError> {
        (**self).count_by_classification().await
    }
}

// Analytics - read-only rollups over moderation history.
//
// Nothing here writes. Summaries are rebuilt from the store on every call,
// so they always reflect the latest persisted state.

use crate::core::moderation::{
    Classification, ContentKind, ContentStatus, ModerationStore, RequestRecord, StoreError,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// How many requests `recent_activity` carries.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityItem {
    pub request_id: i64,
    pub kind: ContentKind,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub classification: Option<Classification>,
    pub confidence: Option<f64>,
    pub provider: Option<String>,
}

impl From<&RequestRecord> for ActivityItem {
    fn from(record: &RequestRecord) -> Self {
        let result = record.result.as_ref();
        Self {
            request_id: record.request.id,
            kind: record.request.kind,
            status: record.request.status,
            created_at: record.request.created_at,
            classification: result.map(|r| r.classification),
            confidence: result.map(|r| r.confidence),
            provider: result.map(|r| r.provider.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub submitter: String,
    pub total: u64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub classification_histogram: BTreeMap<Classification, u64>,
    /// Newest first.
    pub recent_activity: Vec<ActivityItem>,
    pub last_request_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSummary {
    pub total: u64,
    pub status_histogram: BTreeMap<ContentStatus, u64>,
    pub classification_histogram: BTreeMap<Classification, u64>,
    pub requests_in_last_24h: u64,
}

pub struct AnalyticsService<S: ModerationStore> {
    store: S,
}

impl<S: ModerationStore> AnalyticsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn user_summary(&self, submitter: &str) -> Result<UserSummary, AnalyticsError> {
        let records = self.store.requests_for(submitter).await?;

        let mut completed_count = 0;
        let mut failed_count = 0;
        let mut classification_histogram = BTreeMap::new();

        for record in &records {
            match record.request.status {
                ContentStatus::Completed => completed_count += 1,
                ContentStatus::Failed => failed_count += 1,
                ContentStatus::Pending => {}
            }
            if let Some(result) = &record.result {
                *classification_histogram
                    .entry(result.classification)
                    .or_insert(0) += 1;
            }
        }

        Ok(UserSummary {
            submitter: submitter.to_string(),
            total: records.len() as u64,
            completed_count,
            failed_count,
            classification_histogram,
            recent_activity: records
                .iter()
                .take(RECENT_ACTIVITY_LIMIT)
                .map(ActivityItem::from)
                .collect(),
            last_request_timestamp: records.first().map(|r| r.request.created_at),
        })
    }

    pub async fn system_summary(&self) -> Result<SystemSummary, AnalyticsError> {
        self.system_summary_at(Utc::now()).await
    }

    /// System summary with the 24 hour window ending at `now`.
    pub async fn system_summary_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SystemSummary, AnalyticsError> {
        let total = self.store.count_requests().await?;
        let status_histogram = self.store.count_by_status().await?.into_iter().collect();
        let classification_histogram = self
            .store
            .count_by_classification()
            .await?
            .into_iter()
            .collect();
        let requests_in_last_24h = self
            .store
            .count_requests_since(now - Duration::hours(24))
            .await?;

        Ok(SystemSummary {
            total,
            status_histogram,
            classification_histogram,
            requests_in_last_24h,
        })
    }
}

// In-memory implementation of ModerationStore.
//
// Backs the test suites and the `:memory:` database setting. Nothing
// survives a restart.

use crate::core::moderation::{
    Classification, ContentStatus, ModerationRequest, ModerationResult, ModerationStore,
    NewModerationRequest, NewModerationResult, NotificationLog, RequestRecord, ResultSummary,
    StoreError,
};
use crate::core::notifications::NotificationChannel;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
pub struct InMemoryModerationStore {
    next_id: AtomicI64,
    requests: DashMap<i64, ModerationRequest>,
    /// fingerprint -> request id. Uniqueness is enforced here.
    fingerprints: DashMap<String, i64>,
    /// Keyed by request id; at most one result per request.
    results: DashMap<i64, ModerationResult>,
    logs: DashMap<i64, Vec<NotificationLog>>,
}

impl InMemoryModerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn not_pending_error(&self, id: i64) -> StoreError {
        if self.requests.contains_key(&id) {
            StoreError::NotPending(id)
        } else {
            StoreError::NotFound(id)
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[async_trait]
impl ModerationStore for InMemoryModerationStore {
    async fn find_request_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ModerationRequest>, StoreError> {
        let Some(id) = self.fingerprints.get(fingerprint).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.requests.get(&id).map(|entry| entry.clone()))
    }

    async fn find_request(&self, id: i64) -> Result<Option<ModerationRequest>, StoreError> {
        Ok(self.requests.get(&id).map(|entry| entry.clone()))
    }

    async fn create_request(
        &self,
        request: NewModerationRequest,
    ) -> Result<ModerationRequest, StoreError> {
        // Holding the fingerprint entry makes check-and-insert atomic.
        match self.fingerprints.entry(request.fingerprint.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(request.fingerprint)),
            Entry::Vacant(slot) => {
                let created = ModerationRequest {
                    id: self.next_id(),
                    submitter: request.submitter,
                    kind: request.kind,
                    fingerprint: request.fingerprint,
                    status: ContentStatus::Pending,
                    created_at: now(),
                };
                self.requests.insert(created.id, created.clone());
                slot.insert(created.id);
                Ok(created)
            }
        }
    }

    async fn update_request_status(
        &self,
        id: i64,
        status: ContentStatus,
    ) -> Result<(), StoreError> {
        let mut request = self.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if request.status.is_terminal() {
            return Err(StoreError::NotPending(id));
        }
        request.status = status;
        Ok(())
    }

    async fn create_result(
        &self,
        result: NewModerationResult,
    ) -> Result<ModerationResult, StoreError> {
        let request_id = result.request_id;
        let Some(mut request) = self.requests.get_mut(&request_id) else {
            return Err(self.not_pending_error(request_id));
        };
        if request.status.is_terminal() {
            return Err(StoreError::NotPending(request_id));
        }

        let stored = ModerationResult {
            id: self.next_id(),
            request_id,
            classification: result.classification,
            confidence: result.confidence,
            reasoning: result.reasoning,
            provider: result.provider,
            raw_response: result.raw_response,
        };
        self.results.insert(request_id, stored.clone());
        request.status = ContentStatus::Completed;
        Ok(stored)
    }

    async fn get_result(&self, request_id: i64) -> Result<Option<ModerationResult>, StoreError> {
        Ok(self.results.get(&request_id).map(|entry| entry.clone()))
    }

    async fn create_notification_log(
        &self,
        request_id: i64,
        channel: NotificationChannel,
        status: &str,
    ) -> Result<NotificationLog, StoreError> {
        if !self.requests.contains_key(&request_id) {
            return Err(StoreError::NotFound(request_id));
        }

        let log = NotificationLog {
            id: self.next_id(),
            request_id,
            channel,
            status: status.to_string(),
            sent_at: now(),
        };
        self.logs.entry(request_id).or_default().push(log.clone());
        Ok(log)
    }

    async fn notification_logs_for(
        &self,
        request_id: i64,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        Ok(self
            .logs
            .get(&request_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn requests_for(&self, submitter: &str) -> Result<Vec<RequestRecord>, StoreError> {
        let mut requests: Vec<ModerationRequest> = self
            .requests
            .iter()
            .filter(|entry| entry.submitter == submitter)
            .map(|entry| entry.clone())
            .collect();
        requests.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(requests
            .into_iter()
            .map(|request| {
                let result = self.results.get(&request.id).map(|r| ResultSummary {
                    classification: r.classification,
                    confidence: r.confidence,
                    provider: r.provider.clone(),
                });
                RequestRecord { request, result }
            })
            .collect())
    }

    async fn count_requests(&self) -> Result<u64, StoreError> {
        Ok(self.requests.len() as u64)
    }

    async fn count_requests_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self
            .requests
            .iter()
            .filter(|entry| entry.created_at >= since)
            .count() as u64)
    }

    async fn count_by_status(&self) -> Result<Vec<(ContentStatus, u64)>, StoreError> {
        let mut counts = BTreeMap::new();
        for entry in self.requests.iter() {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_by_classification(&self) -> Result<Vec<(Classification, u64)>, StoreError> {
        let mut counts = BTreeMap::new();
        for entry in self.results.iter() {
            *counts.entry(entry.classification).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

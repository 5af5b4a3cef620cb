// Moderation orchestrator - owns the request lifecycle.
//
// For each submission:
// - Fingerprint the content and short-circuit on a known fingerprint
// - Persist a `pending` request
// - Classify with the selected provider
// - Persist the result (-> `completed`) or mark the request `failed`
// - Fan out an alert for flagged content and log every channel attempt
//
// Every step waits for the previous write, so a request is never observed
// `completed` without its result.

use super::fingerprint::fingerprint;
use super::moderation_models::{
    ContentKind, ContentStatus, ModerationRequest, NewModerationRequest, NewModerationResult,
    NotificationLog, RequestView, ResultView,
};
use super::moderation_store::{ModerationStore, StoreError};
use crate::core::classification::{
    ClassificationOutcome, ClassifierError, ClassifierRegistry, ProviderOutcome,
};
use crate::core::notifications::{ModerationAlert, NotificationChannel, NotificationDispatcher};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// How long a submission waits for someone else's in-flight request to settle.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Nothing usable is configured; retrying won't help.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Classification failed: {0}")]
    Classification(ClassifierError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ClassifierError> for ModerationError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::Config(msg) => ModerationError::Config(msg),
            other => ModerationError::Classification(other),
        }
    }
}

/// Content as submitted: raw text or a base64-encoded image.
#[derive(Debug, Clone, Copy)]
enum Submission<'a> {
    Text(&'a str),
    Image(&'a str),
}

impl Submission<'_> {
    fn kind(&self) -> ContentKind {
        match self {
            Submission::Text(_) => ContentKind::Text,
            Submission::Image(_) => ContentKind::Image,
        }
    }

    fn body(&self) -> &str {
        match self {
            Submission::Text(body) | Submission::Image(body) => body,
        }
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<S: ModerationStore> {
    store: S,
    classifiers: ClassifierRegistry,
    notifier: NotificationDispatcher,
    /// Channels targeted by alerts; `None` means every configured channel.
    alert_channels: Option<Vec<NotificationChannel>>,
    settle_timeout: Duration,
}

impl<S: ModerationStore> ModerationService<S> {
    pub fn new(store: S, classifiers: ClassifierRegistry, notifier: NotificationDispatcher) -> Self {
        Self {
            store,
            classifiers,
            notifier,
            alert_channels: None,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    /// Bound the wait on a concurrent submission of the same content.
    /// Classification time dominates, so this usually tracks the HTTP timeout.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Restrict alerts to a subset of channels.
    pub fn with_alert_channels(mut self, channels: Option<Vec<NotificationChannel>>) -> Self {
        self.alert_channels = channels.filter(|c| !c.is_empty());
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.classifiers.names()
    }

    pub async fn submit_text(
        &self,
        submitter: &str,
        text: &str,
        provider: Option<&str>,
    ) -> Result<RequestView, ModerationError> {
        self.submit(submitter, Submission::Text(text), provider)
            .await
    }

    pub async fn submit_image(
        &self,
        submitter: &str,
        encoded_image: &str,
        provider: Option<&str>,
    ) -> Result<RequestView, ModerationError> {
        self.submit(submitter, Submission::Image(encoded_image), provider)
            .await
    }

    /// The stored result for a request, if classification succeeded.
    pub async fn get_result(&self, request_id: i64) -> Result<Option<ResultView>, ModerationError> {
        let Some(result) = self.store.get_result(request_id).await? else {
            return Ok(None);
        };
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(StoreError::NotFound(request_id))?;

        Ok(Some(ResultView {
            request_id: result.request_id,
            classification: result.classification,
            confidence: result.confidence,
            reasoning: result.reasoning,
            provider: result.provider,
            created_at: request.created_at,
        }))
    }

    pub async fn notification_logs(
        &self,
        request_id: i64,
    ) -> Result<Vec<NotificationLog>, ModerationError> {
        Ok(self.store.notification_logs_for(request_id).await?)
    }

    async fn submit(
        &self,
        submitter: &str,
        content: Submission<'_>,
        provider: Option<&str>,
    ) -> Result<RequestView, ModerationError> {
        let content_hash = fingerprint(content.body());

        // Known content is answered from the existing row. A terminal row is
        // never retried; a pending one belongs to an in-flight submission.
        if let Some(existing) = self.store.find_request_by_fingerprint(&content_hash).await? {
            tracing::debug!(
                request_id = existing.id,
                status = %existing.status,
                "Duplicate content, returning existing request"
            );
            return self.settled_view(existing).await;
        }

        let new_request = NewModerationRequest {
            submitter: submitter.to_string(),
            kind: content.kind(),
            fingerprint: content_hash.clone(),
        };
        let request = match self.store.create_request(new_request).await {
            Ok(request) => request,
            // Lost a race with an identical submission: the winner's row is the answer.
            Err(StoreError::Duplicate(_)) => {
                tracing::debug!("Fingerprint claimed concurrently, reading winning request");
                let winner = self
                    .store
                    .find_request_by_fingerprint(&content_hash)
                    .await?
                    .ok_or_else(|| StoreError::Duplicate(content_hash.clone()))?;
                return self.settled_view(winner).await;
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            request_id = request.id,
            kind = %request.kind,
            "Moderation request created"
        );

        let classified = match content {
            Submission::Text(text) => self.classifiers.analyze_text(text, provider).await,
            Submission::Image(image) => self.classifiers.analyze_image(image, provider).await,
        };

        let ProviderOutcome { provider, outcome } = match classified {
            Ok(classified) => classified,
            Err(e) => {
                tracing::error!(request_id = request.id, "Classification failed: {}", e);
                self.mark_failed(request.id).await;
                return Err(e.into());
            }
        };

        let stored = self
            .store
            .create_result(NewModerationResult {
                request_id: request.id,
                classification: outcome.classification,
                confidence: outcome.confidence,
                reasoning: outcome.reasoning.clone(),
                provider: provider.clone(),
                raw_response: outcome.raw.clone(),
            })
            .await;
        if let Err(e) = stored {
            tracing::error!(request_id = request.id, "Failed to store result: {}", e);
            self.mark_failed(request.id).await;
            return Err(e.into());
        }

        tracing::info!(
            request_id = request.id,
            provider = %provider,
            classification = %outcome.classification,
            confidence = outcome.confidence,
            "Moderation request completed"
        );

        if outcome.classification.is_flagged() {
            self.alert(&request, &outcome).await;
        }

        let current = self
            .store
            .find_request(request.id)
            .await?
            .ok_or(StoreError::NotFound(request.id))?;
        Ok(current.view())
    }

    /// Re-read a request until it leaves `pending` or the settle timeout passes.
    ///
    /// Past the deadline the pending view is returned as-is; the row may belong
    /// to a submission that died mid-flight.
    async fn settled_view(
        &self,
        request: ModerationRequest,
    ) -> Result<RequestView, ModerationError> {
        let deadline = Instant::now() + self.settle_timeout;
        let mut current = request;

        while !current.status.is_terminal() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    request_id = current.id,
                    "Request still pending after settle timeout"
                );
                break;
            }
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
            current = self
                .store
                .find_request(current.id)
                .await?
                .ok_or(StoreError::NotFound(current.id))?;
        }

        Ok(current.view())
    }

    /// Best effort: the caller is already returning the original error.
    async fn mark_failed(&self, request_id: i64) {
        if let Err(e) = self
            .store
            .update_request_status(request_id, ContentStatus::Failed)
            .await
        {
            tracing::error!(request_id, "Failed to mark request as failed: {}", e);
        }
    }

    /// Send the alert and log one row per channel outcome.
    /// Delivery problems never change the request's status.
    async fn alert(&self, request: &ModerationRequest, outcome: &ClassificationOutcome) {
        let alert = ModerationAlert {
            submitter: request.submitter.clone(),
            kind: request.kind,
            classification: outcome.classification,
            confidence: outcome.confidence,
            reasoning: outcome.reasoning.clone(),
        };

        let deliveries = self
            .notifier
            .send_moderation_alert(&alert, self.alert_channels.as_deref())
            .await;

        for (channel, delivery) in deliveries {
            if let Err(e) = self
                .store
                .create_notification_log(request.id, channel, delivery.status.as_str())
                .await
            {
                tracing::warn!(
                    request_id = request.id,
                    channel = %channel,
                    "Failed to log notification attempt: {}",
                    e
                );
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classification::Classifier;
    use crate::core::moderation::{
        Classification, ModerationResult, NewModerationResult as NewResult, RequestRecord,
    };
    use crate::core::notifications::{DeliveryOutcome, Notifier, NotifyError};
    use crate::infra::moderation::InMemoryModerationStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Classifier with a canned answer that counts its calls.
    struct StubClassifier {
        answer: Result<(Classification, f64, &'static str), &'static str>,
        text_calls: AtomicUsize,
        image_calls: AtomicUsize,
    }

    impl StubClassifier {
        fn answering(classification: Classification, confidence: f64, reasoning: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok((classification, confidence, reasoning)),
                text_calls: AtomicUsize::new(0),
                image_calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(message),
                text_calls: AtomicUsize::new(0),
                image_calls: AtomicUsize::new(0),
            })
        }

        fn answer(&self) -> Result<ClassificationOutcome, ClassifierError> {
            match self.answer {
                Ok((classification, confidence, reasoning)) => Ok(ClassificationOutcome {
                    classification,
                    confidence,
                    reasoning: reasoning.to_string(),
                    raw: json!({"classification": classification.as_str()}),
                }),
                Err(message) => Err(ClassifierError::Transport(message.to_string())),
            }
        }
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn analyze_text(&self, _text: &str) -> Result<ClassificationOutcome, ClassifierError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            self.answer()
        }

        async fn analyze_image(
            &self,
            _encoded_image: &str,
        ) -> Result<ClassificationOutcome, ClassifierError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            self.answer()
        }
    }

    struct StubNotifier {
        channel: NotificationChannel,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubNotifier {
        fn new(channel: NotificationChannel, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                channel,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Notifier for StubNotifier {
        fn channel(&self) -> NotificationChannel {
            self.channel
        }

        async fn send(
            &self,
            _message: &str,
            _recipient: Option<&str>,
        ) -> Result<DeliveryOutcome, NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::Transport("webhook unreachable".to_string()))
            } else {
                Ok(DeliveryOutcome::success(self.channel, "sent"))
            }
        }
    }

    type TestService = ModerationService<Arc<InMemoryModerationStore>>;

    fn service_with(
        classifier: Arc<StubClassifier>,
        notifiers: Vec<Arc<StubNotifier>>,
    ) -> (TestService, Arc<InMemoryModerationStore>) {
        let store = Arc::new(InMemoryModerationStore::new());
        let classifiers = ClassifierRegistry::new().with("stub", classifier);
        let mut dispatcher = NotificationDispatcher::new();
        for notifier in notifiers {
            dispatcher.register(notifier);
        }
        (
            ModerationService::new(store.clone(), classifiers, dispatcher),
            store,
        )
    }

    fn both_channels() -> Vec<Arc<StubNotifier>> {
        vec![
            StubNotifier::new(NotificationChannel::Slack, false),
            StubNotifier::new(NotificationChannel::Email, false),
        ]
    }

    #[tokio::test]
    async fn test_resubmission_returns_same_request() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.99, "benign");
        let (service, store) = service_with(classifier.clone(), vec![]);

        let first = service.submit_text("u@x.com", "same content", None).await.unwrap();
        let second = service.submit_text("u@x.com", "same content", None).await.unwrap();

        assert_eq!(first.request_id, second.request_id);
        assert_eq!(store.count_requests().await.unwrap(), 1);
        assert_eq!(classifier.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dedup_ignores_submitter() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.99, "benign");
        let (service, store) = service_with(classifier, vec![]);

        let alice = service.submit_text("alice@x.com", "hello there", None).await.unwrap();
        let bob = service.submit_text("bob@x.com", "hello there", None).await.unwrap();

        assert_eq!(alice.request_id, bob.request_id);
        // The stored submitter is whoever got there first.
        assert_eq!(bob.submitter, "alice@x.com");
        assert_eq!(store.count_requests().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_spam_is_completed_stored_and_alerted() {
        let classifier = StubClassifier::answering(Classification::Spam, 0.9, "promotional language");
        let notifiers = both_channels();
        let (service, store) = service_with(classifier, notifiers.clone());

        let view = service
            .submit_text("spammer@x.com", "buy cheap watches now", None)
            .await
            .unwrap();

        assert_eq!(view.status, ContentStatus::Completed);
        assert_eq!(view.kind, ContentKind::Text);

        let result = store.get_result(view.request_id).await.unwrap().unwrap();
        assert_eq!(result.classification, Classification::Spam);
        assert_eq!(result.provider, "stub");
        assert_eq!(result.raw_response, json!({"classification": "spam"}));

        let logs = store.notification_logs_for(view.request_id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.status == "success"));
        for notifier in notifiers {
            assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_safe_content_sends_no_alert() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.95, "benign");
        let notifiers = both_channels();
        let (service, store) = service_with(classifier, notifiers.clone());

        let view = service.submit_text("u@x.com", "good morning", None).await.unwrap();

        assert_eq!(view.status, ContentStatus::Completed);
        assert!(store.notification_logs_for(view.request_id).await.unwrap().is_empty());
        assert!(notifiers.iter().all(|n| n.calls.load(Ordering::SeqCst) == 0));
    }

    #[tokio::test]
    async fn test_failed_channel_is_logged_and_others_still_sent() {
        let classifier = StubClassifier::answering(Classification::Toxic, 0.8, "insults");
        let slack = StubNotifier::new(NotificationChannel::Slack, true);
        let email = StubNotifier::new(NotificationChannel::Email, false);
        let (service, store) = service_with(classifier, vec![slack, email.clone()]);

        let view = service.submit_text("u@x.com", "you are awful", None).await.unwrap();

        assert_eq!(view.status, ContentStatus::Completed);
        assert_eq!(email.calls.load(Ordering::SeqCst), 1);

        let logs = store.notification_logs_for(view.request_id).await.unwrap();
        assert_eq!(logs.len(), 2);
        let slack_log = logs.iter().find(|l| l.channel == NotificationChannel::Slack).unwrap();
        let email_log = logs.iter().find(|l| l.channel == NotificationChannel::Email).unwrap();
        assert_eq!(slack_log.status, "failed");
        assert_eq!(email_log.status, "success");
    }

    #[tokio::test]
    async fn test_alert_channel_subset_logs_unconfigured_channel() {
        let classifier = StubClassifier::answering(Classification::Harassment, 0.7, "threats");
        let slack = StubNotifier::new(NotificationChannel::Slack, false);
        let (service, store) = service_with(classifier, vec![slack.clone()]);
        let service = service.with_alert_channels(Some(vec![NotificationChannel::Email]));

        let view = service.submit_text("u@x.com", "watch your back", None).await.unwrap();

        let logs = store.notification_logs_for(view.request_id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].channel, NotificationChannel::Email);
        assert_eq!(logs[0].status, "failed");
        assert_eq!(slack.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transport_error_fails_request_permanently() {
        let classifier = StubClassifier::failing("HTTP 503");
        let notifiers = both_channels();
        let (service, store) = service_with(classifier.clone(), notifiers.clone());

        let err = service
            .submit_text("u@x.com", "anything", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModerationError::Classification(ClassifierError::Transport(_))
        ));

        let records = store.requests_for("u@x.com").await.unwrap();
        assert_eq!(records.len(), 1);
        let request = &records[0].request;
        assert_eq!(request.status, ContentStatus::Failed);
        assert!(store.get_result(request.id).await.unwrap().is_none());
        assert!(store.notification_logs_for(request.id).await.unwrap().is_empty());

        // No automatic retry: the failed row is returned as-is.
        let again = service.submit_text("u@x.com", "anything", None).await.unwrap();
        assert_eq!(again.request_id, request.id);
        assert_eq!(again.status, ContentStatus::Failed);
        assert_eq!(classifier.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_providers_is_config_error() {
        let store = Arc::new(InMemoryModerationStore::new());
        let service = ModerationService::new(
            store.clone(),
            ClassifierRegistry::new(),
            NotificationDispatcher::new(),
        );

        let err = service.submit_text("u@x.com", "hi", None).await.unwrap_err();
        assert!(matches!(err, ModerationError::Config(_)));

        let records = store.requests_for("u@x.com").await.unwrap();
        assert_eq!(records[0].request.status, ContentStatus::Failed);
    }

    #[tokio::test]
    async fn test_image_uses_image_analysis() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.9, "landscape");
        let (service, _store) = service_with(classifier.clone(), vec![]);

        let view = service.submit_image("u@x.com", "aGVsbG8=", None).await.unwrap();

        assert_eq!(view.kind, ContentKind::Image);
        assert_eq!(classifier.image_calls.load(Ordering::SeqCst), 1);
        assert_eq!(classifier.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_and_image_share_fingerprints() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.9, "fine");
        let (service, _store) = service_with(classifier, vec![]);

        let image = service.submit_image("u@x.com", "aGVsbG8=", None).await.unwrap();
        let text = service.submit_text("u@x.com", "aGVsbG8=", None).await.unwrap();

        assert_eq!(image.request_id, text.request_id);
        assert_eq!(text.kind, ContentKind::Image);
    }

    #[tokio::test]
    async fn test_result_round_trip() {
        let classifier = StubClassifier::answering(Classification::Spam, 0.9, "promotional language");
        let (service, _store) = service_with(classifier, vec![]);

        let view = service
            .submit_text("u@x.com", "buy cheap watches now", None)
            .await
            .unwrap();
        let result = service.get_result(view.request_id).await.unwrap().unwrap();

        assert_eq!(result.request_id, view.request_id);
        assert_eq!(result.classification, Classification::Spam);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.reasoning, "promotional language");
        assert_eq!(result.provider, "stub");
        assert_eq!(result.created_at, view.created_at);
    }

    #[tokio::test]
    async fn test_unknown_result_is_none() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.9, "fine");
        let (service, _store) = service_with(classifier, vec![]);

        assert!(service.get_result(4242).await.unwrap().is_none());
    }

    /// Lookups by fingerprint yield after reading, so two concurrent
    /// submissions both miss and race on `create_request`.
    struct RacyStore {
        inner: InMemoryModerationStore,
    }

    #[async_trait]
    impl ModerationStore for RacyStore {
        async fn find_request_by_fingerprint(
            &self,
            fingerprint: &str,
        ) -> Result<Option<ModerationRequest>, StoreError> {
            let found = self.inner.find_request_by_fingerprint(fingerprint).await;
            tokio::task::yield_now().await;
            found
        }

        async fn find_request(&self, id: i64) -> Result<Option<ModerationRequest>, StoreError> {
            self.inner.find_request(id).await
        }

        async fn create_request(
            &self,
            request: NewModerationRequest,
        ) -> Result<ModerationRequest, StoreError> {
            self.inner.create_request(request).await
        }

        async fn update_request_status(
            &self,
            id: i64,
            status: ContentStatus,
        ) -> Result<(), StoreError> {
            self.inner.update_request_status(id, status).await
        }

        async fn create_result(&self, result: NewResult) -> Result<ModerationResult, StoreError> {
            self.inner.create_result(result).await
        }

        async fn get_result(&self, request_id: i64) -> Result<Option<ModerationResult>, StoreError> {
            self.inner.get_result(request_id).await
        }

        async fn create_notification_log(
            &self,
            request_id: i64,
            channel: NotificationChannel,
            status: &str,
        ) -> Result<NotificationLog, StoreError> {
            self.inner
                .create_notification_log(request_id, channel, status)
                .await
        }

        async fn notification_logs_for(
            &self,
            request_id: i64,
        ) -> Result<Vec<NotificationLog>, StoreError> {
            self.inner.notification_logs_for(request_id).await
        }

        async fn requests_for(&self, submitter: &str) -> Result<Vec<RequestRecord>, StoreError> {
            self.inner.requests_for(submitter).await
        }

        async fn count_requests(&self) -> Result<u64, StoreError> {
            self.inner.count_requests().await
        }

        async fn count_requests_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
            self.inner.count_requests_since(since).await
        }

        async fn count_by_status(&self) -> Result<Vec<(ContentStatus, u64)>, StoreError> {
            self.inner.count_by_status().await
        }

        async fn count_by_classification(
            &self,
        ) -> Result<Vec<(Classification, u64)>, StoreError> {
            self.inner.count_by_classification().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_identical_submissions_share_one_request() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.9, "fine");
        let store = Arc::new(RacyStore {
            inner: InMemoryModerationStore::new(),
        });
        let service = ModerationService::new(
            store.clone(),
            ClassifierRegistry::new().with("stub", classifier.clone()),
            NotificationDispatcher::new(),
        );

        let (a, b) = tokio::join!(
            service.submit_text("a@x.com", "same", None),
            service.submit_text("b@x.com", "same", None)
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.request_id, b.request_id);
        assert_eq!(a.status, ContentStatus::Completed);
        assert_eq!(b.status, ContentStatus::Completed);
        assert_eq!(store.count_requests().await.unwrap(), 1);
        assert_eq!(classifier.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_never_leaves_request_pending() {
        let classifier = StubClassifier::answering(Classification::Toxic, 0.6, "rude");
        let (service, store) = service_with(classifier, both_channels());

        for text in ["one", "two", "three"] {
            let view = service.submit_text("u@x.com", text, None).await.unwrap();
            assert!(view.status.is_terminal());
        }

        let records = store.requests_for("u@x.com").await.unwrap();
        assert!(records.iter().all(|r| r.request.status.is_terminal()));
    }

    #[tokio::test]
    async fn test_pending_duplicate_waits_for_in_flight_request() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.9, "fine");
        let (service, store) = service_with(classifier.clone(), vec![]);

        // Another submission owns this content and is still classifying.
        let in_flight = store
            .create_request(NewModerationRequest {
                submitter: "first@x.com".to_string(),
                kind: ContentKind::Text,
                fingerprint: fingerprint("slow content"),
            })
            .await
            .unwrap();
        let finisher = {
            let store = store.clone();
            let request_id = in_flight.id;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                store
                    .create_result(NewResult {
                        request_id,
                        classification: Classification::Safe,
                        confidence: 0.9,
                        reasoning: "fine".to_string(),
                        provider: "stub".to_string(),
                        raw_response: json!({}),
                    })
                    .await
                    .unwrap();
            })
        };

        let view = service
            .submit_text("second@x.com", "slow content", None)
            .await
            .unwrap();
        finisher.await.unwrap();

        assert_eq!(view.request_id, in_flight.id);
        assert_eq!(view.status, ContentStatus::Completed);
        assert_eq!(classifier.text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_abandoned_pending_request_is_returned_after_timeout() {
        let classifier = StubClassifier::answering(Classification::Safe, 0.9, "fine");
        let (service, store) = service_with(classifier.clone(), vec![]);
        let service = service.with_settle_timeout(Duration::from_millis(100));

        let abandoned = store
            .create_request(NewModerationRequest {
                submitter: "gone@x.com".to_string(),
                kind: ContentKind::Text,
                fingerprint: fingerprint("orphan"),
            })
            .await
            .unwrap();

        let view = service.submit_text("u@x.com", "orphan", None).await.unwrap();

        assert_eq!(view.request_id, abandoned.id);
        assert_eq!(view.status, ContentStatus::Pending);
        assert_eq!(classifier.text_calls.load(Ordering::SeqCst), 0);
    }
}

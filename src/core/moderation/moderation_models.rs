// Moderation domain models - requests, results and notification logs.
//
// These are pure domain types with no Discord or database dependencies.
// The store converts them to rows, the Discord layer converts them to embeds.

use crate::core::notifications::NotificationChannel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of content was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentKind::Text),
            "image" => Ok(ContentKind::Image),
            other => Err(format!("unknown content kind '{other}'")),
        }
    }
}

/// Lifecycle of a moderation request.
///
/// `Pending` moves exactly once to `Completed` or `Failed`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Completed,
    Failed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Completed => "completed",
            ContentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContentStatus::Pending)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContentStatus::Pending),
            "completed" => Ok(ContentStatus::Completed),
            "failed" => Ok(ContentStatus::Failed),
            other => Err(format!("unknown content status '{other}'")),
        }
    }
}

/// Standardized classification labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Toxic,
    Spam,
    Harassment,
    Safe,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Toxic,
        Classification::Spam,
        Classification::Harassment,
        Classification::Safe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Toxic => "toxic",
            Classification::Spam => "spam",
            Classification::Harassment => "harassment",
            Classification::Safe => "safe",
        }
    }

    /// Anything other than `Safe` triggers an alert.
    pub fn is_flagged(&self) -> bool {
        !matches!(self, Classification::Safe)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown classification '{s}'"))
    }
}

/// One row per distinct content fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationRequest {
    pub id: i64,
    /// Free-form submitter identity (an email address in most deployments).
    pub submitter: String,
    pub kind: ContentKind,
    /// Hex SHA-256 of the submitted content. Unique across all requests.
    pub fingerprint: String,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
}

impl ModerationRequest {
    pub fn view(&self) -> RequestView {
        RequestView {
            request_id: self.id,
            submitter: self.submitter.clone(),
            kind: self.kind,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Fields the caller supplies when creating a request.
/// The store assigns the id, the `pending` status and the timestamp.
#[derive(Debug, Clone)]
pub struct NewModerationRequest {
    pub submitter: String,
    pub kind: ContentKind,
    pub fingerprint: String,
}

/// Result of a successful classification. Immutable once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationResult {
    pub id: i64,
    pub request_id: i64,
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
    pub provider: String,
    /// Full provider payload, kept for audit.
    pub raw_response: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewModerationResult {
    pub request_id: i64,
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
    pub provider: String,
    pub raw_response: serde_json::Value,
}

/// One attempted delivery on one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationLog {
    pub id: i64,
    pub request_id: i64,
    pub channel: NotificationChannel,
    pub status: String,
    pub sent_at: DateTime<Utc>,
}

/// What `submit_*` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestView {
    pub request_id: i64,
    pub submitter: String,
    pub kind: ContentKind,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
}

/// What `get_result` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub request_id: i64,
    pub classification: Classification,
    pub confidence: f64,
    pub reasoning: String,
    pub provider: String,
    /// Creation time of the owning request.
    pub created_at: DateTime<Utc>,
}

/// The parts of a result that analytics cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub classification: Classification,
    pub confidence: f64,
    pub provider: String,
}

/// A request joined with its (optional) result.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub request: ModerationRequest,
    pub result: Option<ResultSummary>,
}

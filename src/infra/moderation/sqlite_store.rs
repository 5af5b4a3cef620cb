// SQLite-backed moderation store.
//
// Tables:
// - moderation_requests: One row per distinct content fingerprint
// - moderation_results: At most one classification per request
// - notification_logs: One row per attempted alert delivery
//
// Timestamps are fixed-width RFC 3339 UTC strings, so ordering and range
// filters can compare them as text.

use crate::core::moderation::{
    Classification, ContentStatus, ModerationRequest, ModerationResult,
    ModerationStore, NewModerationRequest, NewModerationResult, NotificationLog, RequestRecord,
    ResultSummary, StoreError,
};
use crate::core::notifications::NotificationChannel;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub struct SqliteModerationStore {
    pool: Pool<Sqlite>,
}

impl SqliteModerationStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS moderation_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_email TEXT NOT NULL,
                content_type TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_moderation_requests_user
                ON moderation_requests(user_email);
            CREATE INDEX IF NOT EXISTS idx_moderation_requests_created
                ON moderation_requests(created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS moderation_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id INTEGER NOT NULL UNIQUE REFERENCES moderation_requests(id),
                classification TEXT NOT NULL,
                confidence REAL NOT NULL,
                reasoning TEXT NOT NULL,
                llm_provider TEXT NOT NULL,
                llm_response TEXT NOT NULL DEFAULT 'null'
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notification_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id INTEGER NOT NULL REFERENCES moderation_requests(id),
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                sent_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notification_logs_request
                ON notification_logs(request_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Distinguishes a missing request from one that already left `pending`.
    async fn not_pending_error(&self, id: i64) -> StoreError {
        match self.find_request(id).await {
            Ok(Some(_)) => StoreError::NotPending(id),
            Ok(None) => StoreError::NotFound(id),
            Err(e) => e,
        }
    }
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn storage(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Store clock, truncated to what the text format can hold.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Storage(format!("bad timestamp '{raw}': {e}")))
}

fn parse_column<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
    raw.parse::<T>().map_err(StoreError::Storage)
}

const REQUEST_COLUMNS: &str = "id, user_email, content_type, content_hash, status, created_at";

fn request_from_row(row: &SqliteRow) -> Result<ModerationRequest, StoreError> {
    Ok(ModerationRequest {
        id: row.get("id"),
        submitter: row.get("user_email"),
        kind: parse_column(row.get::<&str, _>("content_type"))?,
        fingerprint: row.get("content_hash"),
        status: parse_column(row.get::<&str, _>("status"))?,
        created_at: parse_timestamp(row.get::<&str, _>("created_at"))?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<NotificationLog, StoreError> {
    Ok(NotificationLog {
        id: row.get("id"),
        request_id: row.get("request_id"),
        channel: parse_column(row.get::<&str, _>("channel"))?,
        status: row.get("status"),
        sent_at: parse_timestamp(row.get::<&str, _>("sent_at"))?,
    })
}

#[async_trait]
impl ModerationStore for SqliteModerationStore {
    async fn find_request_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ModerationRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM moderation_requests WHERE content_hash = ?"
        ))
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn find_request(&self, id: i64) -> Result<Option<ModerationRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM moderation_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn create_request(
        &self,
        request: NewModerationRequest,
    ) -> Result<ModerationRequest, StoreError> {
        let created_at = now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO moderation_requests (user_email, content_type, content_hash, status, created_at)
            VALUES (?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(&request.submitter)
        .bind(request.kind.as_str())
        .bind(&request.fingerprint)
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(request.fingerprint.clone())
            } else {
                storage(e)
            }
        })?;

        Ok(ModerationRequest {
            id: inserted.last_insert_rowid(),
            submitter: request.submitter,
            kind: request.kind,
            fingerprint: request.fingerprint,
            status: ContentStatus::Pending,
            created_at,
        })
    }

    async fn update_request_status(
        &self,
        id: i64,
        status: ContentStatus,
    ) -> Result<(), StoreError> {
        // Terminal states are never overwritten.
        let updated = sqlx::query(
            "UPDATE moderation_requests SET status = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 0 {
            return Err(self.not_pending_error(id).await);
        }
        Ok(())
    }

    async fn create_result(
        &self,
        result: NewModerationResult,
    ) -> Result<ModerationResult, StoreError> {
        let raw = serde_json::to_string(&result.raw_response)
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let updated = sqlx::query(
            "UPDATE moderation_requests SET status = 'completed' WHERE id = ? AND status = 'pending'",
        )
        .bind(result.request_id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(storage)?;
            return Err(self.not_pending_error(result.request_id).await);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO moderation_results
                (request_id, classification, confidence, reasoning, llm_provider, llm_response)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.request_id)
        .bind(result.classification.as_str())
        .bind(result.confidence)
        .bind(&result.reasoning)
        .bind(&result.provider)
        .bind(&raw)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        Ok(ModerationResult {
            id: inserted.last_insert_rowid(),
            request_id: result.request_id,
            classification: result.classification,
            confidence: result.confidence,
            reasoning: result.reasoning,
            provider: result.provider,
            raw_response: result.raw_response,
        })
    }

    async fn get_result(&self, request_id: i64) -> Result<Option<ModerationResult>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, request_id, classification, confidence, reasoning, llm_provider, llm_response
            FROM moderation_results
            WHERE request_id = ?
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get("llm_response");
        Ok(Some(ModerationResult {
            id: row.get("id"),
            request_id: row.get("request_id"),
            classification: parse_column(row.get::<&str, _>("classification"))?,
            confidence: row.get("confidence"),
            reasoning: row.get("reasoning"),
            provider: row.get("llm_provider"),
            raw_response: serde_json::from_str(&raw)
                .map_err(|e| StoreError::Storage(e.to_string()))?,
        }))
    }

    async fn create_notification_log(
        &self,
        request_id: i64,
        channel: NotificationChannel,
        status: &str,
    ) -> Result<NotificationLog, StoreError> {
        let sent_at = now();

        let inserted = sqlx::query(
            "INSERT INTO notification_logs (request_id, channel, status, sent_at) VALUES (?, ?, ?, ?)",
        )
        .bind(request_id)
        .bind(channel.as_str())
        .bind(status)
        .bind(format_timestamp(sent_at))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(NotificationLog {
            id: inserted.last_insert_rowid(),
            request_id,
            channel,
            status: status.to_string(),
            sent_at,
        })
    }

    async fn notification_logs_for(
        &self,
        request_id: i64,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, request_id, channel, status, sent_at
            FROM notification_logs
            WHERE request_id = ?
            ORDER BY id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(log_from_row).collect()
    }

    async fn requests_for(&self, submitter: &str) -> Result<Vec<RequestRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.user_email, r.content_type, r.content_hash, r.status, r.created_at,
                   res.classification, res.confidence, res.llm_provider
            FROM moderation_requests r
            LEFT JOIN moderation_results res ON res.request_id = r.id
            WHERE r.user_email = ?
            ORDER BY r.created_at DESC, r.id DESC
            "#,
        )
        .bind(submitter)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let request = request_from_row(&row)?;
            let result = match row.get::<Option<&str>, _>("classification") {
                Some(label) => Some(ResultSummary {
                    classification: parse_column(label)?,
                    confidence: row.get("confidence"),
                    provider: row.get("llm_provider"),
                }),
                None => None,
            };
            records.push(RequestRecord { request, result });
        }
        Ok(records)
    }

    async fn count_requests(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) FROM moderation_requests")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn count_requests_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) FROM moderation_requests WHERE created_at >= ?")
            .bind(format_timestamp(since))
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.get::<i64, _>(0) as u64)
    }

    async fn count_by_status(&self) -> Result<Vec<(ContentStatus, u64)>, StoreError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM moderation_requests GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let status = parse_column::<ContentStatus>(row.get::<&str, _>("status"))?;
                Ok((status, row.get::<i64, _>("n") as u64))
            })
            .collect()
    }

    async fn count_by_classification(&self) -> Result<Vec<(Classification, u64)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT classification, COUNT(*) AS n
            FROM moderation_results
            GROUP BY classification
            ORDER BY classification
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let label = parse_column::<Classification>(row.get::<&str, _>("classification"))?;
                Ok((label, row.get::<i64, _>("n") as u64))
            })
            .collect()
    }
}

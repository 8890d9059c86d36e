//! Trace storage.
//!
//! `TraceStore` is the read/write contract the chat pipeline and analytics
//! need. `PgTraceStore` backs the service; `MemoryTraceStore` backs tests and
//! local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracedesk_core::{Category, NewTrace, Trace};
use uuid::Uuid;

#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Assign id and timestamp, then write every field in one step.
    async fn create(&self, new: NewTrace) -> Result<Trace, sqlx::Error>;

    /// Traces newest first, optionally restricted to one category.
    async fn list(&self, category: Option<Category>) -> Result<Vec<Trace>, sqlx::Error>;

    async fn count(&self, category: Option<Category>) -> Result<i64, sqlx::Error>;

    /// Mean `response_time_ms`, or `None` when there are no matching traces.
    async fn average_response_time(
        &self,
        category: Option<Category>,
    ) -> Result<Option<f64>, sqlx::Error>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgTraceStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TraceRow {
    id: Uuid,
    user_message: String,
    bot_response: String,
    category: String,
    timestamp: DateTime<Utc>,
    response_time_ms: i64,
}

impl From<TraceRow> for Trace {
    fn from(row: TraceRow) -> Self {
        let category = row.category.parse().unwrap_or_else(|_| {
            tracing::warn!(id = %row.id, category = %row.category, "Stored trace has unknown category");
            Category::FALLBACK
        });

        Trace {
            id: row.id,
            user_message: row.user_message,
            bot_response: row.bot_response,
            category,
            timestamp: row.timestamp,
            response_time_ms: row.response_time_ms,
        }
    }
}

impl PgTraceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TraceStore for PgTraceStore {
    async fn create(&self, new: NewTrace) -> Result<Trace, sqlx::Error> {
        let trace = Trace::new(new);

        sqlx::query(
            r#"
            INSERT INTO traces (id, user_message, bot_response, category, timestamp, response_time_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(trace.id)
        .bind(&trace.user_message)
        .bind(&trace.bot_response)
        .bind(trace.category.as_str())
        .bind(trace.timestamp)
        .bind(trace.response_time_ms)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            trace_id = %trace.id,
            category = %trace.category,
            response_time_ms = trace.response_time_ms,
            "Stored trace"
        );

        Ok(trace)
    }

    async fn list(&self, category: Option<Category>) -> Result<Vec<Trace>, sqlx::Error> {
        let rows: Vec<TraceRow> = sqlx::query_as(
            "SELECT id, user_message, bot_response, category, timestamp, response_time_ms
             FROM traces
             WHERE $1::text IS NULL OR category = $1
             ORDER BY timestamp DESC",
        )
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Trace::from).collect())
    }

    async fn count(&self, category: Option<Category>) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM traces WHERE $1::text IS NULL OR category = $1")
                .bind(category.map(|c| c.as_str()))
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn average_response_time(
        &self,
        category: Option<Category>,
    ) -> Result<Option<f64>, sqlx::Error> {
        let row: (Option<f64>,) = sqlx::query_as(
            "SELECT AVG(response_time_ms)::float8 FROM traces WHERE $1::text IS NULL OR category = $1",
        )
        .bind(category.map(|c| c.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryTraceStore {
    traces: RwLock<Vec<Trace>>,
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already-built trace as-is.
    pub async fn insert(&self, trace: Trace) {
        self.traces.write().await.push(trace);
    }

    fn matches(trace: &Trace, category: Option<Category>) -> bool {
        category.map_or(true, |c| trace.category == c)
    }
}

#[async_trait]
impl TraceStore for MemoryTraceStore {
    async fn create(&self, new: NewTrace) -> Result<Trace, sqlx::Error> {
        let trace = Trace::new(new);
        self.traces.write().await.push(trace.clone());
        Ok(trace)
    }

    async fn list(&self, category: Option<Category>) -> Result<Vec<Trace>, sqlx::Error> {
        let mut traces: Vec<Trace> = self
            .traces
            .read()
            .await
            .iter()
            .filter(|t| Self::matches(t, category))
            .cloned()
            .collect();
        traces.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(traces)
    }

    async fn count(&self, category: Option<Category>) -> Result<i64, sqlx::Error> {
        let traces = self.traces.read().await;
        Ok(traces.iter().filter(|t| Self::matches(t, category)).count() as i64)
    }

    async fn average_response_time(
        &self,
        category: Option<Category>,
    ) -> Result<Option<f64>, sqlx::Error> {
        let traces = self.traces.read().await;
        let times: Vec<i64> = traces
            .iter()
            .filter(|t| Self::matches(t, category))
            .map(|t| t.response_time_ms)
            .collect();

        if times.is_empty() {
            return Ok(None);
        }
        Ok(Some(times.iter().sum::<i64>() as f64 / times.len() as f64))
    }
}

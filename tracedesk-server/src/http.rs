//! Tracedesk HTTP REST API
//!
//! Axum-based HTTP server for chat, trace listing and analytics.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`. The inner functions are
//! directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - POST /chat/      : generate a reply, classify it, store the trace
//! - GET  /traces/    : list traces, newest first, optional `?category=`
//! - GET  /analytics/ : totals, per-category breakdown, mean latency
//! - GET  /health     : health check with DB status
//! - GET  /version    : server version info

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracedesk_core::config::HttpConfig;
use tracedesk_core::Category;

use crate::subsystems::analytics;
use crate::subsystems::chat::{ChatError, ChatService};
use crate::subsystems::store::TraceStore;

const USER_MESSAGE_FIELD: &str = "user_message";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub chat: ChatService,
    /// Present when traces live in PostgreSQL; used by `/health`.
    pub pool: Option<PgPool>,
    pub http: HttpConfig,
}

impl HttpState {
    pub fn store(&self) -> &dyn TraceStore {
        self.chat.store().as_ref()
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = cors_layer(&state.http.cors_origins);

    Router::new()
        .route("/chat/", post(chat_handler))
        .route("/chat", post(chat_handler))
        .route("/traces/", get(traces_handler))
        .route("/traces", get(traces_handler))
        .route("/analytics/", get(analytics_handler))
        .route("/analytics", get(analytics_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.http.host, state.http.port);

    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Tracedesk HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

/// CORS for the dashboard. No configured origins means any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

// ============================================================================
// Request DTOs and validation
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct TraceQuery {
    pub category: Option<String>,
}

/// Pull a usable `user_message` out of a chat request body.
///
/// Errors are field-keyed lists of messages, e.g.
/// `{"user_message": ["This field is required."]}`.
pub fn validate_chat_request(body: &serde_json::Value) -> Result<String, serde_json::Value> {
    let Some(fields) = body.as_object() else {
        return Err(serde_json::json!({
            "non_field_errors": ["Invalid data. Expected a JSON object."],
        }));
    };

    let message = match fields.get(USER_MESSAGE_FIELD) {
        None | Some(serde_json::Value::Null) => Err("This field is required."),
        Some(serde_json::Value::String(message)) => Ok(message.clone()),
        // Numbers are accepted as their text form.
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err("Not a valid string."),
    };

    let problem = match message {
        Ok(message) if !message.trim().is_empty() => return Ok(message.trim().to_string()),
        Ok(_) => "This field may not be blank.",
        Err(problem) => problem,
    };

    Err(serde_json::json!({ USER_MESSAGE_FIELD: [problem] }))
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": msg.into(),
        "status": "error",
    })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner chat: validates, runs the chat pipeline, returns the stored trace.
pub async fn chat_inner(
    chat: &ChatService,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let user_message = match validate_chat_request(&body) {
        Ok(m) => m,
        Err(errors) => return (StatusCode::BAD_REQUEST, errors),
    };

    match chat.handle_message(&user_message).await {
        Ok(trace) => match serde_json::to_value(&trace) {
            Ok(json) => (StatusCode::CREATED, json),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
        },
        Err(e @ ChatError::Generation(_)) => {
            tracing::error!(error = %e, "Chat generation failed, no trace stored");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Failed to generate a response"),
            )
        }
        Err(e @ ChatError::Storage(_)) => {
            tracing::error!(error = %e, "Failed to store trace");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to store trace"))
        }
    }
}

/// Inner trace listing. An empty category is no filter; an unknown one
/// matches nothing.
pub async fn traces_inner(
    store: &dyn TraceStore,
    query: TraceQuery,
) -> (StatusCode, serde_json::Value) {
    let filter = match query.category.as_deref() {
        None | Some("") => None,
        Some(label) => match label.parse::<Category>() {
            Ok(category) => Some(category),
            Err(_) => return (StatusCode::OK, serde_json::json!([])),
        },
    };

    match store.list(filter).await {
        Ok(traces) => match serde_json::to_value(traces) {
            Ok(json) => (StatusCode::OK, json),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to list traces");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to list traces"))
        }
    }
}

/// Inner analytics: aggregates over every stored trace.
pub async fn analytics_inner(store: &dyn TraceStore) -> (StatusCode, serde_json::Value) {
    match analytics::compute_analytics(store).await {
        Ok(report) => match serde_json::to_value(report) {
            Ok(json) => (StatusCode::OK, json),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to compute analytics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Failed to compute analytics"),
            )
        }
    }
}

/// Inner health check: queries DB when there is one.
pub async fn health_inner(pool: Option<&PgPool>) -> (StatusCode, serde_json::Value) {
    let Some(pool) = pool else {
        return (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": "memory",
            }),
        );
    };

    match tracedesk_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": "postgresql",
                "postgresql": pg_ver,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "tracedesk",
    })
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(body)) => chat_inner(&state.chat, body).await,
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "detail": rejection.body_text() }),
        ),
    };
    (status, Json(body))
}

pub async fn traces_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<TraceQuery>,
) -> impl IntoResponse {
    let (status, body) = traces_inner(state.store(), query).await;
    (status, Json(body))
}

pub async fn analytics_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = analytics_inner(state.store()).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.pool.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

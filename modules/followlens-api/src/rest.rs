//! REST and WebSocket handlers over the scan pipeline.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use futures::SinkExt;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use followlens_scan::{AccountFilter, Job, ScanError, ScanTarget};

use crate::AppState;

const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/api/scan", post(api_scan_submit))
        .route("/api/scan/{job_id}/status", get(api_scan_status))
        .route("/api/scan/{job_id}", delete(api_scan_remove))
        .route("/api/scan/{job_id}/watch", get(api_scan_watch))
        .route("/api/accounts", get(api_accounts))
        .route("/api/accounts/top", get(api_accounts_top))
        .route("/api/accounts/search", get(api_accounts_search))
        .route("/api/accounts/{handle}", get(api_account_by_handle))
        .route("/api/categories", get(api_categories))
        .route("/api/statistics/overall", get(api_statistics_overall))
        .route("/api/statistics/categories", get(api_statistics_categories))
        .route("/api/statistics/engagement", get(api_statistics_engagement))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[derive(Deserialize, Default)]
pub struct ScanRequest {
    user_id: Option<String>,
    handle: Option<String>,
    #[serde(default)]
    force_refresh: bool,
}

fn error_response(err: &ScanError) -> Response {
    let status = match err {
        ScanError::Validation(_) => StatusCode::BAD_REQUEST,
        ScanError::HandleNotFound(_) => StatusCode::NOT_FOUND,
        ScanError::ScanInProgress(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(json!({ "error": err.to_string(), "origin": err.origin() })),
    )
        .into_response()
}

// --- Handlers ---

pub async fn api_scan_submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Response {
    let mut target = ScanTarget {
        user_id: req.user_id,
        handle: req.handle,
        force_refresh: req.force_refresh,
    };
    // Neither named: fall back to the configured default identity.
    if target.user_id.is_none() && target.handle.is_none() {
        target.user_id = state.default_user_id.clone();
    }

    match state.runner.submit(target).await {
        Ok(job) => (StatusCode::ACCEPTED, Json(job)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn api_scan_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    match state.runner.jobs().get(&job_id) {
        Some(job) => Json(job).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Remove a finished job record. A still-running job cannot be removed.
pub async fn api_scan_remove(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    let jobs = state.runner.jobs();
    match jobs.get(&job_id) {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(job) if !job.stage.is_terminal() => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "scan is still running" })),
        )
            .into_response(),
        Some(_) => {
            jobs.remove(&job_id);
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

/// Push job snapshots over a WebSocket whenever the record changes, then
/// close once a terminal snapshot has been sent.
pub async fn api_scan_watch(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.runner.jobs().get(&job_id).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| watch_job(socket, state, job_id))
}

async fn watch_job(mut socket: WebSocket, state: Arc<AppState>, job_id: String) {
    let mut last_sent: Option<chrono::DateTime<chrono::Utc>> = None;

    loop {
        let Some(job) = state.runner.jobs().get(&job_id) else {
            // Removed while being watched.
            break;
        };

        if last_sent != Some(job.updated_at) {
            last_sent = Some(job.updated_at);
            if !send_snapshot(&mut socket, &job).await {
                return;
            }
            if job.stage.is_terminal() {
                break;
            }
        }

        tokio::time::sleep(WATCH_POLL_INTERVAL).await;
    }

    let _ = socket.close().await;
}

async fn send_snapshot(socket: &mut WebSocket, job: &Job) -> bool {
    let payload = match serde_json::to_string(job) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(job_id = %job.job_id, error = %e, "Failed to serialize job snapshot");
            return false;
        }
    };
    if socket.send(Message::Text(payload.into())).await.is_err() {
        // Client went away; the scan itself is unaffected.
        return false;
    }
    true
}

#[derive(Deserialize, Default)]
pub struct AccountsQuery {
    category: Option<String>,
    #[serde(default)]
    verified_only: bool,
    min_followers: Option<u64>,
}

#[derive(Deserialize, Default)]
pub struct TopQuery {
    limit: Option<usize>,
    category: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    query: String,
}

pub async fn api_accounts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccountsQuery>,
) -> Response {
    let filter = AccountFilter {
        category: params.category,
        verified_only: params.verified_only,
        min_followers: params.min_followers,
    };
    match state.reader.filter(&filter).await {
        Ok(accounts) => Json(json!({
            "total": accounts.len(),
            "accounts": accounts,
            "category": filter.category,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load stored accounts");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_accounts_top(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    match state
        .reader
        .top_by_followers(limit, params.category.as_deref())
        .await
    {
        Ok(accounts) => Json(accounts).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to rank stored accounts");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_accounts_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let term = params.query.trim();
    if term.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "a non-empty search term is required" })),
        )
            .into_response();
    }
    match state.reader.search(term).await {
        Ok(accounts) => Json(accounts).into_response(),
        Err(e) => {
            warn!(error = %e, "Account search failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_account_by_handle(
    State(state): State<Arc<AppState>>,
    Path(handle): Path<String>,
) -> Response {
    let handle = handle.trim().trim_start_matches('@');
    match state.reader.by_handle(handle).await {
        Ok(Some(account)) => Json(account).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(error = %e, "Account lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_statistics_overall(State(state): State<Arc<AppState>>) -> Response {
    match state.stats.overall().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to compute overall statistics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_statistics_categories(State(state): State<Arc<AppState>>) -> Response {
    match state.stats.per_category().await {
        Ok(stats) => Json(json!({ "categories": stats })).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to compute category statistics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_statistics_engagement(State(state): State<Arc<AppState>>) -> Response {
    match state.stats.engagement().await {
        Ok(metrics) => Json(metrics).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to compute engagement metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_categories(State(state): State<Arc<AppState>>) -> Response {
    match state.store.fetch_taxonomy().await {
        Ok(Some(taxonomy)) => Json(taxonomy).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load taxonomy");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

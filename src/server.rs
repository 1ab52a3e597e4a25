//! HTTP status service for submitted batches.
//!
//! ## Endpoints
//!
//! - `POST /submit?mode=subdomain|reverse-ip`: body is newline-separated
//!   keys; returns `202` with the new job id
//! - `GET /status/{id}`: the job record
//! - `GET /result/{id}`: the sorted results as plain text, once completed
//! - `DELETE /delete/{id}`: remove a finished job and its files
//! - `GET /health`: liveness probe
//!
//! Each accepted submission runs in its own tokio task over the source set
//! the server was started with, writing to an append-mode [`FileSink`] and
//! tracking progress through the [`JobStore`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use subsift_core::{
    BatchConfig, BatchRunner, EngineConfig, FanoutAggregator, JobTracker, LookupMode,
    SharedSource, sources,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{SubsiftConfig, WriteMode};
use crate::error::{AppError, Result};
use crate::input::parse_keys;
use crate::jobs::{JobRecord, JobStatus, JobStore};
use crate::sink::FileSink;
use crate::sink::file::read_results;

/// Sources to query per lookup mode.
pub type SourceRegistry = HashMap<LookupMode, Vec<SharedSource>>;

/// Build the registry of every built-in source for both modes.
///
/// # Errors
///
/// Returns [`AppError::Core`] if a source's HTTP client cannot be built.
pub fn default_registry(engine: &EngineConfig) -> Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    for mode in [LookupMode::Subdomain, LookupMode::ReverseIp] {
        registry.insert(mode, sources::sources_for(mode, engine)?);
    }
    Ok(registry)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Query parameters of `POST /submit`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
    #[serde(default)]
    pub mode: Option<String>,
}

/// Response body of an accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    /// Valid, distinct keys queued.
    pub total: usize,
    /// Lines rejected by validation.
    pub skipped: usize,
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error carrying the response status.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(id: Uuid) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("no job {id}"))
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Input(msg) => Self::bad_request(msg),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    store: Arc<JobStore>,
    sources: Arc<SourceRegistry>,
    engine: EngineConfig,
    batch: BatchConfig,
}

// ---------------------------------------------------------------------------
// StatusServer
// ---------------------------------------------------------------------------

/// Background HTTP server for job submission and status.
pub struct StatusServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl StatusServer {
    /// Start serving on `{config.server.host}:{config.server.port}` (port
    /// `0` picks a free port) in a background tokio task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Server`] if the listener cannot bind.
    pub async fn start(
        config: &SubsiftConfig,
        store: Arc<JobStore>,
        sources: SourceRegistry,
    ) -> Result<Self> {
        let state = AppState {
            store,
            sources: Arc::new(sources),
            engine: config.engine.clone(),
            batch: config.batch.clone(),
        };

        let app = Router::new()
            .route("/submit", post(handle_submit))
            .route("/status/{id}", get(handle_status))
            .route("/result/{id}", get(handle_result))
            .route("/delete/{id}", delete(handle_delete))
            .route("/health", get(handle_health))
            .with_state(state);

        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| AppError::Server(format!("bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| AppError::Server(format!("failed to get local addr: {e}")))?;

        info!("status server listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("status server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    /// Wait until the server task ends.
    pub async fn wait(&mut self) {
        if let Err(e) = (&mut self.handle).await {
            if !e.is_cancelled() {
                tracing::error!("status server task failed: {e}");
            }
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Job execution
// ---------------------------------------------------------------------------

fn spawn_job(state: &AppState, record: &JobRecord, keys: Vec<String>) {
    let tracker = state.store.tracker(record.id);
    let sources = state
        .sources
        .get(&record.mode)
        .cloned()
        .unwrap_or_default();
    let aggregator = FanoutAggregator::new(sources, record.mode, state.engine.clone());
    let runner = BatchRunner::new(aggregator, state.batch.clone());
    let output = record.output.clone();

    tokio::spawn(async move {
        let sink = match FileSink::create(&output, WriteMode::Append).await {
            Ok(sink) => sink,
            Err(e) => {
                tracker.mark_failed(&e.to_string());
                return;
            }
        };
        if let Err(e) = runner.run(&keys, &sink, Some(&tracker)).await {
            warn!(id = %tracker.id(), error = %e, "batch failed");
        }
    });
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `POST /submit`: validate, register, and start a batch.
async fn handle_submit(
    State(state): State<AppState>,
    Query(params): Query<SubmitParams>,
    body: String,
) -> std::result::Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let mode: LookupMode = match params.mode.as_deref() {
        Some(raw) => raw.parse().map_err(ApiError::bad_request)?,
        None => LookupMode::default(),
    };

    let loaded = parse_keys(&body, mode, state.batch.max_keys)?;
    if loaded.keys.is_empty() {
        return Err(ApiError::bad_request("no valid keys provided"));
    }

    let record = state.store.create(mode, &loaded.keys)?;
    let response = SubmitResponse {
        job_id: record.id,
        total: loaded.keys.len(),
        skipped: loaded.skipped,
    };
    spawn_job(&state, &record, loaded.keys);
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// `GET /status/{id}`
async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> std::result::Result<Json<JobRecord>, ApiError> {
    state.store.get(id).map(Json).ok_or(ApiError::not_found(id))
}

/// `GET /result/{id}`: plain-text results of a completed job.
async fn handle_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> std::result::Result<Response, ApiError> {
    let record = state.store.get(id).ok_or(ApiError::not_found(id))?;
    if record.status != JobStatus::Completed {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("job {id} is {:?}", record.status).to_lowercase(),
        ));
    }

    let results = read_results(&record.output).await?;
    let mut body = String::new();
    for line in &results {
        body.push_str(line);
        body.push('\n');
    }
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body))
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// `DELETE /delete/{id}`: only finished jobs can be deleted.
async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> std::result::Result<StatusCode, ApiError> {
    let record = state.store.get(id).ok_or(ApiError::not_found(id))?;
    if !record.status.is_terminal() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("job {id} is still running"),
        ));
    }
    if state.store.delete(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(id))
    }
}

/// `GET /health`
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

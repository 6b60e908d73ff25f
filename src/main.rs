mod catalog;
mod config;
mod http;
mod idempotency;
mod images;
mod jobs;
mod metrics;
mod models;
mod odoo;
mod pubsub;
mod reconcile;
mod security;
#[cfg(test)]
mod test_support;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use config::SyncConfig;
use idempotency::DeliveryLog;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, RunReport, RunRequest};
use pubsub::{PushEnvelope, decode_offset};
use reconcile::{ReconcileError, ReconcileErrorKind, Reconciler};
use security::{AuthContext, AuthState, require_api_auth};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "sync.api", "server crashed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = SyncConfig::from_env()?;
    info!(
        target = "sync.api",
        odoo = %config.odoo.base_url,
        topic = %config.pubsub.topic,
        variant_miss = config.variant_miss.as_str(),
        "configuration loaded"
    );
    let reconciler = Reconciler::new(&config);
    let (queue, _worker) = jobs::JobQueue::spawn(reconciler.clone());
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    let state = AppState {
        reconciler,
        queue,
        deliveries: DeliveryLog::from_env(),
        prometheus_handle,
        metrics_key: std::env::var("METRICS_KEY").ok(),
    };

    let app = build_router(state, AuthState::from_env());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "sync.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    reconciler: Reconciler,
    queue: jobs::JobQueue,
    deliveries: DeliveryLog,
    prometheus_handle: PrometheusHandle,
    metrics_key: Option<String>,
}

fn build_router(state: AppState, auth: AuthState) -> Router {
    let protected = Router::new()
        .route("/pubsub/push", post(pubsub_push))
        .route("/runs", post(create_run))
        .nest(
            "/jobs",
            Router::new()
                .route("/sweep", post(enqueue_sweep))
                .route("/{id}", get(get_job_status)),
        )
        .route_layer(middleware::from_fn_with_state(auth, require_api_auth));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(protected)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env())),
        )
}

/// Health check. Unauthenticated.
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(secret) = &state.metrics_key {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

/// Pub/Sub push delivery.
///
/// - Method: `POST`
/// - Path: `/pubsub/push`
/// - Body: push envelope whose `message.data` is base64 JSON `{"offset": ..}`
/// - Response: `RunReport`; any non-2xx makes Pub/Sub redeliver
///
/// A delivery whose `messageId` already completed is answered from the
/// delivery log without running again.
async fn pubsub_push(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(envelope): Json<PushEnvelope>,
) -> Result<Json<RunReport>, AppError> {
    crate::metrics::inc_requests("/pubsub/push");
    let delivery_key = envelope.delivery_key();
    if let Some(key) = &delivery_key
        && let Some(existing) = state.deliveries.get(key).await
    {
        info!(target = "sync.api", delivery = %key, "duplicate_delivery_replayed");
        return Ok(Json(existing));
    }

    let offset = decode_offset(envelope.message.data.as_deref())
        .map_err(|err| ReconcileError::invalid_input("decode_offset", err.to_string()))?;
    info!(
        target = "sync.api",
        offset,
        key_id = %context.key_id,
        message_id = envelope.message.message_id.as_deref().unwrap_or_default(),
        "trigger_received"
    );

    let report = state.reconciler.handle_trigger(offset).await?;
    if let Some(key) = &delivery_key {
        state.deliveries.record(key, &report).await;
    }
    Ok(Json(report))
}

/// Manual replay of a single offset.
///
/// - Method: `POST`
/// - Path: `/runs`
/// - Body: `RunRequest`
/// - Response: `RunReport`
async fn create_run(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunReport>, AppError> {
    crate::metrics::inc_requests("/runs");
    let offset = payload
        .offset()
        .map_err(|err| ReconcileError::invalid_input("decode_offset", err.to_string()))?;
    info!(
        target = "sync.api",
        offset,
        key_id = %context.key_id,
        publish = payload.publish_continuation,
        "manual run requested"
    );
    let report = state
        .reconciler
        .run(offset, payload.publish_continuation)
        .await?;
    Ok(Json(report))
}

#[derive(Debug)]
enum AppError {
    Reconcile(ReconcileError),
    NotFound(&'static str),
}

impl From<ReconcileError> for AppError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    job_id: String,
}

async fn enqueue_sweep(
    State(state): State<AppState>,
    Json(payload): Json<jobs::SweepRequest>,
) -> Result<Json<EnqueueResponse>, AppError> {
    crate::metrics::inc_requests("/jobs/sweep");
    let id = state
        .queue
        .enqueue_sweep(payload)
        .await
        .map_err(|err| AppError::Reconcile(ReconcileError::internal("enqueue", err.error)))?;
    Ok(Json(EnqueueResponse {
        job_id: id.to_string(),
    }))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return Err(AppError::Reconcile(ReconcileError::invalid_input(
            "jobs",
            "invalid_job_id",
        )));
    };
    state
        .queue
        .get(uuid)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("job_not_found"))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Reconcile(err) => {
                let status = match err.kind() {
                    ReconcileErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    ReconcileErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(target = "sync.api", stage = err.stage(), error = %err, "run_failed");
                }
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
            AppError::NotFound(code) => {
                let payload = ApiError {
                    error: code.to_string(),
                    detail: None,
                };
                (StatusCode::NOT_FOUND, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

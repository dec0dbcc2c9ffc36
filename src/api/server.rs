//! HTTP server for the read API
//!
//! # Routes
//!
//! - `GET /health` - Liveness and configured partitions
//! - `GET /metagraph/{netuid}` - Latest snapshot payload, verbatim
//! - `GET /current-stats` - Every derived statistic
//! - `GET /transfer-fee`, `/total-stake`, `/total-issuance`,
//!   `/total-stake-percentage`, `/total-delegated-stake`,
//!   `/average-validator-apr` - One statistic each, as `{"<field>": value}`
//! - `GET /delegates` - Registered delegates, largest first
//! - `GET /metrics` - Prometheus text exposition

use super::ReadApi;
use crate::{metrics, IndexerError};
use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// [`IndexerError`] rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub IndexerError);

impl From<IndexerError> for ApiError {
    fn from(error: IndexerError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            IndexerError::PartitionNotAllowed(_) => StatusCode::FORBIDDEN,
            IndexerError::NotFound(_) => StatusCode::NOT_FOUND,
            IndexerError::InvalidProjectionInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            IndexerError::PartitionNotAllowed(_) => "netuid not allowed".to_string(),
            e => e.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// HTTP front end over a [`ReadApi`]
pub struct ApiServer {
    api: ReadApi,
    bind: String,
    cors_origins: Vec<String>,
}

impl ApiServer {
    pub fn new(api: ReadApi) -> Self {
        let server = &api.context().config.server;
        Self {
            bind: server.bind.clone(),
            cors_origins: server.cors_origins.clone(),
            api,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/metagraph/{netuid}", get(get_metagraph))
            .route("/current-stats", get(current_stats))
            .route("/transfer-fee", get(transfer_fee))
            .route("/total-stake", get(total_stake))
            .route("/total-issuance", get(total_issuance))
            .route("/total-stake-percentage", get(total_stake_percentage))
            .route("/total-delegated-stake", get(total_delegated_stake))
            .route("/delegates", get(delegates))
            .route("/average-validator-apr", get(average_validator_apr))
            .route("/metrics", get(prometheus_metrics))
            .layer(build_cors_layer(&self.cors_origins))
            .with_state(self.api.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> crate::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.bind).await.map_err(|e| {
            IndexerError::Config(format!("Failed to bind {}: {}", self.bind, e))
        })?;

        tracing::info!(
            addr = %self.bind,
            cors_origins = ?self.cors_origins,
            "Read API listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .max_age(Duration::from_secs(600));

    if origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        return cors.allow_origin(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(origins)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

async fn health(State(api): State<ReadApi>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "partitions": api.partitions(),
    }))
}

async fn get_metagraph(
    State(api): State<ReadApi>,
    Path(netuid): Path<i64>,
) -> ApiResult<Response> {
    let netuid = u16::try_from(netuid).map_err(|_| IndexerError::PartitionNotAllowed(netuid))?;
    let snapshot = api.get_snapshot(netuid)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                HeaderName::from_static("x-snapshot-version"),
                snapshot.version.to_string(),
            ),
        ],
        snapshot.payload,
    )
        .into_response())
}

async fn current_stats(State(api): State<ReadApi>) -> ApiResult<Response> {
    Ok(Json(api.current_stats().await?).into_response())
}

async fn transfer_fee(State(api): State<ReadApi>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "transferFee": api.transfer_fee().await? })))
}

async fn total_stake(State(api): State<ReadApi>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "totalStake": api.total_stake().await? })))
}

async fn total_issuance(State(api): State<ReadApi>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "totalIssuance": api.total_issuance().await? })))
}

async fn total_stake_percentage(State(api): State<ReadApi>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "totalStakePercentage": api.total_stake_percentage().await?
    })))
}

async fn total_delegated_stake(State(api): State<ReadApi>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "totalDelegatedStake": api.total_delegated_stake().await?
    })))
}

async fn delegates(State(api): State<ReadApi>) -> ApiResult<Json<Value>> {
    let delegates = api.delegates().await?;
    Ok(Json(json!({ "delegates": delegates.as_slice() })))
}

async fn average_validator_apr(State(api): State<ReadApi>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "averageValidatorAPR": api.average_validator_apr().await?
    })))
}

async fn prometheus_metrics() -> ApiResult<Response> {
    let body = metrics::encode_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

//! RPC request and response types, and the axum handlers that serve them.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use tally_node::{LedgerNode, QueueDepths, SubmissionReceipt};
use tally_types::{OutcomeRecord, RequestId, User, UserId};

use crate::error::RpcError;

/// Default number of outcome records when `limit` is not given.
pub const DEFAULT_OUTCOME_LIMIT: usize = 100;

/// Maximum number of outcome records per request.
pub const MAX_OUTCOME_LIMIT: usize = 1000;

// ── Envelope ─────────────────────────────────────────────────────────────

/// `{"status": "success", "data": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            data,
        })
    }
}

// ── Users ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
}

pub async fn create_user(
    State(node): State<Arc<LedgerNode>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<User>, RpcError> {
    let Json(req) = payload.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let user = node.create_user(req.name).await?;
    Ok(Json(user))
}

pub async fn list_users(
    State(node): State<Arc<LedgerNode>>,
) -> Json<ApiResponse<HashMap<UserId, User>>> {
    ApiResponse::success(node.list_users().await)
}

pub async fn get_user(
    State(node): State<Arc<LedgerNode>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, RpcError> {
    let user = node.get_user(&UserId::new(id)).await?;
    Ok(ApiResponse::success(user))
}

// ── Transactions ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: i64,
}

/// Accepts the transfer for later processing. Success here does not mean
/// the transfer will complete.
pub async fn send(
    State(node): State<Arc<LedgerNode>>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SubmissionReceipt>>, RpcError> {
    let Json(req) = payload.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let receipt = node
        .submit_transaction(
            UserId::new(req.sender_id),
            UserId::new(req.receiver_id),
            req.amount,
        )
        .await?;
    Ok(ApiResponse::success(receipt))
}

// ── Outcomes ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct OutcomesQuery {
    pub limit: Option<usize>,
}

impl OutcomesQuery {
    /// Requested limit, defaulted and clamped to `[1, MAX_OUTCOME_LIMIT]`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_OUTCOME_LIMIT)
            .clamp(1, MAX_OUTCOME_LIMIT)
    }
}

pub async fn list_outcomes(
    State(node): State<Arc<LedgerNode>>,
    query: Result<Query<OutcomesQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<OutcomeRecord>>>, RpcError> {
    let Query(query) = query.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let records = node.recent_outcomes(query.effective_limit()).await;
    Ok(ApiResponse::success(records))
}

pub async fn get_outcome(
    State(node): State<Arc<LedgerNode>>,
    Path(request_id): Path<String>,
) -> Result<Json<ApiResponse<OutcomeRecord>>, RpcError> {
    let parsed: RequestId = request_id
        .parse()
        .map_err(|e: tally_types::TallyError| RpcError::InvalidRequest(e.to_string()))?;
    node.outcome_for(&parsed)
        .await
        .map(ApiResponse::success)
        .ok_or(RpcError::OutcomeNotFound(request_id))
}

// ── Telemetry ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub users: usize,
    pub queues: QueueDepths,
    pub stopping: bool,
}

pub async fn health(State(node): State<Arc<LedgerNode>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        users: node.list_users().await.len(),
        queues: node.queue_depths().await,
        stopping: node.is_stopping(),
    })
}

/// Prometheus text exposition of the pipeline metrics.
pub async fn metrics(State(node): State<Arc<LedgerNode>>) -> Result<Response, RpcError> {
    if !node.config().enable_metrics {
        return Err(RpcError::MetricsDisabled);
    }
    let body = node
        .metrics()
        .encode()
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

//! RPC error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

use tally_node::NodeError;
use tally_types::TallyError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("outcome not found: {0}")]
    OutcomeNotFound(String),

    #[error("metrics disabled")]
    MetricsDisabled,

    #[error("node error: {0}")]
    Node(String),

    #[error("server error: {0}")]
    Server(String),
}

impl From<NodeError> for RpcError {
    fn from(e: NodeError) -> Self {
        match e {
            NodeError::Ledger(TallyError::Validation(msg)) => RpcError::InvalidRequest(msg),
            NodeError::Ledger(TallyError::UserNotFound(id)) => RpcError::UserNotFound(id.to_string()),
            other => RpcError::Node(other.to_string()),
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        RpcError::Server(e.to_string())
    }
}

impl RpcError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::UserNotFound(_) | RpcError::OutcomeNotFound(_) | RpcError::MetricsDisabled => {
                StatusCode::NOT_FOUND
            }
            RpcError::Node(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"status": "error", "error": "<message>"}` with the matching status code.
impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = Json(serde_json::json!({
            "status": "error",
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err: RpcError =
            NodeError::Ledger(TallyError::Validation("sender_id must not be empty".into())).into();
        assert!(matches!(err, RpcError::InvalidRequest(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_user_maps_to_not_found() {
        let err: RpcError = NodeError::Ledger(TallyError::UserNotFound("x".into())).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "user not found: x");
    }

    #[test]
    fn other_node_errors_are_internal() {
        let err: RpcError = NodeError::AlreadyStarted.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

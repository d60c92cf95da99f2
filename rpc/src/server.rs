//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use tally_node::LedgerNode;

use crate::error::RpcError;
use crate::handlers;

/// Build the router with every endpoint.
pub fn create_router(node: Arc<LedgerNode>) -> Router {
    Router::new()
        .route("/user/create", post(handlers::create_user))
        .route("/user/:id", get(handlers::get_user))
        .route("/users", get(handlers::list_users))
        .route("/send", post(handlers::send))
        .route("/outcomes", get(handlers::list_outcomes))
        .route("/outcome/:request_id", get(handlers::get_outcome))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

pub struct RpcServer {
    listen_addr: String,
    node: Arc<LedgerNode>,
}

impl RpcServer {
    pub fn new(listen_addr: impl Into<String>, node: Arc<LedgerNode>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            node,
        }
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: SocketAddr = listener.local_addr()?;
        tracing::info!(addr = %local, "RPC server listening");
        axum::serve(listener, create_router(self.node))
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("RPC server stopped");
        Ok(())
    }
}

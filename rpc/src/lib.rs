//! HTTP JSON API for the tally ledger node.
//!
//! Provides endpoints for:
//! - User creation and lookup
//! - Transfer submission
//! - Per-item processing outcomes
//! - Health and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{create_router, RpcServer};

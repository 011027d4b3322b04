//! # Clownlist Backend Library
//!
//! Request-handling layer for a small public ban list API. Every inbound
//! request passes through a middleware pipeline before any handler touches
//! the record store.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **Tokio**: Async runtime
//! - **Serde**: JSON payloads and token claims
//!
//! ## Core Components
//!
//! - [`middleware`]: origin policy, rate limiting, bearer authentication,
//!   payload validation and the pipeline composing them
//! - [`token`]: HS256 bearer token issue and verification
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`config`]: Layered configuration
//! - [`store`]: Record storage seam with an in-memory implementation
//! - [`routes`]: HTTP API endpoint handlers
//! - [`metrics`]: Pipeline counters
//! - [`state`]: Shared application state
//! - [`types`]: Data transfer objects and shared type definitions

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod token;
pub mod types;

#[cfg(test)]
mod tests;

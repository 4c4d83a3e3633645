//! Relay API server library.
//!
//! Exposes the dispatch engine, the webhook ingestor, the HTTP routes and
//! the WebSocket infrastructure so integration tests and the binary
//! entrypoint share the same building blocks.

pub mod auth;
pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;

//! HTTP API
//!
//! REST surface for the multi-tenant task/spec coordination server, built
//! on `axum`. Every route resolves a project name to a
//! [`ProjectHandle`](airyra_core::repository::ProjectHandle) and calls
//! straight through to the matching `airyra-core` repository trait; this
//! crate owns request parsing, response envelopes, and error mapping,
//! nothing else.
//!
//! # Overview
//!
//! - [`routes`] — handlers and the route table
//! - [`server`] — middleware layering and the `axum::serve` listener
//! - [`state`] — the shared [`AppState`]
//! - [`error`] — maps [`airyra_core::error::CoordError`] onto the HTTP
//!   error envelope
//! - [`middleware`] — agent-id extraction, request logging, panic
//!   recovery
//!
//! # Usage
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use airyra_core::repository::StoreManager;
//!
//! # async fn start(store: Arc<dyn StoreManager>) -> std::io::Result<()> {
//! let addr: SocketAddr = "127.0.0.1:7432".parse().unwrap();
//! airyra_api::server::serve(addr, store, std::future::pending()).await
//! # }
//! ```

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, serve};
pub use state::AppState;

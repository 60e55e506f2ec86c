//! Airyra Server
//!
//! Binary-support library for the `airyra` CLI: layered configuration
//! and `tracing` telemetry setup. The HTTP surface itself lives in
//! `airyra-api`; this crate only wires configuration, logging, and the
//! store manager together for `main`.

pub mod config;
pub mod telemetry;

pub use config::Config;
pub use telemetry::init_telemetry;

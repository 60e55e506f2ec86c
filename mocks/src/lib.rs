//! Mock implementations of the `airyra-core` repository traits.
//!
//! Every mock is an in-memory, `parking_lot`-guarded fake with error
//! injection and call-history tracking, so callers (the `api` crate's
//! handler tests, mainly) can exercise success and failure paths
//! without a SQLite file.

pub mod repository;

pub use repository::{
    MockAuditLog, MockDependencyGraphRepository, MockProjectHandle, MockSpecRepository,
    MockStoreManager, MockTaskRepository,
};

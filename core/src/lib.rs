//! Airyra Core
//!
//! Domain models, error taxonomy, validation, repository traits, and the
//! pure algorithms (dependency cycle detection, spec status derivation)
//! shared by every other crate in the coordination server. This crate
//! performs no I/O.
//!
//! # Architecture
//!
//! - [`models`] — `Task`, `Spec`, dependency edges, audit entries, pagination
//! - [`lifecycle`] — the task state machine
//! - [`error`] — the `CoordError` taxonomy and its HTTP status mapping
//! - [`graph`] — pure BFS cycle detection shared by both dependency graphs
//! - [`spec_status`] — derivation of a spec's effective status
//! - [`repository`] — the traits `store` implements against SQLite
//! - [`validation`] — boundary validation for titles, priorities, names
//!
//! # Example
//!
//! ```rust
//! use airyra_core::models::{NewTask, Pagination};
//! use airyra_core::validation::Validator;
//!
//! let task = NewTask {
//!     title: "Wire up the claim endpoint".to_string(),
//!     description: None,
//!     priority: Some(1),
//!     parent_task_id: None,
//!     spec_id: None,
//! };
//! Validator::validate_new_task(&task).unwrap();
//!
//! let page = Pagination::clamp(1, 0);
//! assert_eq!(page.per_page, airyra_core::models::DEFAULT_PER_PAGE);
//! ```

pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod spec_status;
pub mod validation;

pub use error::{CoordError, Result};
pub use models::{
    AuditAction, AuditEntry, AuditFilter, DependencyEdge, EffectiveSpecStatus, NewSpec, NewTask,
    Page, Pagination, Spec, SpecManualStatus, SpecView, Task, TaskFilter, TaskStatus, UpdateSpec,
    UpdateTask,
};
pub use repository::{
    AuditRepository, DependencyGraphRepository, NewAuditEntry, ProjectHandle, SpecRepository,
    StoreManager, TaskRepository,
};
pub use validation::Validator;

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_constants_are_populated() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "airyra-core");
    }

    #[test]
    fn re_exports_are_usable_from_the_crate_root() {
        let status = TaskStatus::Open;
        assert_eq!(status.to_string(), "open");

        let err = CoordError::task_not_found("tk-1");
        assert!(err.is_not_found());
    }
}

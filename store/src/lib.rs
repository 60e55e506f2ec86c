//! Airyra Store
//!
//! `sqlx`-backed SQLite implementations of the `airyra-core` repository
//! traits, plus the [`manager::SqliteStoreManager`] that owns one
//! connection pool per project.
//!
//! ```rust,no_run
//! use airyra_store::SqliteStoreManager;
//! use airyra_core::repository::StoreManager;
//! use airyra_core::models::{TaskFilter, Pagination};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SqliteStoreManager::new("/tmp/airyra-projects");
//! let project = manager.get("demo").await?;
//! let page = project.tasks().list(TaskFilter::default(), Pagination::default()).await?;
//! println!("{} tasks", page.total);
//! # Ok(())
//! # }
//! ```

mod common;
mod manager;
mod sqlite;

pub use manager::{ProjectStore, SqliteStoreManager};
pub use sqlite::{
    SqliteAuditLog, SqliteDependencyGraphRepository, SqliteSpecRepository, SqliteTaskRepository,
};

pub use airyra_core::error::{CoordError, Result};
pub use airyra_core::repository::{
    AuditRepository, DependencyGraphRepository, ProjectHandle, SpecRepository, StoreManager,
    TaskRepository,
};

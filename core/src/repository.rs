use crate::{
    error::Result,
    graph::GraphKind,
    models::{
        AuditEntry, AuditFilter, DependencyEdge, NewSpec, NewTask, Page, Pagination, Spec,
        SpecView, Task, TaskFilter, UpdateSpec, UpdateTask,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Repository for task persistence and the task lifecycle operations in
/// spec.md §4.2. Implementations must be safe under concurrent access —
/// in particular, [`TaskRepository::claim`] must be linearizable: when
/// two agents race to claim the same open task, exactly one succeeds.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: NewTask) -> Result<Task>;

    async fn update(&self, id: &str, updates: UpdateTask) -> Result<Task>;

    async fn get(&self, id: &str) -> Result<Option<Task>>;

    async fn list(&self, filter: TaskFilter, pagination: Pagination) -> Result<Page<Task>>;

    /// Open tasks with no unsatisfied parent dependency — every parent in
    /// the task dependency graph, if any, is `done`. Same ordering and
    /// pagination as [`TaskRepository::list`].
    async fn list_ready(&self, pagination: Pagination) -> Result<Page<Task>>;

    /// Atomically claim an open task for `agent`. Implemented as a single
    /// conditional update keyed on `(id, status = 'open')`; success is
    /// derived from the row-modified count, never from a read-then-write.
    ///
    /// Returns [`crate::error::CoordError::AlreadyClaimed`] if another
    /// agent already holds the task, and
    /// [`crate::error::CoordError::InvalidTransition`] if the task is not
    /// `open` for a reason other than an existing claim (e.g. `done`).
    async fn claim(&self, id: &str, agent: &str) -> Result<Task>;

    /// Mark a task `done`. Only the current owner may complete it.
    async fn complete(&self, id: &str, agent: &str) -> Result<Task>;

    /// Release a claimed task back to `open`, clearing ownership. Only
    /// the current owner may release it unless `force` is set, in which
    /// case any agent may release it regardless of who holds the claim.
    async fn release(&self, id: &str, agent: &str, force: bool) -> Result<Task>;

    /// Move a task that is not already `blocked` to `blocked`. No
    /// ownership check: any agent may block any task. Preserves
    /// `claimed_by`/`claimed_at` so the same agent resumes it later
    /// without reclaiming (see DESIGN.md's "block preserves ownership"
    /// decision). Blocking an already-blocked task is a no-op that
    /// returns the task unchanged.
    async fn block(&self, id: &str, agent: &str) -> Result<Task>;

    /// Move a blocked task back to `open`, clearing ownership — an
    /// unblocked task must be reclaimed before work resumes.
    async fn unblock(&self, id: &str) -> Result<Task>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Repository for specs and the derived status/count aggregation in
/// spec.md §4.4. `get`/`list` always recompute `task_count`, `done_count`
/// and `effective_status` from the task table; nothing here is cached.
#[async_trait]
pub trait SpecRepository: Send + Sync {
    async fn create(&self, spec: NewSpec) -> Result<Spec>;

    async fn update(&self, id: &str, updates: UpdateSpec) -> Result<Spec>;

    async fn get(&self, id: &str) -> Result<Option<SpecView>>;

    async fn list(&self, pagination: Pagination) -> Result<Page<SpecView>>;

    async fn cancel(&self, id: &str) -> Result<SpecView>;

    async fn reopen(&self, id: &str) -> Result<SpecView>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Repository for one dependency graph (tasks or specs — see
/// [`GraphKind`]). Both graphs share this single interface since spec.md
/// states they have identical semantics.
#[async_trait]
pub trait DependencyGraphRepository: Send + Sync {
    fn kind(&self) -> GraphKind;

    /// Insert `child -> parent`, after checking (in the same transaction)
    /// that doing so would not create a cycle.
    async fn add_dependency(&self, child_id: &str, parent_id: &str) -> Result<()>;

    async fn remove_dependency(&self, child_id: &str, parent_id: &str) -> Result<()>;

    async fn list_parents(&self, node_id: &str) -> Result<Vec<DependencyEdge>>;

    async fn list_children(&self, node_id: &str) -> Result<Vec<DependencyEdge>>;
}

/// Append-only audit trail for task mutations (spec.md §4.5). Writes are
/// best-effort: repository implementations log and swallow failures
/// rather than propagate them to the caller of the mutation being
/// audited.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, entry: NewAuditEntry);

    async fn list_by_task(&self, task_id: &str, pagination: Pagination) -> Result<Page<AuditEntry>>;

    async fn query(&self, filter: AuditFilter, pagination: Pagination) -> Result<Page<AuditEntry>>;
}

/// Input to [`AuditRepository::append`]; the id and timestamp are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub task_id: String,
    pub action: crate::models::AuditAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_by: String,
}

/// The four repositories backing a single project, bundled behind one
/// handle so call sites don't thread four `Arc`s around.
pub trait ProjectHandle: Send + Sync {
    fn tasks(&self) -> Arc<dyn TaskRepository>;
    fn specs(&self) -> Arc<dyn SpecRepository>;
    fn task_graph(&self) -> Arc<dyn DependencyGraphRepository>;
    fn spec_graph(&self) -> Arc<dyn DependencyGraphRepository>;
    fn audit(&self) -> Arc<dyn AuditRepository>;
}

/// Owns one store (connection pool + schema) per project and hands out
/// shared handles to it, per spec.md §4.1's multi-tenancy model.
#[async_trait]
pub trait StoreManager: Send + Sync {
    /// Return the handle for `project`, creating its backing store on
    /// first access if it does not already exist.
    async fn get(&self, project: &str) -> Result<Arc<dyn ProjectHandle>>;

    /// Enumerate every project with a persisted store, including ones
    /// never `get()`-ed during this process's lifetime.
    async fn list(&self) -> Result<Vec<String>>;

    /// Close every open handle. Called once during graceful shutdown.
    async fn close(&self) -> Result<()>;
}

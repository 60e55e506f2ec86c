//! In-memory fakes of the `airyra-core` repository traits.
//!
//! Mirrors the semantics of the SQLite store closely enough to exercise
//! handler logic in the `api` crate without a database: atomic claim,
//! ownership checks, lifecycle transitions, cycle detection, and the
//! derived spec status are all implemented for real here, not stubbed.

use airyra_core::error::{CoordError, Result};
use airyra_core::graph::{check_no_cycle, GraphKind, ParentLookup};
use airyra_core::models::{
    AuditEntry, AuditFilter, DependencyEdge, NewSpec, NewTask, Page, Pagination, Spec,
    SpecManualStatus, SpecView, Task, TaskFilter, TaskStatus, UpdateSpec, UpdateTask,
};
use airyra_core::repository::{
    AuditRepository, DependencyGraphRepository, NewAuditEntry, ProjectHandle, SpecRepository,
    StoreManager, TaskRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory [`TaskRepository`] with error injection and call tracking.
pub struct MockTaskRepository {
    tasks: Mutex<HashMap<String, Task>>,
    next_id: AtomicU64,
    error_injection: Mutex<Option<CoordError>>,
    call_history: Mutex<Vec<String>>,
    /// Task ids with an unsatisfied parent dependency, set by
    /// [`Self::set_blocked_by_dependency`]. This mock has no dependency
    /// graph of its own to derive readiness from, so tests drive it
    /// directly instead of wiring up a [`MockDependencyGraphRepository`].
    blocked_by_dependency: Mutex<std::collections::HashSet<String>>,
}

impl Default for MockTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            error_injection: Mutex::new(None),
            call_history: Mutex::new(Vec::new()),
            blocked_by_dependency: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks: Mutex::new(map),
            next_id: AtomicU64::new(1),
            error_injection: Mutex::new(None),
            call_history: Mutex::new(Vec::new()),
            blocked_by_dependency: Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Test hook: marks `task_id` as having an unsatisfied parent
    /// dependency, excluding it from [`TaskRepository::list_ready`].
    pub fn set_blocked_by_dependency(&self, task_id: &str, blocked: bool) {
        let mut set = self.blocked_by_dependency.lock();
        if blocked {
            set.insert(task_id.to_string());
        } else {
            set.remove(task_id);
        }
    }

    /// Makes the next call fail with `error` instead of running.
    pub fn inject_error(&self, error: CoordError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called, call history: {history:?}"
        );
    }

    fn check_error_injection(&self) -> Result<()> {
        match self.error_injection.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.call_history.lock().push(call.into());
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn create(&self, task: NewTask) -> Result<Task> {
        self.record(format!("create({})", task.title));
        self.check_error_injection()?;

        airyra_core::validation::Validator::validate_new_task(&task)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let new_task = Task {
            id: format!("tk-mock-{id}"),
            title: task.title,
            description: task.description,
            status: TaskStatus::Open,
            priority: task.priority.unwrap_or(airyra_core::models::DEFAULT_PRIORITY),
            parent_task_id: task.parent_task_id,
            spec_id: task.spec_id,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.lock().insert(new_task.id.clone(), new_task.clone());
        Ok(new_task)
    }

    async fn update(&self, id: &str, updates: UpdateTask) -> Result<Task> {
        self.record(format!("update({id})"));
        self.check_error_injection()?;

        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| CoordError::task_not_found(id))?;
        if let Some(title) = updates.title {
            task.title = title;
        }
        if let Some(description) = updates.description {
            task.description = Some(description);
        }
        if let Some(priority) = updates.priority {
            task.priority = priority;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Task>> {
        self.record(format!("get({id})"));
        self.check_error_injection()?;
        Ok(self.tasks.lock().get(id).cloned())
    }

    async fn list(&self, filter: TaskFilter, pagination: Pagination) -> Result<Page<Task>> {
        self.record("list");
        self.check_error_injection()?;

        let tasks = self.tasks.lock();
        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.spec_id.is_none() || t.spec_id == filter.spec_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));

        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .collect();

        Ok(Page {
            data,
            page: pagination.page,
            per_page: pagination.per_page,
            total,
        })
    }

    async fn list_ready(&self, pagination: Pagination) -> Result<Page<Task>> {
        self.record("list_ready");
        self.check_error_injection()?;

        let tasks = self.tasks.lock();
        let blocked = self.blocked_by_dependency.lock();
        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Open && !blocked.contains(&t.id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        drop(tasks);
        drop(blocked);
        paginate(matching, pagination)
    }

    async fn claim(&self, id: &str, agent: &str) -> Result<Task> {
        self.record(format!("claim({id}, {agent})"));
        self.check_error_injection()?;

        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| CoordError::task_not_found(id))?;
        match &task.claimed_by {
            Some(owner) if owner != agent => {
                return Err(CoordError::AlreadyClaimed {
                    task_id: id.to_string(),
                    owner: owner.clone(),
                })
            }
            _ if task.status != TaskStatus::Open => {
                return Err(CoordError::InvalidTransition {
                    task_id: id.to_string(),
                    from: task.status.to_string(),
                    to: TaskStatus::InProgress.to_string(),
                })
            }
            _ => {}
        }
        task.status = TaskStatus::InProgress;
        task.claimed_by = Some(agent.to_string());
        task.claimed_at = Some(Utc::now());
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn complete(&self, id: &str, agent: &str) -> Result<Task> {
        self.record(format!("complete({id}, {agent})"));
        self.check_error_injection()?;
        self.transition(id, agent, TaskStatus::Done, false, true)
    }

    async fn release(&self, id: &str, agent: &str, force: bool) -> Result<Task> {
        self.record(format!("release({id}, {agent}, force={force})"));
        self.check_error_injection()?;
        self.transition(id, agent, TaskStatus::Open, true, !force)
    }

    async fn block(&self, id: &str, agent: &str) -> Result<Task> {
        self.record(format!("block({id}, {agent})"));
        self.check_error_injection()?;
        {
            let tasks = self.tasks.lock();
            if let Some(task) = tasks.get(id) {
                if task.status == TaskStatus::Blocked {
                    return Ok(task.clone());
                }
            }
        }
        self.transition(id, agent, TaskStatus::Blocked, false, false)
    }

    async fn unblock(&self, id: &str) -> Result<Task> {
        self.record(format!("unblock({id})"));
        self.check_error_injection()?;

        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| CoordError::task_not_found(id))?;
        if task.status != TaskStatus::Blocked {
            return Err(CoordError::InvalidTransition {
                task_id: id.to_string(),
                from: task.status.to_string(),
                to: TaskStatus::Open.to_string(),
            });
        }
        task.status = TaskStatus::Open;
        task.claimed_by = None;
        task.claimed_at = None;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.record(format!("delete({id})"));
        self.check_error_injection()?;
        self.tasks
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CoordError::task_not_found(id))
    }
}

impl MockTaskRepository {
    /// Shared body for `complete`, `release` and `block`. `clear_owner`
    /// clears `claimed_by`/`claimed_at` on success (release only — block
    /// keeps ownership so the same agent reclaims the task once it
    /// unblocks). `check_owner` is false for a forced release and for
    /// block, which per the lifecycle table has no ownership
    /// precondition at all.
    fn transition(
        &self,
        id: &str,
        agent: &str,
        target: TaskStatus,
        clear_owner: bool,
        check_owner: bool,
    ) -> Result<Task> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| CoordError::task_not_found(id))?;
        if check_owner {
            match &task.claimed_by {
                Some(owner) if owner == agent => {}
                owner => {
                    return Err(CoordError::NotOwner {
                        task_id: id.to_string(),
                        agent: agent.to_string(),
                        owner: owner.clone(),
                    })
                }
            }
        }
        // `release` and `unblock` both land on `Open` but from different
        // source statuses; `can_transition_to` only expresses the union,
        // so the stricter source check happens here for `release`.
        let from_ok = match target {
            TaskStatus::Open => task.status == TaskStatus::InProgress,
            _ => task.status.can_transition_to(target),
        };
        if !from_ok {
            return Err(CoordError::InvalidTransition {
                task_id: id.to_string(),
                from: task.status.to_string(),
                to: target.to_string(),
            });
        }
        task.status = target;
        if clear_owner {
            task.claimed_by = None;
            task.claimed_at = None;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

/// In-memory [`SpecRepository`]. Task/done counts used to derive the
/// effective status are tracked separately via [`Self::set_task_counts`]
/// since this mock is not wired to a [`MockTaskRepository`] instance.
pub struct MockSpecRepository {
    specs: Mutex<HashMap<String, Spec>>,
    counts: Mutex<HashMap<String, (u64, u64)>>,
    next_id: AtomicU64,
}

impl Default for MockSpecRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpecRepository {
    pub fn new() -> Self {
        Self {
            specs: Mutex::new(HashMap::new()),
            counts: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Test hook: sets the (task_count, done_count) pair used when
    /// deriving a spec's effective status.
    pub fn set_task_counts(&self, spec_id: &str, task_count: u64, done_count: u64) {
        self.counts
            .lock()
            .insert(spec_id.to_string(), (task_count, done_count));
    }

    fn view(&self, spec: Spec) -> SpecView {
        let (task_count, done_count) = self
            .counts
            .lock()
            .get(&spec.id)
            .copied()
            .unwrap_or((0, 0));
        let effective_status =
            airyra_core::spec_status::derive(spec.manual_status, task_count, done_count);
        SpecView {
            spec,
            task_count,
            done_count,
            effective_status,
        }
    }
}

#[async_trait]
impl SpecRepository for MockSpecRepository {
    async fn create(&self, spec: NewSpec) -> Result<Spec> {
        airyra_core::validation::Validator::validate_new_spec(&spec)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let new_spec = Spec {
            id: format!("sp-mock-{id}"),
            title: spec.title,
            description: spec.description,
            manual_status: None,
            created_at: now,
            updated_at: now,
        };
        self.specs.lock().insert(new_spec.id.clone(), new_spec.clone());
        Ok(new_spec)
    }

    async fn update(&self, id: &str, updates: UpdateSpec) -> Result<Spec> {
        let mut specs = self.specs.lock();
        let spec = specs.get_mut(id).ok_or_else(|| CoordError::spec_not_found(id))?;
        if let Some(title) = updates.title {
            spec.title = title;
        }
        if let Some(description) = updates.description {
            spec.description = Some(description);
        }
        spec.updated_at = Utc::now();
        Ok(spec.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<SpecView>> {
        let spec = self.specs.lock().get(id).cloned();
        Ok(spec.map(|s| self.view(s)))
    }

    async fn list(&self, pagination: Pagination) -> Result<Page<SpecView>> {
        let specs = self.specs.lock();
        let mut all: Vec<Spec> = specs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let total = all.len() as u64;
        let data = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .map(|s| self.view(s))
            .collect();
        Ok(Page {
            data,
            page: pagination.page,
            per_page: pagination.per_page,
            total,
        })
    }

    async fn cancel(&self, id: &str) -> Result<SpecView> {
        let mut specs = self.specs.lock();
        let spec = specs.get_mut(id).ok_or_else(|| CoordError::spec_not_found(id))?;
        if spec.manual_status == Some(SpecManualStatus::Cancelled) {
            return Err(CoordError::SpecAlreadyCancelled(id.to_string()));
        }
        spec.manual_status = Some(SpecManualStatus::Cancelled);
        spec.updated_at = Utc::now();
        Ok(self.view(spec.clone()))
    }

    async fn reopen(&self, id: &str) -> Result<SpecView> {
        let mut specs = self.specs.lock();
        let spec = specs.get_mut(id).ok_or_else(|| CoordError::spec_not_found(id))?;
        if spec.manual_status != Some(SpecManualStatus::Cancelled) {
            return Err(CoordError::SpecNotCancelled(id.to_string()));
        }
        spec.manual_status = None;
        spec.updated_at = Utc::now();
        Ok(self.view(spec.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.specs
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CoordError::spec_not_found(id))
    }
}

/// In-memory [`DependencyGraphRepository`] shared by both the task and
/// spec graphs; `kind` only distinguishes them for callers that branch
/// on it.
pub struct MockDependencyGraphRepository {
    kind: GraphKind,
    /// child_id -> parent_ids
    edges: Mutex<HashMap<String, Vec<String>>>,
}

impl MockDependencyGraphRepository {
    pub fn for_tasks() -> Self {
        Self {
            kind: GraphKind::Task,
            edges: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_specs() -> Self {
        Self {
            kind: GraphKind::Spec,
            edges: Mutex::new(HashMap::new()),
        }
    }
}

struct MapLookup<'a>(&'a Mutex<HashMap<String, Vec<String>>>);

#[async_trait]
impl ParentLookup for MapLookup<'_> {
    async fn parents(&self, node: &str) -> Result<Vec<String>> {
        Ok(self.0.lock().get(node).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl DependencyGraphRepository for MockDependencyGraphRepository {
    fn kind(&self) -> GraphKind {
        self.kind
    }

    async fn add_dependency(&self, child_id: &str, parent_id: &str) -> Result<()> {
        if child_id == parent_id {
            return Err(CoordError::validation("self-dependency"));
        }
        {
            let lookup = MapLookup(&self.edges);
            check_no_cycle(&lookup, child_id, parent_id).await?;
        }
        let mut edges = self.edges.lock();
        let parents = edges.entry(child_id.to_string()).or_default();
        if !parents.contains(&parent_id.to_string()) {
            parents.push(parent_id.to_string());
        }
        Ok(())
    }

    async fn remove_dependency(&self, child_id: &str, parent_id: &str) -> Result<()> {
        let mut edges = self.edges.lock();
        let parents = edges
            .get_mut(child_id)
            .ok_or_else(|| CoordError::DependencyNotFound {
                child_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            })?;
        let before = parents.len();
        parents.retain(|p| p != parent_id);
        if parents.len() == before {
            return Err(CoordError::DependencyNotFound {
                child_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_parents(&self, node_id: &str) -> Result<Vec<DependencyEdge>> {
        Ok(self
            .edges
            .lock()
            .get(node_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|parent_id| DependencyEdge {
                child_id: node_id.to_string(),
                parent_id,
            })
            .collect())
    }

    async fn list_children(&self, node_id: &str) -> Result<Vec<DependencyEdge>> {
        Ok(self
            .edges
            .lock()
            .iter()
            .filter(|(_, parents)| parents.iter().any(|p| p == node_id))
            .map(|(child_id, _)| DependencyEdge {
                child_id: child_id.clone(),
                parent_id: node_id.to_string(),
            })
            .collect())
    }
}

/// In-memory [`AuditRepository`]. Unlike the SQLite log this never
/// fails, since there is no I/O to fail on.
pub struct MockAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    next_id: AtomicI64,
}

impl Default for MockAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuditLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl AuditRepository for MockAuditLog {
    async fn append(&self, entry: NewAuditEntry) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().push(AuditEntry {
            id,
            task_id: entry.task_id,
            action: entry.action,
            field: entry.field,
            old_value: entry.old_value,
            new_value: entry.new_value,
            changed_at: Utc::now(),
            changed_by: entry.changed_by,
        });
    }

    async fn list_by_task(&self, task_id: &str, pagination: Pagination) -> Result<Page<AuditEntry>> {
        let entries = self.entries.lock();
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));
        paginate(matching, pagination)
    }

    async fn query(&self, filter: AuditFilter, pagination: Pagination) -> Result<Page<AuditEntry>> {
        let entries = self.entries.lock();
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| filter.action.is_none_or(|a| a == e.action))
            .filter(|e| filter.agent.as_deref().is_none_or(|a| a == e.changed_by))
            .filter(|e| filter.start.is_none_or(|s| e.changed_at >= s))
            .filter(|e| filter.end.is_none_or(|end| e.changed_at <= end))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));
        paginate(matching, pagination)
    }
}

fn paginate<T>(items: Vec<T>, pagination: Pagination) -> Result<Page<T>> {
    let total = items.len() as u64;
    let data = items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.per_page as usize)
        .collect();
    Ok(Page {
        data,
        page: pagination.page,
        per_page: pagination.per_page,
        total,
    })
}

/// One project's set of in-memory repositories, analogous to the
/// SQLite store's `ProjectStore`.
pub struct MockProjectHandle {
    tasks: Arc<MockTaskRepository>,
    specs: Arc<MockSpecRepository>,
    task_graph: Arc<MockDependencyGraphRepository>,
    spec_graph: Arc<MockDependencyGraphRepository>,
    audit: Arc<MockAuditLog>,
}

impl Default for MockProjectHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProjectHandle {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(MockTaskRepository::new()),
            specs: Arc::new(MockSpecRepository::new()),
            task_graph: Arc::new(MockDependencyGraphRepository::for_tasks()),
            spec_graph: Arc::new(MockDependencyGraphRepository::for_specs()),
            audit: Arc::new(MockAuditLog::new()),
        }
    }
}

impl ProjectHandle for MockProjectHandle {
    fn tasks(&self) -> Arc<dyn TaskRepository> {
        self.tasks.clone()
    }

    fn specs(&self) -> Arc<dyn SpecRepository> {
        self.specs.clone()
    }

    fn task_graph(&self) -> Arc<dyn DependencyGraphRepository> {
        self.task_graph.clone()
    }

    fn spec_graph(&self) -> Arc<dyn DependencyGraphRepository> {
        self.spec_graph.clone()
    }

    fn audit(&self) -> Arc<dyn AuditRepository> {
        self.audit.clone()
    }
}

/// In-memory [`StoreManager`] used by the `api` crate's handler tests
/// in place of `airyra-store`'s SQLite-backed manager.
pub struct MockStoreManager {
    projects: Mutex<HashMap<String, Arc<MockProjectHandle>>>,
}

impl Default for MockStoreManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStoreManager {
    pub fn new() -> Self {
        Self {
            projects: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StoreManager for MockStoreManager {
    async fn get(&self, project: &str) -> Result<Arc<dyn ProjectHandle>> {
        airyra_core::validation::Validator::validate_project_name(project)?;
        let mut projects = self.projects.lock();
        let handle = projects
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(MockProjectHandle::new()))
            .clone();
        Ok(handle as Arc<dyn ProjectHandle>)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.projects.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn close(&self) -> Result<()> {
        self.projects.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            priority: None,
            parent_task_id: None,
            spec_id: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = MockTaskRepository::new();
        let created = repo.create(new_task("write docs")).await.unwrap();
        let fetched = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "write docs");
        repo.assert_called("get(");
    }

    #[tokio::test]
    async fn claim_then_complete_by_a_different_agent_fails() {
        let repo = MockTaskRepository::new();
        let task = repo.create(new_task("ship it")).await.unwrap();
        repo.claim(&task.id, "agent-a").await.unwrap();
        let err = repo.complete(&task.id, "agent-b").await.unwrap_err();
        assert_eq!(err.code(), "NOT_OWNER");
    }

    #[tokio::test]
    async fn block_preserves_ownership() {
        let repo = MockTaskRepository::new();
        let task = repo.create(new_task("flaky test")).await.unwrap();
        repo.claim(&task.id, "agent-a").await.unwrap();
        let blocked = repo.block(&task.id, "agent-a").await.unwrap();
        assert_eq!(blocked.claimed_by.as_deref(), Some("agent-a"));
        let unblocked = repo.unblock(&task.id).await.unwrap();
        assert!(unblocked.claimed_by.is_none());
    }

    #[tokio::test]
    async fn release_requires_ownership_unless_forced() {
        let repo = MockTaskRepository::new();
        let task = repo.create(new_task("ship it")).await.unwrap();
        repo.claim(&task.id, "agent-a").await.unwrap();

        let denied = repo.release(&task.id, "agent-b", false).await.unwrap_err();
        assert_eq!(denied.code(), "NOT_OWNER");

        let released = repo.release(&task.id, "agent-b", true).await.unwrap();
        assert_eq!(released.status, TaskStatus::Open);
        assert!(released.claimed_by.is_none());
    }

    #[tokio::test]
    async fn block_has_no_ownership_precondition() {
        let repo = MockTaskRepository::new();
        let task = repo.create(new_task("anyone can block this")).await.unwrap();
        let blocked = repo.block(&task.id, "agent-a").await.unwrap();
        assert_eq!(blocked.status, TaskStatus::Blocked);

        // Idempotent: blocking an already-blocked task is a no-op.
        let again = repo.block(&task.id, "agent-b").await.unwrap();
        assert_eq!(again.status, TaskStatus::Blocked);
    }

    #[tokio::test]
    async fn list_ready_excludes_tasks_marked_blocked_by_dependency() {
        let repo = MockTaskRepository::new();
        let open = repo.create(new_task("open task")).await.unwrap();
        let waiting = repo.create(new_task("waiting on a parent")).await.unwrap();
        repo.set_blocked_by_dependency(&waiting.id, true);

        let ready = repo.list_ready(Pagination::clamp(1, 10)).await.unwrap();
        let ids: Vec<&str> = ready.data.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.contains(&open.id.as_str()));
        assert!(!ids.contains(&waiting.id.as_str()));
    }

    #[tokio::test]
    async fn injected_error_is_returned_once() {
        let repo = MockTaskRepository::new();
        repo.inject_error(CoordError::Internal("boom".to_string()));
        let err = repo.create(new_task("x")).await.unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        // Second call succeeds: injection is consumed.
        repo.create(new_task("y")).await.unwrap();
    }

    #[tokio::test]
    async fn dependency_graph_rejects_cycles() {
        let graph = MockDependencyGraphRepository::for_tasks();
        graph.add_dependency("a", "b").await.unwrap();
        let err = graph.add_dependency("b", "a").await.unwrap_err();
        assert_eq!(err.code(), "CYCLE_DETECTED");
    }

    #[tokio::test]
    async fn spec_status_reflects_manually_set_counts() {
        let specs = MockSpecRepository::new();
        let spec = specs
            .create(NewSpec {
                title: "Release".to_string(),
                description: None,
            })
            .await
            .unwrap();
        specs.set_task_counts(&spec.id, 2, 2);
        let view = specs.get(&spec.id).await.unwrap().unwrap();
        assert_eq!(
            view.effective_status,
            airyra_core::models::EffectiveSpecStatus::Done
        );
    }

    #[tokio::test]
    async fn store_manager_returns_the_same_handle_for_the_same_project() {
        let manager = MockStoreManager::new();
        let a = manager.get("demo").await.unwrap();
        let b = manager.get("demo").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.list().await.unwrap(), vec!["demo".to_string()]);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work owned by at most one agent at a time.
///
/// Ownership and status move together: `claimed_by`/`claimed_at` are
/// present if and only if `status` is [`TaskStatus::InProgress`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: u8,
    pub parent_task_id: Option<String>,
    pub spec_id: Option<String>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task lifecycle states. There is no terminal state: `done` tasks are
/// never automatically reopened, but the type permits any transition the
/// state machine in `core::lifecycle` allows.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Blocked,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::error::CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TaskStatus::Open),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            other => Err(crate::error::CoordError::Internal(format!(
                "invalid task status in store: {other}"
            ))),
        }
    }
}

/// Default task priority (0 = most urgent, 4 = least urgent).
pub const DEFAULT_PRIORITY: u8 = 2;

/// Input to [`crate::repository::TaskRepository::create`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    pub parent_task_id: Option<String>,
    pub spec_id: Option<String>,
}

/// Partial update to a task's editable fields (title/description/priority).
/// `None` means "leave unchanged" for every field.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<u8>,
}

/// Filter criteria for [`crate::repository::TaskRepository::list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub spec_id: Option<String>,
}

/// A grouping of tasks. Status is always derived at read time; see
/// [`crate::spec_status`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Spec {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub manual_status: Option<SpecManualStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpecManualStatus {
    Cancelled,
}

/// A spec together with the derived counts/status a reader needs. Never
/// persisted — recomputed on every read from the task table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecView {
    pub spec: Spec,
    pub task_count: u64,
    pub done_count: u64,
    pub effective_status: EffectiveSpecStatus,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveSpecStatus {
    Draft,
    Active,
    Done,
    Cancelled,
}

impl std::fmt::Display for EffectiveSpecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EffectiveSpecStatus::Draft => "draft",
            EffectiveSpecStatus::Active => "active",
            EffectiveSpecStatus::Done => "done",
            EffectiveSpecStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NewSpec {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateSpec {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A directed edge `child -> parent` meaning "child is blocked until
/// parent is done/complete". The same shape is reused for task and spec
/// dependency graphs (see [`crate::graph::GraphKind`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub child_id: String,
    pub parent_id: String,
}

/// One immutable, append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub task_id: String,
    pub action: AuditAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Claim,
    Done,
    Release,
    Block,
    Unblock,
    AddDependency,
    RemoveDependency,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Claim => "claim",
            AuditAction::Done => "done",
            AuditAction::Release => "release",
            AuditAction::Block => "block",
            AuditAction::Unblock => "unblock",
            AuditAction::AddDependency => "add_dependency",
            AuditAction::RemoveDependency => "remove_dependency",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AuditAction {
    type Err = crate::error::CoordError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "create" => AuditAction::Create,
            "update" => AuditAction::Update,
            "delete" => AuditAction::Delete,
            "claim" => AuditAction::Claim,
            "done" => AuditAction::Done,
            "release" => AuditAction::Release,
            "block" => AuditAction::Block,
            "unblock" => AuditAction::Unblock,
            "add_dependency" => AuditAction::AddDependency,
            "remove_dependency" => AuditAction::RemoveDependency,
            other => {
                return Err(crate::error::CoordError::validation(format!(
                    "unknown audit action: {other}"
                )))
            }
        })
    }
}

/// Filters for [`crate::repository::AuditRepository::query`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub agent: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Requested page; always normalized via [`Pagination::clamp`] before it
/// reaches a repository.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

pub const DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 100;

impl Pagination {
    /// Normalize per the boundary rules in spec.md §8: `page` floors at 1,
    /// `per_page = 0` resets to the default, and any value above 100
    /// clamps down to 100.
    pub fn clamp(page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        let per_page = if per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            per_page.min(MAX_PER_PAGE)
        };
        Self { page, per_page }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.per_page
    }
}

/// A page of results plus the metadata needed to build the list envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_zero_to_default() {
        let p = Pagination::clamp(1, 0);
        assert_eq!(p.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn pagination_clamps_large_value_to_max() {
        let p = Pagination::clamp(1, 1000);
        assert_eq!(p.per_page, MAX_PER_PAGE);
    }

    #[test]
    fn pagination_floors_page_at_one() {
        let p = Pagination::clamp(0, 50);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn page_total_pages_rounds_up() {
        let page = Page {
            data: Vec::<Task>::new(),
            page: 1,
            per_page: 10,
            total: 25,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn task_status_round_trips_through_display_and_from_str() {
        use std::str::FromStr;
        for status in [
            TaskStatus::Open,
            TaskStatus::InProgress,
            TaskStatus::Blocked,
            TaskStatus::Done,
        ] {
            let s = status.to_string();
            assert_eq!(TaskStatus::from_str(&s).unwrap(), status);
        }
    }
}

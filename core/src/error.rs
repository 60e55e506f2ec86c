use thiserror::Error;

/// Result type alias used throughout the coordination server.
pub type Result<T> = std::result::Result<T, CoordError>;

/// Error taxonomy for the coordination server. Each variant carries the
/// machine-readable `code()` and HTTP `status()` the `api` crate puts in
/// the error envelope.
///
/// # Examples
///
/// ```rust
/// use airyra_core::error::CoordError;
///
/// let err = CoordError::task_not_found("tk-42");
/// assert_eq!(err.code(), "TASK_NOT_FOUND");
/// assert_eq!(err.status(), 404);
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cannot transition task {task_id} from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("adding dependency {child_id} -> {parent_id} would create a cycle: {path:?}")]
    CycleDetected {
        child_id: String,
        parent_id: String,
        path: Vec<String>,
    },

    #[error("agent '{agent}' does not own task {task_id} (owned by {owner:?})")]
    NotOwner {
        task_id: String,
        agent: String,
        owner: Option<String>,
    },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("spec not found: {0}")]
    SpecNotFound(String),

    #[error("dependency not found: {child_id} -> {parent_id}")]
    DependencyNotFound { child_id: String, parent_id: String },

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("task {task_id} is already claimed by {owner}")]
    AlreadyClaimed { task_id: String, owner: String },

    #[error("spec {0} is already cancelled")]
    SpecAlreadyCancelled(String),

    #[error("spec {0} is not cancelled")]
    SpecNotCancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoordError {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound(id.into())
    }

    pub fn spec_not_found(id: impl Into<String>) -> Self {
        Self::SpecNotFound(id.into())
    }

    pub fn project_not_found(name: impl Into<String>) -> Self {
        Self::ProjectNotFound(name.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable, machine-readable error identifier used in the API error
    /// envelope's `code` field (spec.md §6/§7).
    pub fn code(&self) -> &'static str {
        match self {
            CoordError::Validation(_) => "VALIDATION_FAILED",
            CoordError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoordError::CycleDetected { .. } => "CYCLE_DETECTED",
            CoordError::NotOwner { .. } => "NOT_OWNER",
            CoordError::TaskNotFound(_) => "TASK_NOT_FOUND",
            CoordError::SpecNotFound(_) => "SPEC_NOT_FOUND",
            CoordError::DependencyNotFound { .. } => "DEPENDENCY_NOT_FOUND",
            CoordError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            CoordError::AlreadyClaimed { .. } => "ALREADY_CLAIMED",
            CoordError::SpecAlreadyCancelled(_) => "SPEC_ALREADY_CANCELLED",
            CoordError::SpecNotCancelled(_) => "SPEC_NOT_CANCELLED",
            CoordError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code this error maps to, per spec.md §6's table.
    pub fn status(&self) -> u16 {
        match self {
            CoordError::Validation(_) => 400,
            CoordError::InvalidTransition { .. } => 400,
            CoordError::CycleDetected { .. } => 400,
            CoordError::NotOwner { .. } => 403,
            CoordError::TaskNotFound(_) => 404,
            CoordError::SpecNotFound(_) => 404,
            CoordError::DependencyNotFound { .. } => 404,
            CoordError::ProjectNotFound(_) => 404,
            CoordError::AlreadyClaimed { .. } => 409,
            CoordError::SpecAlreadyCancelled(_) => 409,
            CoordError::SpecNotCancelled(_) => 409,
            CoordError::Internal(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoordError::TaskNotFound(_)
                | CoordError::SpecNotFound(_)
                | CoordError::DependencyNotFound { .. }
                | CoordError::ProjectNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec_table() {
        assert_eq!(CoordError::validation("x").status(), 400);
        assert_eq!(
            CoordError::InvalidTransition {
                task_id: "tk-1".into(),
                from: "open".into(),
                to: "done".into(),
            }
            .status(),
            400
        );
        assert_eq!(
            CoordError::CycleDetected {
                child_id: "a".into(),
                parent_id: "b".into(),
                path: vec!["b".into(), "a".into()],
            }
            .status(),
            400
        );
        assert_eq!(
            CoordError::NotOwner {
                task_id: "tk-1".into(),
                agent: "agent-a".into(),
                owner: Some("agent-b".into()),
            }
            .status(),
            403
        );
        assert_eq!(CoordError::task_not_found("tk-1").status(), 404);
        assert_eq!(CoordError::spec_not_found("sp-1").status(), 404);
        assert_eq!(CoordError::project_not_found("demo").status(), 404);
        assert_eq!(
            CoordError::AlreadyClaimed {
                task_id: "tk-1".into(),
                owner: "agent-a".into(),
            }
            .status(),
            409
        );
        assert_eq!(CoordError::SpecAlreadyCancelled("sp-1".into()).status(), 409);
        assert_eq!(CoordError::SpecNotCancelled("sp-1".into()).status(), 409);
        assert_eq!(CoordError::Internal("boom".into()).status(), 500);
    }

    #[test]
    fn codes_are_stable_identifiers() {
        assert_eq!(CoordError::task_not_found("tk-1").code(), "TASK_NOT_FOUND");
        assert_eq!(CoordError::validation("x").code(), "VALIDATION_FAILED");
    }

    #[test]
    fn is_not_found_groups_the_four_not_found_variants() {
        assert!(CoordError::task_not_found("tk-1").is_not_found());
        assert!(CoordError::spec_not_found("sp-1").is_not_found());
        assert!(CoordError::project_not_found("demo").is_not_found());
        assert!(CoordError::DependencyNotFound {
            child_id: "a".into(),
            parent_id: "b".into()
        }
        .is_not_found());
        assert!(!CoordError::validation("x").is_not_found());
    }
}

use crate::error::{CoordError, Result};
use crate::models::{NewSpec, NewTask};

/// Validation utilities applied at the repository/API boundary.
pub struct Validator;

impl Validator {
    /// Project names identify a file on disk (`{name}.db`) and must:
    /// - be 1-64 characters long
    /// - contain only letters, digits, hyphens, and underscores
    ///
    /// This also rejects path traversal characters (`/`, `\`, `..`)
    /// implicitly, since they are not in the allowed character set.
    pub fn validate_project_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(CoordError::validation("project name cannot be empty"));
        }
        if name.len() > 64 {
            return Err(CoordError::validation(
                "project name must be at most 64 characters long",
            ));
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CoordError::validation(
                "project name may only contain letters, digits, '-', and '_'",
            ));
        }
        Ok(())
    }

    /// Task and spec titles must be non-empty once trimmed, and capped at
    /// a generous length to keep the store's indexes well-behaved.
    pub fn validate_title(title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(CoordError::validation("title cannot be empty"));
        }
        if trimmed.len() > 200 {
            return Err(CoordError::validation(
                "title must be at most 200 characters long",
            ));
        }
        Ok(())
    }

    /// Priority is an integer 0 (most urgent) through 4 (least urgent).
    pub fn validate_priority(priority: u8) -> Result<()> {
        if priority > 4 {
            return Err(CoordError::validation("priority must be between 0 and 4"));
        }
        Ok(())
    }

    pub fn validate_new_task(task: &NewTask) -> Result<()> {
        Self::validate_title(&task.title)?;
        if let Some(priority) = task.priority {
            Self::validate_priority(priority)?;
        }
        Ok(())
    }

    pub fn validate_new_spec(spec: &NewSpec) -> Result<()> {
        Self::validate_title(&spec.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_project_names() {
        assert!(Validator::validate_project_name("demo").is_ok());
        assert!(Validator::validate_project_name("demo-project_1").is_ok());
        assert!(Validator::validate_project_name(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_project_names() {
        assert!(Validator::validate_project_name("").is_err());
        assert!(Validator::validate_project_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn rejects_path_traversal_characters_in_project_names() {
        assert!(Validator::validate_project_name("../etc").is_err());
        assert!(Validator::validate_project_name("a/b").is_err());
        assert!(Validator::validate_project_name("a\\b").is_err());
        assert!(Validator::validate_project_name("a b").is_err());
    }

    #[test]
    fn titles_must_be_non_empty_after_trimming() {
        assert!(Validator::validate_title("Ship it").is_ok());
        assert!(Validator::validate_title("").is_err());
        assert!(Validator::validate_title("   ").is_err());
        assert!(Validator::validate_title(&"a".repeat(201)).is_err());
    }

    #[test]
    fn priority_range_is_zero_through_four() {
        for p in 0..=4 {
            assert!(Validator::validate_priority(p).is_ok());
        }
        assert!(Validator::validate_priority(5).is_err());
    }

    #[test]
    fn validate_new_task_checks_title_and_optional_priority() {
        let task = NewTask {
            title: "Ship it".to_string(),
            description: None,
            priority: Some(9),
            parent_task_id: None,
            spec_id: None,
        };
        assert!(Validator::validate_new_task(&task).is_err());
    }
}

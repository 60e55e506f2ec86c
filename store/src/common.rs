use airyra_core::error::CoordError;
use airyra_core::models::{SpecManualStatus, TaskStatus};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use std::str::FromStr;

/// Convert a `sqlx::Error` into the domain error type. Constraint
/// violations surface as [`CoordError::Validation`] rather than
/// [`CoordError::Internal`] since they are caused by the caller's input
/// (e.g. inserting a duplicate dependency edge).
pub fn sqlx_error_to_coord_error(err: sqlx::Error) -> CoordError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if db_err.code().as_deref() == Some("2067") || message.contains("UNIQUE constraint") {
                CoordError::Validation(format!("already exists: {message}"))
            } else {
                CoordError::Internal(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::RowNotFound => CoordError::Internal("unexpected RowNotFound".to_string()),
        sqlx::Error::PoolTimedOut => CoordError::Internal("connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => CoordError::Internal(format!("database I/O error: {io_err}")),
        _ => CoordError::Internal(format!("database operation failed: {err}")),
    }
}

pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

pub fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Open => "open",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Done => "done",
    }
}

pub fn manual_status_to_str(status: SpecManualStatus) -> &'static str {
    match status {
        SpecManualStatus::Cancelled => "cancelled",
    }
}

pub fn str_to_manual_status(s: &str) -> Result<SpecManualStatus, CoordError> {
    match s {
        "cancelled" => Ok(SpecManualStatus::Cancelled),
        other => Err(CoordError::Internal(format!(
            "invalid spec manual_status in store: {other}"
        ))),
    }
}

pub fn row_to_task(row: &SqliteRow) -> Result<airyra_core::models::Task, CoordError> {
    let status_str: String = row.get("status");
    let status = TaskStatus::from_str(&status_str)?;
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    let claimed_at: Option<DateTime<Utc>> = row.try_get("claimed_at").ok().flatten();
    let priority: i64 = row.get("priority");

    Ok(airyra_core::models::Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status,
        priority: priority as u8,
        parent_task_id: row.get("parent_task_id"),
        spec_id: row.get("spec_id"),
        claimed_by: row.get("claimed_by"),
        claimed_at,
        created_at,
        updated_at,
    })
}

pub fn row_to_spec(row: &SqliteRow) -> Result<airyra_core::models::Spec, CoordError> {
    let manual_status_str: Option<String> = row.try_get("manual_status").ok().flatten();
    let manual_status = manual_status_str
        .map(|s| str_to_manual_status(&s))
        .transpose()?;

    Ok(airyra_core::models::Spec {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        manual_status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_to_str_and_back_round_trip() {
        for status in [
            TaskStatus::Open,
            TaskStatus::InProgress,
            TaskStatus::Blocked,
            TaskStatus::Done,
        ] {
            let s = status_to_str(status);
            assert_eq!(TaskStatus::from_str(s).unwrap(), status);
        }
    }

    #[test]
    fn new_id_carries_the_requested_prefix() {
        let id = new_id("tk");
        assert!(id.starts_with("tk-"));
    }
}

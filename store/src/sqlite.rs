use crate::common::{
    manual_status_to_str, new_id, row_to_spec, row_to_task, sqlx_error_to_coord_error,
    status_to_str,
};
use airyra_core::error::{CoordError, Result};
use airyra_core::graph::{check_no_cycle, GraphKind, ParentLookup};
use airyra_core::models::{
    AuditEntry, AuditFilter, DependencyEdge, EffectiveSpecStatus, NewSpec, NewTask, Page,
    Pagination, Spec, SpecManualStatus, SpecView, Task, TaskFilter, TaskStatus, UpdateSpec,
    UpdateTask,
};
use airyra_core::repository::{
    AuditRepository, DependencyGraphRepository, NewAuditEntry, SpecRepository, TaskRepository,
};
use airyra_core::validation::Validator;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// SQLite-backed [`TaskRepository`]. Every mutation that changes a
/// tracked field also appends an audit entry through the shared
/// [`AuditRepository`] handle; audit failures are logged, not
/// propagated (see [`SqliteAuditLog`]).
#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
    audit: Arc<dyn AuditRepository>,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool, audit: Arc<dyn AuditRepository>) -> Self {
        Self { pool, audit }
    }

    async fn fetch_one(&self, id: &str) -> Result<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?
            .ok_or_else(|| CoordError::task_not_found(id))?;
        row_to_task(&row)
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: NewTask) -> Result<Task> {
        Validator::validate_new_task(&task)?;
        let id = new_id("tk");
        let now = Utc::now();
        let priority = task.priority.unwrap_or(airyra_core::models::DEFAULT_PRIORITY) as i64;

        let row = sqlx::query(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, parent_task_id, spec_id, claimed_by, claimed_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(status_to_str(TaskStatus::Open))
        .bind(priority)
        .bind(&task.parent_task_id)
        .bind(&task.spec_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;

        let created = row_to_task(&row)?;
        self.audit
            .append(NewAuditEntry {
                task_id: created.id.clone(),
                action: airyra_core::models::AuditAction::Create,
                field: None,
                old_value: None,
                new_value: Some(created.title.clone()),
                changed_by: "system".to_string(),
            })
            .await;
        Ok(created)
    }

    async fn update(&self, id: &str, updates: UpdateTask) -> Result<Task> {
        let existing = self.fetch_one(id).await?;

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("UPDATE tasks SET updated_at = ");
        builder.push_bind(Utc::now());
        let mut changed_title = None;
        let mut changed_description = None;
        let mut changed_priority = None;

        if let Some(title) = &updates.title {
            Validator::validate_title(title)?;
            builder.push(", title = ");
            builder.push_bind(title);
            changed_title = Some(title.clone());
        }
        if let Some(description) = &updates.description {
            builder.push(", description = ");
            builder.push_bind(description);
            changed_description = Some(description.clone());
        }
        if let Some(priority) = updates.priority {
            Validator::validate_priority(priority)?;
            builder.push(", priority = ");
            builder.push_bind(priority as i64);
            changed_priority = Some(priority);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        let updated = row_to_task(&row)?;

        if let Some(new_title) = changed_title {
            self.audit
                .append(NewAuditEntry {
                    task_id: updated.id.clone(),
                    action: airyra_core::models::AuditAction::Update,
                    field: Some("title".to_string()),
                    old_value: Some(existing.title.clone()),
                    new_value: Some(new_title),
                    changed_by: "system".to_string(),
                })
                .await;
        }
        if let Some(new_description) = changed_description {
            self.audit
                .append(NewAuditEntry {
                    task_id: updated.id.clone(),
                    action: airyra_core::models::AuditAction::Update,
                    field: Some("description".to_string()),
                    old_value: existing.description.clone(),
                    new_value: Some(new_description),
                    changed_by: "system".to_string(),
                })
                .await;
        }
        if let Some(new_priority) = changed_priority {
            self.audit
                .append(NewAuditEntry {
                    task_id: updated.id.clone(),
                    action: airyra_core::models::AuditAction::Update,
                    field: Some("priority".to_string()),
                    old_value: Some(existing.priority.to_string()),
                    new_value: Some(new_priority.to_string()),
                    changed_by: "system".to_string(),
                })
                .await;
        }
        Ok(updated)
    }

    async fn get(&self, id: &str) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        row.map(|r| row_to_task(&r)).transpose()
    }

    async fn list(&self, filter: TaskFilter, pagination: Pagination) -> Result<Page<Task>> {
        let where_clause = |builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>| {
            let mut has_where = false;
            if let Some(status) = filter.status {
                builder.push(" WHERE status = ");
                builder.push_bind(status_to_str(status));
                has_where = true;
            }
            if let Some(spec_id) = filter.spec_id.clone() {
                builder.push(if has_where { " AND " } else { " WHERE " });
                builder.push("spec_id = ");
                builder.push_bind(spec_id);
            }
        };

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("SELECT * FROM tasks");
        where_clause(&mut builder);
        builder.push(" ORDER BY priority ASC, created_at ASC LIMIT ");
        builder.push_bind(pagination.per_page as i64);
        builder.push(" OFFSET ");
        builder.push_bind(pagination.offset() as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        let data = rows
            .iter()
            .map(row_to_task)
            .collect::<Result<Vec<_>>>()?;

        let mut count_builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM tasks");
        where_clause(&mut count_builder);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        Ok(Page {
            data,
            page: pagination.page,
            per_page: pagination.per_page,
            total: total as u64,
        })
    }

    async fn list_ready(&self, pagination: Pagination) -> Result<Page<Task>> {
        const READY_PREDICATE: &str = r#"
            status = 'open'
            AND NOT EXISTS (
                SELECT 1 FROM task_dependencies td
                JOIN tasks parent ON parent.id = td.parent_id
                WHERE td.child_id = tasks.id AND parent.status != 'done'
            )
        "#;

        let rows = sqlx::query(&format!(
            "SELECT * FROM tasks WHERE {READY_PREDICATE} ORDER BY priority ASC, created_at ASC LIMIT ? OFFSET ?"
        ))
        .bind(pagination.per_page as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;
        let data = rows.iter().map(row_to_task).collect::<Result<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM tasks WHERE {READY_PREDICATE}"
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;

        Ok(Page {
            data,
            page: pagination.page,
            per_page: pagination.per_page,
            total: total as u64,
        })
    }

    async fn claim(&self, id: &str, agent: &str) -> Result<Task> {
        let now = Utc::now();
        let updated_rows = sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?, claimed_by = ?, claimed_at = ?, updated_at = ?
            WHERE id = ?
              AND status = 'open'
              AND (claimed_by IS NULL OR claimed_by = ?)
            "#,
        )
        .bind(status_to_str(TaskStatus::InProgress))
        .bind(agent)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(agent)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;

        if updated_rows.rows_affected() == 0 {
            let current = self.fetch_one(id).await?;
            return Err(match (&current.claimed_by, current.status) {
                (Some(owner), _) if owner != agent => CoordError::AlreadyClaimed {
                    task_id: id.to_string(),
                    owner: owner.clone(),
                },
                (_, status) if status != TaskStatus::Open => CoordError::InvalidTransition {
                    task_id: id.to_string(),
                    from: status.to_string(),
                    to: TaskStatus::InProgress.to_string(),
                },
                _ => CoordError::Internal(format!("failed to claim task {id}")),
            });
        }

        let claimed = self.fetch_one(id).await?;
        self.audit
            .append(NewAuditEntry {
                task_id: claimed.id.clone(),
                action: airyra_core::models::AuditAction::Claim,
                field: Some("claimed_by".to_string()),
                old_value: None,
                new_value: Some(agent.to_string()),
                changed_by: agent.to_string(),
            })
            .await;
        Ok(claimed)
    }

    async fn complete(&self, id: &str, agent: &str) -> Result<Task> {
        let current = self.fetch_one(id).await?;
        self.assert_owner(&current, agent)?;
        if !current.status.can_transition_to(TaskStatus::Done) {
            return Err(CoordError::InvalidTransition {
                task_id: id.to_string(),
                from: current.status.to_string(),
                to: TaskStatus::Done.to_string(),
            });
        }
        let now = Utc::now();
        sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status_to_str(TaskStatus::Done))
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        let done = self.fetch_one(id).await?;
        self.audit
            .append(NewAuditEntry {
                task_id: done.id.clone(),
                action: airyra_core::models::AuditAction::Done,
                field: Some("status".to_string()),
                old_value: Some(current.status.to_string()),
                new_value: Some(TaskStatus::Done.to_string()),
                changed_by: agent.to_string(),
            })
            .await;
        Ok(done)
    }

    async fn release(&self, id: &str, agent: &str, force: bool) -> Result<Task> {
        let current = self.fetch_one(id).await?;
        if !force {
            self.assert_owner(&current, agent)?;
        }
        // Release only ever leaves `in_progress`; `blocked -> open` is
        // `unblock`'s transition, not this one, even though both land on
        // `Open` and share a `can_transition_to` entry.
        if current.status != TaskStatus::InProgress {
            return Err(CoordError::InvalidTransition {
                task_id: id.to_string(),
                from: current.status.to_string(),
                to: TaskStatus::Open.to_string(),
            });
        }
        let now = Utc::now();
        sqlx::query(
            "UPDATE tasks SET status = ?, claimed_by = NULL, claimed_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(status_to_str(TaskStatus::Open))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;

        let released = self.fetch_one(id).await?;
        self.audit
            .append(NewAuditEntry {
                task_id: released.id.clone(),
                action: airyra_core::models::AuditAction::Release,
                field: Some("claimed_by".to_string()),
                old_value: Some(agent.to_string()),
                new_value: None,
                changed_by: agent.to_string(),
            })
            .await;
        Ok(released)
    }

    async fn block(&self, id: &str, agent: &str) -> Result<Task> {
        let current = self.fetch_one(id).await?;
        if current.status == TaskStatus::Blocked {
            return Ok(current);
        }
        if !current.status.can_transition_to(TaskStatus::Blocked) {
            return Err(CoordError::InvalidTransition {
                task_id: id.to_string(),
                from: current.status.to_string(),
                to: TaskStatus::Blocked.to_string(),
            });
        }
        let now = Utc::now();
        sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status_to_str(TaskStatus::Blocked))
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        let blocked = self.fetch_one(id).await?;
        self.audit
            .append(NewAuditEntry {
                task_id: blocked.id.clone(),
                action: airyra_core::models::AuditAction::Block,
                field: Some("status".to_string()),
                old_value: Some(current.status.to_string()),
                new_value: Some(TaskStatus::Blocked.to_string()),
                changed_by: agent.to_string(),
            })
            .await;
        Ok(blocked)
    }

    async fn unblock(&self, id: &str) -> Result<Task> {
        let current = self.fetch_one(id).await?;
        if current.status != TaskStatus::Blocked {
            return Err(CoordError::InvalidTransition {
                task_id: id.to_string(),
                from: current.status.to_string(),
                to: TaskStatus::Open.to_string(),
            });
        }
        let now = Utc::now();
        sqlx::query(
            "UPDATE tasks SET status = ?, claimed_by = NULL, claimed_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(status_to_str(TaskStatus::Open))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;

        let unblocked = self.fetch_one(id).await?;
        self.audit
            .append(NewAuditEntry {
                task_id: unblocked.id.clone(),
                action: airyra_core::models::AuditAction::Unblock,
                field: Some("status".to_string()),
                old_value: Some(current.status.to_string()),
                new_value: Some(TaskStatus::Open.to_string()),
                changed_by: "system".to_string(),
            })
            .await;
        Ok(unblocked)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.fetch_one(id).await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        self.audit
            .append(NewAuditEntry {
                task_id: id.to_string(),
                action: airyra_core::models::AuditAction::Delete,
                field: None,
                old_value: None,
                new_value: None,
                changed_by: "system".to_string(),
            })
            .await;
        Ok(())
    }
}

impl SqliteTaskRepository {
    fn assert_owner(&self, task: &Task, agent: &str) -> Result<()> {
        match &task.claimed_by {
            Some(owner) if owner == agent => Ok(()),
            owner => Err(CoordError::NotOwner {
                task_id: task.id.clone(),
                agent: agent.to_string(),
                owner: owner.clone(),
            }),
        }
    }
}

/// SQLite-backed [`SpecRepository`]. `task_count`/`done_count` are
/// recomputed from the `tasks` table on every read; nothing is cached.
#[derive(Clone)]
pub struct SqliteSpecRepository {
    pool: SqlitePool,
}

impl SqliteSpecRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_view(&self, id: &str) -> Result<Option<SpecView>> {
        let row = sqlx::query("SELECT * FROM specs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        let Some(row) = row else { return Ok(None) };
        let spec = row_to_spec(&row)?;

        let (task_count, done_count): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(CASE WHEN status = 'done' THEN 1 END) FROM tasks WHERE spec_id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;

        let effective_status = airyra_core::spec_status::derive(
            spec.manual_status,
            task_count as u64,
            done_count as u64,
        );

        Ok(Some(SpecView {
            spec,
            task_count: task_count as u64,
            done_count: done_count as u64,
            effective_status,
        }))
    }
}

#[async_trait]
impl SpecRepository for SqliteSpecRepository {
    async fn create(&self, spec: NewSpec) -> Result<Spec> {
        if spec.title.trim().is_empty() {
            return Err(CoordError::validation("title cannot be empty"));
        }
        let id = new_id("sp");
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO specs (id, title, description, manual_status, created_at, updated_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&spec.title)
        .bind(&spec.description)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_coord_error)?;
        row_to_spec(&row)
    }

    async fn update(&self, id: &str, updates: UpdateSpec) -> Result<Spec> {
        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("UPDATE specs SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(title) = &updates.title {
            if title.trim().is_empty() {
                return Err(CoordError::validation("title cannot be empty"));
            }
            builder.push(", title = ");
            builder.push_bind(title);
        }
        if let Some(description) = &updates.description {
            builder.push(", description = ");
            builder.push_bind(description);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?
            .ok_or_else(|| CoordError::spec_not_found(id))?;
        row_to_spec(&row)
    }

    async fn get(&self, id: &str) -> Result<Option<SpecView>> {
        self.fetch_view(id).await
    }

    async fn list(&self, pagination: Pagination) -> Result<Page<SpecView>> {
        let rows = sqlx::query("SELECT id FROM specs ORDER BY created_at ASC LIMIT ? OFFSET ?")
            .bind(pagination.per_page as i64)
            .bind(pagination.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            if let Some(view) = self.fetch_view(&id).await? {
                data.push(view);
            }
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM specs")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        Ok(Page {
            data,
            page: pagination.page,
            per_page: pagination.per_page,
            total: total as u64,
        })
    }

    async fn cancel(&self, id: &str) -> Result<SpecView> {
        let view = self
            .fetch_view(id)
            .await?
            .ok_or_else(|| CoordError::spec_not_found(id))?;
        if view.spec.manual_status == Some(SpecManualStatus::Cancelled) {
            return Err(CoordError::SpecAlreadyCancelled(id.to_string()));
        }
        sqlx::query("UPDATE specs SET manual_status = ?, updated_at = ? WHERE id = ?")
            .bind(manual_status_to_str(SpecManualStatus::Cancelled))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        self.fetch_view(id).await?.ok_or_else(|| CoordError::spec_not_found(id))
    }

    async fn reopen(&self, id: &str) -> Result<SpecView> {
        let view = self
            .fetch_view(id)
            .await?
            .ok_or_else(|| CoordError::spec_not_found(id))?;
        if view.spec.manual_status != Some(SpecManualStatus::Cancelled) {
            return Err(CoordError::SpecNotCancelled(id.to_string()));
        }
        sqlx::query("UPDATE specs SET manual_status = NULL, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        self.fetch_view(id).await?.ok_or_else(|| CoordError::spec_not_found(id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM specs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        if result.rows_affected() == 0 {
            return Err(CoordError::spec_not_found(id));
        }
        Ok(())
    }
}

/// Shared implementation of [`DependencyGraphRepository`] for both the
/// task graph and the spec graph, which differ only in which table they
/// read and write (spec.md states the two graphs have identical
/// semantics).
#[derive(Clone)]
pub struct SqliteDependencyGraphRepository {
    pool: SqlitePool,
    kind: GraphKind,
    table: &'static str,
}

impl SqliteDependencyGraphRepository {
    pub fn for_tasks(pool: SqlitePool) -> Self {
        Self {
            pool,
            kind: GraphKind::Task,
            table: "task_dependencies",
        }
    }

    pub fn for_specs(pool: SqlitePool) -> Self {
        Self {
            pool,
            kind: GraphKind::Spec,
            table: "spec_dependencies",
        }
    }
}

/// Looks up parents by querying a live connection, used both standalone
/// and inside the transaction backing [`SqliteDependencyGraphRepository::add_dependency`].
struct ConnParentLookup<'a> {
    conn: tokio::sync::Mutex<&'a mut sqlx::SqliteConnection>,
    table: &'static str,
}

#[async_trait]
impl ParentLookup for ConnParentLookup<'_> {
    async fn parents(&self, node: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT parent_id FROM {} WHERE child_id = ?", self.table);
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(&sql)
            .bind(node)
            .fetch_all(&mut **conn)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        Ok(rows.iter().map(|r| r.get::<String, _>("parent_id")).collect())
    }
}

#[async_trait]
impl DependencyGraphRepository for SqliteDependencyGraphRepository {
    fn kind(&self) -> GraphKind {
        self.kind
    }

    async fn add_dependency(&self, child_id: &str, parent_id: &str) -> Result<()> {
        if child_id == parent_id {
            return Err(CoordError::validation("self-dependency"));
        }
        let mut conn = self.pool.acquire().await.map_err(sqlx_error_to_coord_error)?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        let cycle_check = {
            let lookup = ConnParentLookup {
                conn: tokio::sync::Mutex::new(&mut conn),
                table: self.table,
            };
            check_no_cycle(&lookup, child_id, parent_id).await
        };

        if let Err(e) = cycle_check {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e);
        }

        let sql = format!(
            "INSERT OR IGNORE INTO {} (child_id, parent_id) VALUES (?, ?)",
            self.table
        );
        let insert = sqlx::query(&sql)
            .bind(child_id)
            .bind(parent_id)
            .execute(&mut *conn)
            .await;

        match insert {
            Ok(_) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(sqlx_error_to_coord_error)?;
                Ok(())
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(sqlx_error_to_coord_error(e))
            }
        }
    }

    async fn remove_dependency(&self, child_id: &str, parent_id: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE child_id = ? AND parent_id = ?",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(child_id)
            .bind(parent_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        if result.rows_affected() == 0 {
            return Err(CoordError::DependencyNotFound {
                child_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_parents(&self, node_id: &str) -> Result<Vec<DependencyEdge>> {
        let sql = format!("SELECT child_id, parent_id FROM {} WHERE child_id = ?", self.table);
        let rows = sqlx::query(&sql)
            .bind(node_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        Ok(rows
            .iter()
            .map(|r| DependencyEdge {
                child_id: r.get("child_id"),
                parent_id: r.get("parent_id"),
            })
            .collect())
    }

    async fn list_children(&self, node_id: &str) -> Result<Vec<DependencyEdge>> {
        let sql = format!("SELECT child_id, parent_id FROM {} WHERE parent_id = ?", self.table);
        let rows = sqlx::query(&sql)
            .bind(node_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;
        Ok(rows
            .iter()
            .map(|r| DependencyEdge {
                child_id: r.get("child_id"),
                parent_id: r.get("parent_id"),
            })
            .collect())
    }
}

/// Append-only audit trail. Write failures are logged and swallowed:
/// callers of [`AuditRepository::append`] never see an error from a
/// logging failure, matching the best-effort policy in spec.md §4.5.
#[derive(Clone)]
pub struct SqliteAuditLog {
    pool: SqlitePool,
}

impl SqliteAuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditLog {
    async fn append(&self, entry: NewAuditEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (task_id, action, field, old_value, new_value, changed_at, changed_by)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.task_id)
        .bind(entry.action.to_string())
        .bind(&entry.field)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(Utc::now())
        .bind(&entry.changed_by)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::error!(task_id = %entry.task_id, action = %entry.action, error = %err, "audit log write failed");
        }
    }

    async fn list_by_task(&self, task_id: &str, pagination: Pagination) -> Result<Page<AuditEntry>> {
        self.query_filtered(Some(task_id), AuditFilter::default(), pagination)
            .await
    }

    async fn query(&self, filter: AuditFilter, pagination: Pagination) -> Result<Page<AuditEntry>> {
        self.query_filtered(None, filter, pagination).await
    }
}

impl SqliteAuditLog {
    async fn query_filtered(
        &self,
        task_id: Option<&str>,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<Page<AuditEntry>> {
        let where_clause = |builder: &mut sqlx::QueryBuilder<sqlx::Sqlite>| {
            let mut has_where = false;
            if let Some(task_id) = task_id {
                builder.push(" WHERE task_id = ");
                builder.push_bind(task_id.to_string());
                has_where = true;
            }
            if let Some(action) = filter.action {
                builder.push(if has_where { " AND " } else { " WHERE " });
                builder.push("action = ");
                builder.push_bind(action.to_string());
                has_where = true;
            }
            if let Some(agent) = &filter.agent {
                builder.push(if has_where { " AND " } else { " WHERE " });
                builder.push("changed_by = ");
                builder.push_bind(agent.clone());
                has_where = true;
            }
            if let Some(start) = filter.start {
                builder.push(if has_where { " AND " } else { " WHERE " });
                builder.push("changed_at >= ");
                builder.push_bind(start);
                has_where = true;
            }
            if let Some(end) = filter.end {
                builder.push(if has_where { " AND " } else { " WHERE " });
                builder.push("changed_at <= ");
                builder.push_bind(end);
            }
        };

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("SELECT * FROM audit_log");
        where_clause(&mut builder);
        builder.push(" ORDER BY id DESC LIMIT ");
        builder.push_bind(pagination.per_page as i64);
        builder.push(" OFFSET ");
        builder.push_bind(pagination.offset() as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        let data = rows
            .iter()
            .map(|row| {
                let action_str: String = row.get("action");
                let action = parse_audit_action(&action_str)?;
                Ok(AuditEntry {
                    id: row.get("id"),
                    task_id: row.get("task_id"),
                    action,
                    field: row.get("field"),
                    old_value: row.get("old_value"),
                    new_value: row.get("new_value"),
                    changed_at: row.get("changed_at"),
                    changed_by: row.get("changed_by"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut count_builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM audit_log");
        where_clause(&mut count_builder);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_coord_error)?;

        Ok(Page {
            data,
            page: pagination.page,
            per_page: pagination.per_page,
            total: total as u64,
        })
    }
}

fn parse_audit_action(s: &str) -> Result<airyra_core::models::AuditAction> {
    use airyra_core::models::AuditAction::*;
    Ok(match s {
        "create" => Create,
        "update" => Update,
        "delete" => Delete,
        "claim" => Claim,
        "done" => Done,
        "release" => Release,
        "block" => Block,
        "unblock" => Unblock,
        "add_dependency" => AddDependency,
        "remove_dependency" => RemoveDependency,
        other => {
            return Err(CoordError::Internal(format!(
                "invalid audit action in store: {other}"
            )))
        }
    })
}

use crate::sqlite::{
    SqliteAuditLog, SqliteDependencyGraphRepository, SqliteSpecRepository, SqliteTaskRepository,
};
use airyra_core::error::{CoordError, Result};
use airyra_core::repository::{
    AuditRepository, DependencyGraphRepository, ProjectHandle, SpecRepository, StoreManager,
    TaskRepository,
};
use parking_lot::RwLock;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// One project's store: a connection pool plus the repository
/// implementations sharing it.
pub struct ProjectStore {
    tasks: Arc<SqliteTaskRepository>,
    specs: Arc<SqliteSpecRepository>,
    task_graph: Arc<SqliteDependencyGraphRepository>,
    spec_graph: Arc<SqliteDependencyGraphRepository>,
    audit: Arc<SqliteAuditLog>,
    pool: SqlitePool,
}

impl ProjectHandle for ProjectStore {
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

/// Opens, migrates, and caches one SQLite-backed [`ProjectStore`] per
/// project name, per spec.md §4.1. Uses double-checked locking: an
/// uncontended `get()` only takes the read lock.
pub struct SqliteStoreManager {
    base_dir: PathBuf,
    stores: RwLock<HashMap<String, Arc<ProjectStore>>>,
}

impl SqliteStoreManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            stores: RwLock::new(HashMap::new()),
        }
    }

    fn db_path(&self, project: &str) -> PathBuf {
        self.base_dir.join(format!("{project}.db"))
    }

    async fn open(&self, project: &str) -> Result<Arc<ProjectStore>> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| CoordError::Internal(format!("failed to create projects dir: {e}")))?;

        let path = self.db_path(project);
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| CoordError::Internal(format!("failed to open project store: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| CoordError::Internal(format!("migration failed: {e}")))?;

        let audit = Arc::new(SqliteAuditLog::new(pool.clone()));
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone(), audit.clone()));
        let specs = Arc::new(SqliteSpecRepository::new(pool.clone()));
        let task_graph = Arc::new(SqliteDependencyGraphRepository::for_tasks(pool.clone()));
        let spec_graph = Arc::new(SqliteDependencyGraphRepository::for_specs(pool.clone()));

        Ok(Arc::new(ProjectStore {
            tasks,
            specs,
            task_graph,
            spec_graph,
            audit,
            pool,
        }))
    }
}

#[async_trait::async_trait]
impl StoreManager for SqliteStoreManager {
    async fn get(&self, project: &str) -> Result<Arc<dyn ProjectHandle>> {
        airyra_core::validation::Validator::validate_project_name(project)?;

        if let Some(store) = self.stores.read().get(project) {
            return Ok(store.clone() as Arc<dyn ProjectHandle>);
        }

        let store = self.open(project).await?;

        let mut stores = self.stores.write();
        let store = stores.entry(project.to_string()).or_insert(store).clone();
        Ok(store as Arc<dyn ProjectHandle>)
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.base_dir)
            .map_err(|e| CoordError::Internal(format!("failed to list projects dir: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| CoordError::Internal(e.to_string()))?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(project) = name.strip_suffix(".db") {
                    names.push(project.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn close(&self) -> Result<()> {
        let stores = std::mem::take(&mut *self.stores.write());
        for (name, store) in stores {
            tracing::info!(project = %name, "closing project store");
            store.pool.close().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_creates_the_store_directory_and_db_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SqliteStoreManager::new(dir.path());
        let handle = manager.get("demo").await.unwrap();
        assert!(dir.path().join("demo.db").exists());
        handle.tasks().list(Default::default(), Default::default()).await.unwrap();
    }

    #[tokio::test]
    async fn get_is_idempotent_and_returns_the_same_handle() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SqliteStoreManager::new(dir.path());
        let a = manager.get("demo").await.unwrap();
        let b = manager.get("demo").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn list_enumerates_db_files_even_before_get_is_called_this_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("preexisting.db"), b"").unwrap();
        let manager = SqliteStoreManager::new(dir.path());
        let names = manager.list().await.unwrap();
        assert_eq!(names, vec!["preexisting".to_string()]);
    }

    #[tokio::test]
    async fn rejects_project_names_with_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SqliteStoreManager::new(dir.path());
        assert!(manager.get("../escape").await.is_err());
    }
}

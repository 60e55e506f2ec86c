use airyra_core::models::{NewTask, Pagination, TaskFilter, TaskStatus};
use airyra_core::repository::TaskRepository;
use airyra_core::repository::StoreManager;
use airyra_store::SqliteStoreManager;
use std::sync::Arc;

/// Contract tests any [`TaskRepository`] implementation must satisfy.
/// Run against the SQLite store here; the `mocks` crate's in-memory fake
/// is checked against the same contract in its own test module.
async fn run_contract(repo: Arc<dyn TaskRepository>) {
    let created = repo
        .create(NewTask {
            title: "Contract task".to_string(),
            description: Some("exercises the shared contract".to_string()),
            priority: Some(2),
            parent_task_id: None,
            spec_id: None,
        })
        .await
        .unwrap();
    assert_eq!(created.status, TaskStatus::Open);
    assert_eq!(created.priority, 2);

    let fetched = repo.get(&created.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);

    let missing = repo.get("tk-does-not-exist").await.unwrap();
    assert!(missing.is_none());

    let page = repo
        .list(TaskFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert!(page.data.iter().any(|t| t.id == created.id));

    let claimed = repo.claim(&created.id, "agent-a").await.unwrap();
    assert_eq!(claimed.claimed_by.as_deref(), Some("agent-a"));

    let not_owner = repo.complete(&created.id, "agent-b").await.unwrap_err();
    assert_eq!(not_owner.code(), "NOT_OWNER");

    let done = repo.complete(&created.id, "agent-a").await.unwrap();
    assert_eq!(done.status, TaskStatus::Done);
}

#[tokio::test]
async fn sqlite_task_repository_satisfies_the_contract() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SqliteStoreManager::new(dir.path());
    let project = manager.get("contract").await.unwrap();
    run_contract(project.tasks()).await;
}

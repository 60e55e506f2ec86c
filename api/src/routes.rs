//! HTTP handlers for the task and spec surfaces (spec.md §6). Every
//! handler resolves a [`crate::state::AppState`] down to one project's
//! [`ProjectHandle`](airyra_core::repository::ProjectHandle), then calls
//! straight through to the matching repository method — no business
//! logic lives here beyond request/response shaping.

use crate::error::ApiError;
use crate::middleware::AgentId;
use crate::state::AppState;
use airyra_core::models::{
    AuditFilter, DependencyEdge, NewSpec, NewTask, Page, Pagination, Task, TaskFilter, UpdateSpec,
    UpdateTask,
};
use airyra_core::repository::ProjectHandle;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/projects", get(list_projects))
        .route("/v1/projects/:project/tasks", get(list_tasks).post(create_task))
        .route("/v1/projects/:project/tasks/ready", get(list_ready_tasks))
        .route(
            "/v1/projects/:project/tasks/:id",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/v1/projects/:project/tasks/:id/claim", post(claim_task))
        .route("/v1/projects/:project/tasks/:id/done", post(complete_task))
        .route("/v1/projects/:project/tasks/:id/release", post(release_task))
        .route("/v1/projects/:project/tasks/:id/block", post(block_task))
        .route("/v1/projects/:project/tasks/:id/unblock", post(unblock_task))
        .route(
            "/v1/projects/:project/tasks/:id/deps",
            get(list_task_deps).post(add_task_dep),
        )
        .route(
            "/v1/projects/:project/tasks/:id/deps/:parent_id",
            axum::routing::delete(remove_task_dep),
        )
        .route("/v1/projects/:project/tasks/:id/history", get(task_history))
        .route("/v1/projects/:project/audit", get(query_audit))
        .route("/v1/projects/:project/specs", get(list_specs).post(create_spec))
        .route(
            "/v1/projects/:project/specs/:id",
            get(get_spec).patch(update_spec).delete(delete_spec),
        )
        .route("/v1/projects/:project/specs/:id/cancel", post(cancel_spec))
        .route("/v1/projects/:project/specs/:id/reopen", post(reopen_spec))
        .route(
            "/v1/projects/:project/specs/:id/deps",
            get(list_spec_deps).post(add_spec_dep),
        )
        .route(
            "/v1/projects/:project/specs/:id/deps/:parent_id",
            axum::routing::delete(remove_spec_dep),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let names = state.store.list().await?;
    Ok(Json(json!(names)))
}

async fn project(state: &AppState, name: &str) -> Result<Arc<dyn ProjectHandle>, ApiError> {
    Ok(state.store.get(name).await?)
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

impl PageQuery {
    fn pagination(&self) -> Pagination {
        Pagination::clamp(self.page.unwrap_or(1), self.per_page.unwrap_or(0))
    }
}

fn list_envelope<T: Serialize>(page: Page<T>) -> Json<Value> {
    let total_pages = page.total_pages();
    Json(json!({
        "data": page.data,
        "pagination": {
            "page": page.page,
            "per_page": page.per_page,
            "total": page.total,
            "total_pages": total_pages,
        }
    }))
}

#[derive(Debug, Deserialize)]
struct TaskListQuery {
    status: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Value>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let status = query
        .status
        .as_deref()
        .map(airyra_core::models::TaskStatus::from_str)
        .transpose()?;
    let filter = TaskFilter { status, spec_id: None };
    let pagination = Pagination::clamp(query.page.unwrap_or(1), query.per_page.unwrap_or(0));
    let page = handle.tasks().list(filter, pagination).await?;
    Ok(list_envelope(page))
}

async fn list_ready_tasks(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let page = handle.tasks().list_ready(query.pagination()).await?;
    Ok(list_envelope(page))
}

#[derive(Debug, Deserialize)]
struct CreateTaskBody {
    title: String,
    description: Option<String>,
    priority: Option<u8>,
    parent_id: Option<String>,
    spec_id: Option<String>,
}

async fn create_task(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle
        .tasks()
        .create(NewTask {
            title: body.title,
            description: body.description,
            priority: body.priority,
            parent_task_id: body.parent_id,
            spec_id: body.spec_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<Json<Task>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle
        .tasks()
        .get(&id)
        .await?
        .ok_or_else(|| airyra_core::error::CoordError::task_not_found(&id))?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct UpdateTaskBody {
    title: Option<String>,
    description: Option<String>,
    priority: Option<u8>,
}

async fn update_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Json(body): Json<UpdateTaskBody>,
) -> Result<Json<Task>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle
        .tasks()
        .update(
            &id,
            UpdateTask {
                title: body.title,
                description: body.description,
                priority: body.priority,
            },
        )
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let handle = project(&state, &project_name).await?;
    handle.tasks().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn claim_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Extension(agent): Extension<AgentId>,
) -> Result<Json<Task>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle.tasks().claim(&id, &agent.0).await?;
    Ok(Json(task))
}

async fn complete_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Extension(agent): Extension<AgentId>,
) -> Result<Json<Task>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle.tasks().complete(&id, &agent.0).await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct ReleaseQuery {
    #[serde(default)]
    force: bool,
}

async fn release_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Extension(agent): Extension<AgentId>,
    Query(query): Query<ReleaseQuery>,
) -> Result<Json<Task>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle.tasks().release(&id, &agent.0, query.force).await?;
    Ok(Json(task))
}

async fn block_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Extension(agent): Extension<AgentId>,
) -> Result<Json<Task>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle.tasks().block(&id, &agent.0).await?;
    Ok(Json(task))
}

async fn unblock_task(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<Json<Task>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let task = handle.tasks().unblock(&id).await?;
    Ok(Json(task))
}

async fn list_task_deps(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<Json<Vec<DependencyEdge>>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let parents = handle.task_graph().list_parents(&id).await?;
    Ok(Json(parents))
}

#[derive(Debug, Deserialize)]
struct AddDepBody {
    parent_id: String,
}

async fn add_task_dep(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Json(body): Json<AddDepBody>,
) -> Result<StatusCode, ApiError> {
    let handle = project(&state, &project_name).await?;
    handle.task_graph().add_dependency(&id, &body.parent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_task_dep(
    State(state): State<AppState>,
    Path((project_name, id, parent_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let handle = project(&state, &project_name).await?;
    handle.task_graph().remove_dependency(&id, &parent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn task_history(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let page = handle.audit().list_by_task(&id, query.pagination()).await?;
    Ok(list_envelope(page))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    action: Option<String>,
    agent: Option<String>,
    start: Option<chrono::DateTime<chrono::Utc>>,
    end: Option<chrono::DateTime<chrono::Utc>>,
    page: Option<u32>,
    per_page: Option<u32>,
}

async fn query_audit(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let action = query
        .action
        .as_deref()
        .map(airyra_core::models::AuditAction::from_str)
        .transpose()?;
    let filter = AuditFilter {
        action,
        agent: query.agent,
        start: query.start,
        end: query.end,
    };
    let pagination = Pagination::clamp(query.page.unwrap_or(1), query.per_page.unwrap_or(0));
    let page = handle.audit().query(filter, pagination).await?;
    Ok(list_envelope(page))
}

async fn list_specs(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let page = handle.specs().list(query.pagination()).await?;
    Ok(list_envelope(page))
}

#[derive(Debug, Deserialize)]
struct CreateSpecBody {
    title: String,
    description: Option<String>,
}

async fn create_spec(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
    Json(body): Json<CreateSpecBody>,
) -> Result<(StatusCode, Json<airyra_core::models::Spec>), ApiError> {
    let handle = project(&state, &project_name).await?;
    let spec = handle
        .specs()
        .create(NewSpec {
            title: body.title,
            description: body.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(spec)))
}

async fn get_spec(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<Json<airyra_core::models::SpecView>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let spec = handle
        .specs()
        .get(&id)
        .await?
        .ok_or_else(|| airyra_core::error::CoordError::spec_not_found(&id))?;
    Ok(Json(spec))
}

#[derive(Debug, Deserialize)]
struct UpdateSpecBody {
    title: Option<String>,
    description: Option<String>,
}

async fn update_spec(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Json(body): Json<UpdateSpecBody>,
) -> Result<Json<airyra_core::models::Spec>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let spec = handle
        .specs()
        .update(
            &id,
            UpdateSpec {
                title: body.title,
                description: body.description,
            },
        )
        .await?;
    Ok(Json(spec))
}

async fn delete_spec(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let handle = project(&state, &project_name).await?;
    handle.specs().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_spec(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<Json<airyra_core::models::SpecView>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let spec = handle.specs().cancel(&id).await?;
    Ok(Json(spec))
}

async fn reopen_spec(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<Json<airyra_core::models::SpecView>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let spec = handle.specs().reopen(&id).await?;
    Ok(Json(spec))
}

async fn list_spec_deps(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
) -> Result<Json<Vec<DependencyEdge>>, ApiError> {
    let handle = project(&state, &project_name).await?;
    let parents = handle.spec_graph().list_parents(&id).await?;
    Ok(Json(parents))
}

async fn add_spec_dep(
    State(state): State<AppState>,
    Path((project_name, id)): Path<(String, String)>,
    Json(body): Json<AddDepBody>,
) -> Result<StatusCode, ApiError> {
    let handle = project(&state, &project_name).await?;
    handle.spec_graph().add_dependency(&id, &body.parent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_spec_dep(
    State(state): State<AppState>,
    Path((project_name, id, parent_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let handle = project(&state, &project_name).await?;
    handle.spec_graph().remove_dependency(&id, &parent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airyra_mocks::MockStoreManager;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = AppState::new(Arc::new(MockStoreManager::new()));
        router()
            .layer(axum::middleware::from_fn(crate::middleware::agent_id_middleware))
            .with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok_status() {
        let app = test_app();
        let response = app
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn create_then_list_tasks_round_trips() {
        let app = test_app();
        let create_request = Request::builder()
            .method("POST")
            .uri("/v1/projects/demo/tasks")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "title": "write docs" }).to_string()))
            .unwrap();
        let created = app.clone().oneshot(create_request).await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let list_request = Request::builder()
            .uri("/v1/projects/demo/tasks")
            .body(Body::empty())
            .unwrap();
        let listed = app.oneshot(list_request).await.unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
        let body = body_json(listed).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn get_missing_task_returns_404_with_error_envelope() {
        let app = test_app();
        let request = Request::builder()
            .uri("/v1/projects/demo/tasks/tk-missing")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn release_without_force_requires_ownership() {
        let app = test_app();
        let created = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/projects/demo/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "title": "ship it" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let task: Task = serde_json::from_slice(&created.into_body().collect().await.unwrap().to_bytes()).unwrap();

        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/projects/demo/tasks/{}/claim", task.id))
                    .header("X-Airyra-Agent", "agent-a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let denied = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/projects/demo/tasks/{}/release", task.id))
                    .header("X-Airyra-Agent", "agent-b")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let forced = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/projects/demo/tasks/{}/release?force=true", task.id))
                    .header("X-Airyra-Agent", "agent-b")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(forced.status(), StatusCode::OK);
    }
}

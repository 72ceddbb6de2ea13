//! JSON API routes.

use crate::catalog::WorkflowCatalog;
use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use nodeflow_core::{ParseIdError, WorkflowId, WorkflowRunId};
use nodeflow_workflow::{RunController, RunLifecycle, RunSnapshot, RunStatus, WorkflowSummary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    controller: RunController,
    catalog: Arc<WorkflowCatalog>,
}

impl AppState {
    /// Creates the state from a controller and the loaded workflows.
    #[must_use]
    pub fn new(controller: RunController, catalog: WorkflowCatalog) -> Self {
        Self {
            controller,
            catalog: Arc::new(catalog),
        }
    }

    /// The run controller.
    #[must_use]
    pub fn controller(&self) -> &RunController {
        &self.controller
    }
}

/// Creates the API router with state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workflows", get(list_workflows))
        .route("/workflows/{id}/runs", post(start_run))
        .route("/workflows/{id}/lifecycle", get(workflow_lifecycle))
        .route("/runs/{id}", get(poll_run))
        .route("/runs/{id}/stop", post(stop_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    run_id: WorkflowRunId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopResponse {
    status: RunStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LifecycleResponse {
    workflow_id: WorkflowId,
    lifecycle: RunLifecycle,
    active_run: Option<WorkflowRunId>,
}

/// Query of `GET /runs/{id}`.
#[derive(Debug, Default, Deserialize)]
struct PollQuery {
    /// Number of log entries the caller already has.
    since: Option<usize>,
}

fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = ParseIdError>,
{
    raw.parse().map_err(|e: ParseIdError| ApiError::InvalidId {
        id: raw.to_string(),
        reason: e.reason,
    })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"status": "ok", "workflows": state.catalog.len()}))
}

async fn list_workflows(State(state): State<AppState>) -> Json<Vec<WorkflowSummary>> {
    Json(state.catalog.summaries())
}

async fn start_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    let workflow_id: WorkflowId = parse_id(&id)?;
    let workflow = state
        .catalog
        .get(&workflow_id)
        .ok_or(ApiError::WorkflowNotFound { id: workflow_id })?;

    let run_id = state.controller.start(workflow)?;
    Ok((StatusCode::ACCEPTED, Json(StartResponse { run_id })))
}

async fn workflow_lifecycle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    let workflow_id: WorkflowId = parse_id(&id)?;
    if state.catalog.get(&workflow_id).is_none() {
        return Err(ApiError::WorkflowNotFound { id: workflow_id });
    }

    Ok(Json(LifecycleResponse {
        workflow_id,
        lifecycle: state.controller.lifecycle(workflow_id),
        active_run: state.controller.active_run(workflow_id),
    }))
}

async fn poll_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Json<RunSnapshot>, ApiError> {
    let run_id: WorkflowRunId = parse_id(&id)?;
    let snapshot = match query.since {
        Some(offset) => state.controller.poll_since(run_id, offset)?,
        None => state.controller.poll(run_id)?,
    };
    Ok(Json(snapshot))
}

async fn stop_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let run_id: WorkflowRunId = parse_id(&id)?;
    let status = state.controller.stop(run_id).await?;
    Ok(Json(StopResponse { status }))
}

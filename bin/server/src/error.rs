//! Domain error types for server operations.
//!
//! - `CatalogError`: loading workflow definitions from disk
//! - `ApiError`: request failures, mapped to HTTP status codes

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nodeflow_core::WorkflowId;
use nodeflow_workflow::RunError;
use rootcause::prelude::Report;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;

/// Errors from loading the workflow catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The workflows directory could not be listed.
    ReadDir { path: PathBuf, reason: String },
    /// A workflow file could not be read.
    ReadFile { path: PathBuf, reason: String },
    /// A workflow file is not a valid definition.
    Parse { path: PathBuf, reason: String },
    /// Two files define the same workflow id.
    DuplicateId { id: WorkflowId, path: PathBuf },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadDir { path, reason } => {
                write!(f, "failed to list '{}': {reason}", path.display())
            }
            Self::ReadFile { path, reason } => {
                write!(f, "failed to read '{}': {reason}", path.display())
            }
            Self::Parse { path, reason } => {
                write!(f, "invalid workflow in '{}': {reason}", path.display())
            }
            Self::DuplicateId { id, path } => {
                write!(f, "workflow {id} in '{}' is already defined", path.display())
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Errors returned by API handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No workflow with this id is loaded.
    WorkflowNotFound { id: WorkflowId },
    /// A path parameter is not a valid id.
    InvalidId { id: String, reason: String },
    /// The run controller rejected the request.
    Run(RunError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { id } => write!(f, "workflow {id} not found"),
            Self::InvalidId { id, reason } => write!(f, "invalid id '{id}': {reason}"),
            Self::Run(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::WorkflowNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidId { .. } => StatusCode::BAD_REQUEST,
            Self::Run(RunError::AlreadyRunning { .. }) => StatusCode::CONFLICT,
            Self::Run(RunError::InvalidGraph { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Run(RunError::RunNotFound { .. }) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<Report<RunError>> for ApiError {
    fn from(report: Report<RunError>) -> Self {
        tracing::debug!(error = %report, "run request rejected");
        Self::Run(report.current_context().clone())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

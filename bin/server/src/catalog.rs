//! Workflow catalog.
//!
//! Workflow definitions are read once at startup from a directory of JSON
//! files. Files without the `.json` extension are ignored.

use crate::error::CatalogError;
use nodeflow_core::{Result, WorkflowId};
use nodeflow_workflow::{Workflow, WorkflowSummary};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Workflows available to run, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    workflows: BTreeMap<WorkflowId, Workflow>,
}

impl WorkflowCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a workflow, replacing any with the same id.
    #[must_use]
    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflows.insert(workflow.id, workflow);
        self
    }

    /// Loads every `*.json` file in `dir`.
    ///
    /// A missing directory yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be read, a file is
    /// not a valid workflow, or two files share an id.
    pub async fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            tracing::warn!(path = %dir.display(), "workflows directory not found");
            return Ok(Self::new());
        }

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| CatalogError::ReadDir {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CatalogError::ReadDir {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| CatalogError::ReadFile {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            let workflow: Workflow =
                serde_json::from_slice(&bytes).map_err(|e| CatalogError::Parse {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;

            if catalog.workflows.contains_key(&workflow.id) {
                return Err(CatalogError::DuplicateId {
                    id: workflow.id,
                    path,
                }
                .into());
            }

            tracing::info!(
                workflow_id = %workflow.id,
                name = %workflow.name(),
                path = %path.display(),
                "loaded workflow"
            );
            catalog.workflows.insert(workflow.id, workflow);
        }

        Ok(catalog)
    }

    /// Returns a workflow by id.
    #[must_use]
    pub fn get(&self, id: &WorkflowId) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    /// Summaries of every workflow, ordered by id.
    #[must_use]
    pub fn summaries(&self) -> Vec<WorkflowSummary> {
        self.workflows.values().map(WorkflowSummary::from).collect()
    }

    /// Number of workflows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    /// Returns true if no workflows are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

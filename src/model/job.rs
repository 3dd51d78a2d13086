//! Job records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::AgentState;

/// Shape of a workflow: one prompt chain, or a fan-out producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Sequence,
    Parallel,
}

/// A persisted workflow job.
///
/// Created by the job-submission flow (or, for children, by the parallel
/// handler) and mutated exclusively by the engine handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Workflow definition file this job executes.
    pub workflow_path: PathBuf,
    /// Remote agent id, set once the agent is launched.
    pub agent_id: Option<String>,
    pub model: String,
    pub repository: String,
    pub status: AgentState,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Non-None marks a fan-out child.
    pub parent_id: Option<Uuid>,
    /// Extracted or bound data, JSON-encoded when structured.
    pub result: Option<String>,
    /// None on legacy rows persisted before kinds were stored.
    pub workflow_kind: Option<WorkflowKind>,
    pub timeout_millis: Option<i64>,
    /// Reset on each launch; the timeout clock measures from here.
    pub workflow_start_time: Option<DateTime<Utc>>,
    /// Fallback prompt source, relative to the workflow directory.
    pub fallback_src: Option<PathBuf>,
    pub fallback_executed: bool,
}

impl Job {
    /// Create a fresh, unlaunched job.
    pub fn new(workflow_path: PathBuf, model: impl Into<String>, repository: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_path,
            agent_id: None,
            model: model.into(),
            repository: repository.into(),
            status: AgentState::Creating,
            created_at: now,
            last_update: now,
            parent_id: None,
            result: None,
            workflow_kind: None,
            timeout_millis: None,
            workflow_start_time: None,
            fallback_src: None,
            fallback_executed: false,
        }
    }

    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.workflow_kind = Some(kind);
        self
    }

    pub fn with_timeout(mut self, timeout_millis: i64) -> Self {
        self.timeout_millis = Some(timeout_millis);
        self
    }

    pub fn with_fallback(mut self, fallback_src: PathBuf) -> Self {
        self.fallback_src = Some(fallback_src);
        self
    }

    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Bump the modification timestamp. Call before saving a mutation.
    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}

//! Workflow descriptions — the parsed, read-only view of a workflow file.
//!
//! Parsing and validation of workflow files live outside this crate; the
//! engine consumes the typed description through the `WorkflowParser` seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::WorkflowError;
use crate::model::WorkflowKind;
use crate::prompts::PromptKind;

/// One prompt declared by a workflow.
#[derive(Debug, Clone)]
pub struct PromptInfo {
    /// Source path relative to the workflow directory.
    pub source_file: String,
    pub kind: PromptKind,
    /// Whether this prompt receives the job's bound value as input.
    pub has_bind_expression: bool,
}

impl PromptInfo {
    pub fn new(source_file: impl Into<String>, kind: PromptKind) -> Self {
        Self {
            source_file: source_file.into(),
            kind,
            has_bind_expression: false,
        }
    }

    pub fn with_bind(mut self) -> Self {
        self.has_bind_expression = true;
        self
    }
}

/// Prompt template for one fan-out child; the first prompt launches the
/// child's agent.
#[derive(Debug, Clone)]
pub struct ChildSequence {
    pub prompts: Vec<PromptInfo>,
}

/// Fan-out section of a parallel workflow.
#[derive(Debug, Clone)]
pub struct ParallelDescription {
    /// Prompt whose run produces the list the fan-out binds against.
    pub producer: PromptInfo,
    /// Expected result shape, e.g. `List_Integer`.
    pub bind_result_type: String,
    /// Ordered child templates, zipped (cycling) against extracted elements.
    pub children: Vec<ChildSequence>,
    /// Fallback source for the fan-out as a whole.
    pub fallback: Option<PathBuf>,
}

/// Typed description of a workflow file.
#[derive(Debug, Clone)]
pub struct WorkflowDescription {
    pub launch: PromptInfo,
    pub follow_ups: Vec<PromptInfo>,
    pub model: String,
    pub repository: String,
    pub timeout_millis: Option<i64>,
    pub fallback: Option<PathBuf>,
    pub parallel: Option<ParallelDescription>,
}

impl WorkflowDescription {
    pub fn kind(&self) -> WorkflowKind {
        if self.parallel.is_some() {
            WorkflowKind::Parallel
        } else {
            WorkflowKind::Sequence
        }
    }

    /// Launch prompt followed by the declared follow-ups, in dispatch order.
    pub fn sequence_infos(&self) -> Vec<PromptInfo> {
        let mut infos = Vec::with_capacity(1 + self.follow_ups.len());
        infos.push(self.launch.clone());
        infos.extend(self.follow_ups.iter().cloned());
        infos
    }
}

/// Parser seam for workflow files.
#[async_trait]
pub trait WorkflowParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<WorkflowDescription, WorkflowError>;

    /// Kind inference for legacy jobs persisted before kinds were stored.
    async fn determine_kind(&self, path: &Path) -> Result<WorkflowKind, WorkflowError>;
}

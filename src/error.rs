//! Error types for the workflow engine.

use std::path::PathBuf;

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Job-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Remote agent client errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent launch failed: {reason}")]
    LaunchFailed { reason: String },

    #[error("Follow-up to agent {agent_id} failed: {reason}")]
    FollowUpFailed { agent_id: String, reason: String },

    #[error("Status check for agent {agent_id} failed: {reason}")]
    StatusFailed { agent_id: String, reason: String },

    #[error("Transcript fetch for agent {agent_id} failed: {reason}")]
    TranscriptFailed { agent_id: String, reason: String },

    #[error("Delete of agent {agent_id} failed: {reason}")]
    DeleteFailed { agent_id: String, reason: String },

    #[error("Agent {agent_id} not found")]
    NotFound { agent_id: String },
}

/// Workflow-description errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Failed to parse workflow {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Workflow {path} has no parallel section")]
    MissingParallelSection { path: PathBuf },

    #[error("Job {job_id} has no launch prompt")]
    MissingLaunchPrompt { job_id: Uuid },

    #[error("Child job {job_id} matches no declared child sequence")]
    NoChildTemplate { job_id: Uuid },
}

/// Prompt file errors.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Unsupported prompt extension: {path}")]
    UnsupportedExtension { path: PathBuf },

    #[error("Prompt file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;

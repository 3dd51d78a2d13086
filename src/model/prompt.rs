//! Prompt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dispatch status of a single prompt within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    /// Not yet dispatched.
    Unknown,
    /// Dispatched; remote effect not yet observed terminal.
    Sent,
    /// Remote run for this prompt finished successfully.
    Completed,
    /// Remote run for this prompt ended in failure.
    Failed,
    /// Dispatch itself failed.
    Error,
}

/// A persisted prompt belonging to exactly one job.
///
/// Prompts are ordered by creation; the first is the launch prompt, the
/// rest are follow-ups sent one per poll pass. The ordering is immutable
/// once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub job_id: Uuid,
    /// Source path relative to the workflow directory.
    pub source_file: String,
    pub status: PromptStatus,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Prompt {
    pub fn new(job_id: Uuid, source_file: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            source_file: source_file.into(),
            status: PromptStatus::Unknown,
            created_at: now,
            last_update: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}

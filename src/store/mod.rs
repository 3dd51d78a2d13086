//! Job/prompt persistence contract.
//!
//! The store is the single source of truth; handlers re-read current state
//! at the start of each pass and hold no locks across passes. Individual
//! read/write operations are assumed serialized by the backend.

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Job, Prompt};

/// Backend-agnostic job store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All jobs that still need engine attention. What counts as
    /// unfinished is the store's call, not the engine's.
    async fn find_unfinished(&self) -> Result<Vec<Job>, StoreError>;

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Children of a fan-out parent, in stable store iteration order.
    async fn find_children(&self, parent_id: Uuid) -> Result<Vec<Job>, StoreError>;

    /// A job's prompts ordered by creation.
    async fn find_prompts(&self, job_id: Uuid) -> Result<Vec<Prompt>, StoreError>;

    /// Insert or update a job.
    async fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Insert or update a prompt.
    async fn save_prompt(&self, prompt: &Prompt) -> Result<(), StoreError>;

    async fn delete_prompts_of(&self, job_id: Uuid) -> Result<(), StoreError>;

    async fn delete_job(&self, id: Uuid) -> Result<(), StoreError>;
}

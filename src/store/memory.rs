//! In-memory job store for tests and embedders.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{AgentState, Job, Prompt, WorkflowKind};
use crate::store::JobStore;

#[derive(Default)]
struct Inner {
    // Vecs keep insertion order, which doubles as the store iteration
    // order the completion checker's tie-break depends on.
    jobs: Vec<Job>,
    prompts: Vec<Prompt>,
}

/// Insertion-ordered store backed by a `tokio` lock.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A job needs engine attention while it is active, while any of its
/// children are active, or while it is a finished parallel parent whose
/// fan-out has not been created yet.
fn is_unfinished(job: &Job, jobs: &[Job]) -> bool {
    if job.status.is_active() {
        return true;
    }
    let mut has_children = false;
    for candidate in jobs {
        if candidate.parent_id == Some(job.id) {
            has_children = true;
            if candidate.status.is_active() {
                return true;
            }
        }
    }
    job.workflow_kind == Some(WorkflowKind::Parallel)
        && job.status == AgentState::Finished
        && !has_children
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn find_unfinished(&self) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .jobs
            .iter()
            .filter(|job| is_unfinished(job, &inner.jobs))
            .cloned()
            .collect())
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn find_children(&self, parent_id: Uuid) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .jobs
            .iter()
            .filter(|j| j.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn find_prompts(&self, job_id: Uuid) -> Result<Vec<Prompt>, StoreError> {
        let inner = self.inner.read().await;
        let mut prompts: Vec<Prompt> = inner
            .prompts
            .iter()
            .filter(|p| p.job_id == job_id)
            .cloned()
            .collect();
        // Insertion order already matches creation order; the sort keeps
        // the contract explicit for equal timestamps.
        prompts.sort_by_key(|p| p.created_at);
        Ok(prompts)
    }

    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job.clone(),
            None => inner.jobs.push(job.clone()),
        }
        Ok(())
    }

    async fn save_prompt(&self, prompt: &Prompt) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.prompts.iter_mut().find(|p| p.id == prompt.id) {
            Some(existing) => *existing = prompt.clone(),
            None => inner.prompts.push(prompt.clone()),
        }
        Ok(())
    }

    async fn delete_prompts_of(&self, job_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.prompts.retain(|p| p.job_id != job_id);
        Ok(())
    }

    async fn delete_job(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.jobs.retain(|j| j.id != id);
        Ok(())
    }
}

//! Terminal-state resolution for blocking callers.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::model::{AgentState, Job, WorkflowKind};
use crate::store::JobStore;

/// Snapshot of a job's progress toward a final outcome.
///
/// `children` is always populated for parallel jobs, complete or not, so
/// callers can render progress.
#[derive(Debug, Clone)]
pub struct Completion {
    pub done: bool,
    pub outcome: AgentState,
    pub children: Vec<Job>,
}

/// Resolves whether a job (and, for parallel jobs, its whole fan-out)
/// has reached a final outcome.
pub struct CompletionChecker {
    store: Arc<dyn JobStore>,
}

impl CompletionChecker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn check(&self, job_id: Uuid) -> Result<Completion> {
        let job = self
            .store
            .find_job(job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "job".into(),
                id: job_id.to_string(),
            })?;

        // Legacy rows may not carry a kind yet; existing children are just
        // as binding as a stored Parallel kind.
        let children = self.store.find_children(job.id).await?;
        if job.workflow_kind == Some(WorkflowKind::Parallel) || !children.is_empty() {
            return Ok(check_fan_out(&job, children));
        }
        Ok(Completion {
            done: job.status.is_terminal(),
            outcome: job.status,
            children,
        })
    }
}

fn check_fan_out(job: &Job, children: Vec<Job>) -> Completion {
    let done = job.status.is_terminal() && children.iter().all(|c| c.status.is_terminal());

    // The first non-successful child wins, in store iteration order.
    let outcome = if job.status.is_successful() {
        children
            .iter()
            .find(|c| !c.status.is_successful())
            .map(|c| c.status)
            .unwrap_or(job.status)
    } else {
        job.status
    };

    Completion {
        done,
        outcome,
        children,
    }
}

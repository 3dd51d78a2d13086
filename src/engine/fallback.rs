//! Idempotent fallback-prompt dispatch.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::engine::EngineDeps;
use crate::error::Result;
use crate::model::{AgentState, Job};
use crate::prompts::{substitute_bound_value, PromptKind};
use crate::workflow::ParallelDescription;

/// Dispatches fallback prompts for timed-out jobs; each job's fallback
/// fires at most once.
pub struct FallbackExecutor {
    deps: EngineDeps,
}

impl FallbackExecutor {
    pub fn new(deps: EngineDeps) -> Self {
        Self { deps }
    }

    /// Dispatch the fallback for a single timed-out job.
    ///
    /// No-op when the job is already terminal or its fallback already ran.
    /// A missing source is a configuration error and fails the job; so
    /// does any error along the dispatch path.
    pub async fn run_single(&self, job: &mut Job, source: Option<&Path>) -> Result<()> {
        if job.status.is_terminal() || job.fallback_executed {
            debug!(job_id = %job.id, "Fallback not applicable, skipping");
            return Ok(());
        }
        let Some(source) = source else {
            warn!(job_id = %job.id, "Timeout reached but no fallback source configured");
            job.status = AgentState::Error;
            job.touch();
            self.deps.store.save_job(job).await?;
            return Ok(());
        };

        match self.dispatch(job, source).await {
            Ok(()) => {
                job.fallback_executed = true;
                job.touch();
                self.deps.store.save_job(job).await?;
                Ok(())
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Fallback dispatch failed");
                job.status = AgentState::Error;
                job.touch();
                self.deps.store.save_job(job).await?;
                Ok(())
            }
        }
    }

    /// Dispatch the fan-out fallback to every still-unfinished child.
    ///
    /// No-op when the parent's fallback already ran. Children whose own
    /// fallback already ran are skipped; failures isolate per child. The
    /// parent's flag flips once dispatch to every eligible child has been
    /// attempted.
    pub async fn run_for_children(
        &self,
        parent: &mut Job,
        parallel: &ParallelDescription,
    ) -> Result<()> {
        if parent.fallback_executed {
            debug!(job_id = %parent.id, "Fan-out fallback already executed, skipping");
            return Ok(());
        }
        let Some(source) = parallel.fallback.as_deref() else {
            warn!(job_id = %parent.id, "Fan-out timed out but no fallback source configured");
            if !parent.status.is_failed() {
                parent.status = AgentState::Error;
                parent.touch();
                self.deps.store.save_job(parent).await?;
            }
            return Ok(());
        };

        let children = self.deps.store.find_children(parent.id).await?;
        for mut child in children {
            if child.status.is_terminal() || child.fallback_executed {
                continue;
            }
            match self.dispatch(&mut child, source).await {
                Ok(()) => {
                    child.fallback_executed = true;
                    child.touch();
                    self.deps.store.save_job(&child).await?;
                }
                Err(e) => {
                    error!(job_id = %child.id, error = %e, "Child fallback dispatch failed");
                    child.status = AgentState::Error;
                    child.touch();
                    self.deps.store.save_job(&child).await?;
                }
            }
        }

        parent.fallback_executed = true;
        parent.touch();
        self.deps.store.save_job(parent).await?;
        info!(job_id = %parent.id, "Fan-out fallback dispatched");
        Ok(())
    }

    /// Read the fallback prompt and send it: follow-up when the agent is
    /// launched, fresh launch (with pull-request creation) otherwise.
    async fn dispatch(&self, job: &mut Job, source: &Path) -> Result<()> {
        PromptKind::from_path(source)?;
        let raw = self
            .deps
            .prompts
            .read(&job.workflow_path, &source.to_string_lossy())
            .await?;
        let text = match &job.result {
            Some(value) => substitute_bound_value(&raw, value),
            None => raw,
        };

        match job.agent_id.clone() {
            Some(agent_id) => {
                self.deps.agent.follow_up(&agent_id, &text).await?;
                job.status = AgentState::Running;
            }
            None => {
                let agent_id = self
                    .deps
                    .agent
                    .launch(&text, &job.model, &job.repository, true)
                    .await?;
                job.agent_id = Some(agent_id);
                job.status = AgentState::Creating;
            }
        }
        // The dispatch restarts the timeout clock.
        if job.timeout_millis.is_some() {
            job.workflow_start_time = Some(Utc::now());
        }
        info!(job_id = %job.id, source = %source.display(), "Fallback prompt dispatched");
        Ok(())
    }
}

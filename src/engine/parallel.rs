//! Parallel workflow handling — fan-out/fan-in coordination.

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::extract::ResultExtractor;
use crate::engine::fallback::FallbackExecutor;
use crate::engine::sequence::SequenceHandler;
use crate::engine::timeout::TimeoutTracker;
use crate::engine::EngineDeps;
use crate::error::{Result, WorkflowError};
use crate::model::{AgentState, Job, Prompt, WorkflowKind};
use crate::workflow::{ParallelDescription, WorkflowDescription};

/// Drives a parallel workflow's parent job: produce a result, fan out one
/// child per extracted element, and watch the fan-out level timeout.
pub struct ParallelHandler {
    deps: EngineDeps,
    timeouts: TimeoutTracker,
    fallback: FallbackExecutor,
    sequence: SequenceHandler,
    extractor: ResultExtractor,
}

impl ParallelHandler {
    pub fn new(deps: EngineDeps, timeouts: TimeoutTracker) -> Self {
        Self {
            fallback: FallbackExecutor::new(deps.clone()),
            sequence: SequenceHandler::new(deps.clone(), timeouts),
            extractor: ResultExtractor::new(deps.clone()),
            deps,
            timeouts,
        }
    }

    pub async fn process(
        &self,
        job: &mut Job,
        description: &WorkflowDescription,
        prompts: &mut [Prompt],
    ) -> Result<()> {
        let Some(parallel) = description.parallel.as_ref() else {
            return Err(WorkflowError::MissingParallelSection {
                path: job.workflow_path.clone(),
            }
            .into());
        };

        if !job.status.is_terminal() {
            // The parent behaves like a single-prompt sequence that only
            // produces data, never a patch.
            let infos = [parallel.producer.clone()];
            self.sequence
                .step(job, description, &infos, prompts, false)
                .await?;
        }

        if job.status == AgentState::Finished {
            let children = self.deps.store.find_children(job.id).await?;
            if children.is_empty() {
                return self.spawn_children(job, parallel).await;
            }
            self.check_fan_out_timeout(job, parallel, &children).await?;
        }
        Ok(())
    }

    /// Turn the parent's extracted result into one child job per element.
    async fn spawn_children(&self, job: &mut Job, parallel: &ParallelDescription) -> Result<()> {
        let values = self.extractor.extract(job, parallel).await?;
        if values.is_empty() || parallel.children.is_empty() {
            warn!(job_id = %job.id, "Parent finished without a usable fan-out result");
            job.status = AgentState::Error;
            job.touch();
            self.deps.store.save_job(job).await?;
            return Ok(());
        }

        for (i, value) in values.iter().enumerate() {
            let template = &parallel.children[i % parallel.children.len()];
            let mut child = Job::new(
                job.workflow_path.clone(),
                job.model.clone(),
                job.repository.clone(),
            )
            .with_kind(WorkflowKind::Sequence);
            child.parent_id = Some(job.id);
            child.status = AgentState::Creating;
            child.result = Some(bind_literal(value));
            self.deps.store.save_job(&child).await?;
            for info in &template.prompts {
                self.deps
                    .store
                    .save_prompt(&Prompt::new(child.id, info.source_file.clone()))
                    .await?;
            }
            info!(
                parent_id = %job.id,
                child_id = %child.id,
                bound = %child.result.as_deref().unwrap_or_default(),
                "Spawned fan-out child"
            );
        }

        // The fan-out level timeout measures from the moment the children
        // exist, not from the parent's original launch.
        if job.timeout_millis.is_some() {
            job.workflow_start_time = Some(Utc::now());
            job.touch();
            self.deps.store.save_job(job).await?;
        }
        info!(job_id = %job.id, children = values.len(), "Fan-out created");
        Ok(())
    }

    async fn check_fan_out_timeout(
        &self,
        job: &mut Job,
        parallel: &ParallelDescription,
        children: &[Job],
    ) -> Result<()> {
        if job.fallback_executed || job.timeout_millis.is_none() {
            return Ok(());
        }
        if children.iter().all(|c| c.status.is_terminal()) {
            return Ok(());
        }
        if self.timeouts.reached(job) {
            info!(job_id = %job.id, "Fan-out timeout reached, running child fallback");
            self.fallback.run_for_children(job, parallel).await?;
        }
        Ok(())
    }
}

/// Literal text a child binds against: strings bind raw, everything else
/// binds as compact JSON.
fn bind_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

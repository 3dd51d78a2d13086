//! Job dispatcher — routes each unfinished job to its shape handler.

use tracing::{debug, error};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::child::ChildHandler;
use crate::engine::parallel::ParallelHandler;
use crate::engine::sequence::SequenceHandler;
use crate::engine::timeout::TimeoutTracker;
use crate::engine::EngineDeps;
use crate::error::Result;
use crate::model::WorkflowKind;

/// Entry point for each polling pass.
///
/// Holds no state between passes beyond its collaborators; everything is
/// re-read from the store, so repeated invocation is safe.
pub struct Dispatcher {
    deps: EngineDeps,
    sequence: SequenceHandler,
    parallel: ParallelHandler,
    child: ChildHandler,
}

impl Dispatcher {
    pub fn new(deps: EngineDeps, config: &EngineConfig) -> Self {
        let timeouts = TimeoutTracker::new(config.stale_reset_multiplier);
        Self {
            sequence: SequenceHandler::new(deps.clone(), timeouts),
            parallel: ParallelHandler::new(deps.clone(), timeouts),
            child: ChildHandler::new(deps.clone(), timeouts),
            deps,
        }
    }

    /// One polling pass over every unfinished job.
    ///
    /// Failures isolate per job and surface only through logs and job
    /// state; an invoking scheduler just calls this again next interval.
    pub async fn process_all(&self) {
        let jobs = match self.deps.store.find_unfinished().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to query unfinished jobs");
                return;
            }
        };
        debug!(count = jobs.len(), "Processing unfinished jobs");
        for job in jobs {
            if let Err(e) = self.process_job(job.id).await {
                error!(job_id = %job.id, error = %e, "Job processing failed");
            }
        }
    }

    async fn process_job(&self, job_id: Uuid) -> Result<()> {
        // Re-read: an earlier job in this pass may have mutated this one
        // (fan-out fallback), or deleted it.
        let Some(mut job) = self.deps.store.find_job(job_id).await? else {
            debug!(job_id = %job_id, "Job vanished mid-pass, skipping");
            return Ok(());
        };
        let mut prompts = self.deps.store.find_prompts(job.id).await?;
        let description = self.deps.parser.parse(&job.workflow_path).await?;

        if job.workflow_kind.is_none() {
            // Legacy rows predate stored kinds; infer once and persist.
            let kind = self.deps.parser.determine_kind(&job.workflow_path).await?;
            debug!(job_id = %job.id, kind = ?kind, "Inferred workflow kind for legacy job");
            job.workflow_kind = Some(kind);
            job.touch();
            self.deps.store.save_job(&job).await?;
        }

        if job.parent_id.is_some() {
            self.child.process(&mut job, &description, &mut prompts).await
        } else if job.workflow_kind == Some(WorkflowKind::Parallel)
            || description.parallel.is_some()
        {
            self.parallel
                .process(&mut job, &description, &mut prompts)
                .await
        } else {
            self.sequence
                .process(&mut job, &description, &mut prompts)
                .await
        }
    }
}

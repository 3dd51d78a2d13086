//! Child workflow handling — sequence steps for fan-out children.

use crate::engine::sequence::SequenceHandler;
use crate::engine::timeout::TimeoutTracker;
use crate::engine::EngineDeps;
use crate::error::{Result, WorkflowError};
use crate::model::{Job, Prompt};
use crate::workflow::{ChildSequence, ParallelDescription, WorkflowDescription};

/// Drives a fan-out child: ordinary sequence handling over the template
/// the child was spawned from.
pub struct ChildHandler {
    sequence: SequenceHandler,
}

impl ChildHandler {
    pub fn new(deps: EngineDeps, timeouts: TimeoutTracker) -> Self {
        Self {
            sequence: SequenceHandler::new(deps, timeouts),
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
        let Some(template) = resolve_template(parallel, prompts) else {
            return Err(WorkflowError::NoChildTemplate { job_id: job.id }.into());
        };
        let infos = template.prompts.clone();
        self.sequence
            .step(job, description, &infos, prompts, true)
            .await
    }
}

/// Match the child's stored prompt rows back to the template they were
/// created from. The full ordered source-file list decides; templates may
/// share any individual prompt, including the launch prompt.
fn resolve_template<'a>(
    parallel: &'a ParallelDescription,
    prompts: &[Prompt],
) -> Option<&'a ChildSequence> {
    if prompts.is_empty() {
        return None;
    }
    parallel.children.iter().find(|t| {
        t.prompts.len() == prompts.len()
            && t.prompts
                .iter()
                .zip(prompts)
                .all(|(info, row)| info.source_file == row.source_file)
    })
}

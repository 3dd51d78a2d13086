//! Sequence workflow handling — single-track prompt chains.
//!
//! The per-pass `step` here is shared by all three shapes: an ordinary
//! sequence runs it over its full prompt chain, a parallel parent over its
//! single producer prompt, and a child over its template's prompts.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::engine::fallback::FallbackExecutor;
use crate::engine::timeout::TimeoutTracker;
use crate::engine::EngineDeps;
use crate::error::{Result, WorkflowError};
use crate::model::{AgentState, Job, Prompt, PromptStatus};
use crate::prompts::substitute_bound_value;
use crate::workflow::{PromptInfo, WorkflowDescription};

/// Drives single-track prompt sequences, one transition attempt per pass.
pub struct SequenceHandler {
    deps: EngineDeps,
    timeouts: TimeoutTracker,
    fallback: FallbackExecutor,
}

impl SequenceHandler {
    pub fn new(deps: EngineDeps, timeouts: TimeoutTracker) -> Self {
        let fallback = FallbackExecutor::new(deps.clone());
        Self {
            deps,
            timeouts,
            fallback,
        }
    }

    /// One transition attempt for an ordinary sequence job.
    pub async fn process(
        &self,
        job: &mut Job,
        description: &WorkflowDescription,
        prompts: &mut [Prompt],
    ) -> Result<()> {
        let infos = description.sequence_infos();
        self.step(job, description, &infos, prompts, true).await
    }

    /// Shared per-pass step. `infos` aligns 1:1 by position with the
    /// job's stored prompts.
    pub(crate) async fn step(
        &self,
        job: &mut Job,
        description: &WorkflowDescription,
        infos: &[PromptInfo],
        prompts: &mut [Prompt],
        create_pr: bool,
    ) -> Result<()> {
        if job.status.is_terminal() {
            debug!(job_id = %job.id, status = %job.status, "Job is terminal, skipping");
            return Ok(());
        }

        let Some(agent_id) = job.agent_id.clone() else {
            return self.launch(job, infos, prompts, create_pr).await;
        };

        // Staleness guard before the timeout check: a start time carried
        // over from a previous process must not fire the fallback.
        if self.timeouts.reset_if_stale(job) {
            job.touch();
            self.deps.store.save_job(job).await?;
            return Ok(());
        }
        if self.timeouts.reached(job) && !job.fallback_executed {
            info!(job_id = %job.id, "Timeout reached, running fallback");
            let source = job
                .fallback_src
                .clone()
                .or_else(|| description.fallback.clone());
            return self.fallback.run_single(job, source.as_deref()).await;
        }

        let remote = match self.deps.agent.status(&agent_id).await {
            Ok(state) => state,
            Err(e) => {
                // Transient; the next pass retries.
                warn!(job_id = %job.id, agent_id = %agent_id, error = %e, "Status check failed");
                return Ok(());
            }
        };

        self.advance(job, &agent_id, remote, infos, prompts).await
    }

    /// Launch the remote agent with the first prompt.
    async fn launch(
        &self,
        job: &mut Job,
        infos: &[PromptInfo],
        prompts: &mut [Prompt],
        create_pr: bool,
    ) -> Result<()> {
        let Some(info) = infos.first() else {
            return Err(WorkflowError::MissingLaunchPrompt { job_id: job.id }.into());
        };

        let text = match self.prompt_text(job, info).await {
            Ok(text) => text,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to read launch prompt");
                self.fail_launch(job, prompts).await?;
                return Ok(());
            }
        };

        match self
            .deps
            .agent
            .launch(&text, &job.model, &job.repository, create_pr)
            .await
        {
            Ok(agent_id) => {
                info!(job_id = %job.id, agent_id = %agent_id, "Launched remote agent");
                job.agent_id = Some(agent_id);
                job.status = AgentState::Creating;
                if job.timeout_millis.is_some() {
                    job.workflow_start_time = Some(Utc::now());
                }
                job.touch();
                self.deps.store.save_job(job).await?;
                if let Some(prompt) = prompts.first_mut() {
                    prompt.status = PromptStatus::Sent;
                    prompt.touch();
                    self.deps.store.save_prompt(prompt).await?;
                }
                Ok(())
            }
            Err(e) => {
                // A job with no agent and a failed launch has no automatic
                // path forward.
                error!(job_id = %job.id, error = %e, "Agent launch failed");
                self.fail_launch(job, prompts).await?;
                Ok(())
            }
        }
    }

    async fn fail_launch(&self, job: &mut Job, prompts: &mut [Prompt]) -> Result<()> {
        job.status = AgentState::Error;
        job.touch();
        self.deps.store.save_job(job).await?;
        if let Some(prompt) = prompts.first_mut() {
            prompt.status = PromptStatus::Error;
            prompt.touch();
            self.deps.store.save_prompt(prompt).await?;
        }
        Ok(())
    }

    /// Settle the in-flight prompt against the observed remote state and
    /// dispatch at most one follow-up.
    async fn advance(
        &self,
        job: &mut Job,
        agent_id: &str,
        remote: AgentState,
        infos: &[PromptInfo],
        prompts: &mut [Prompt],
    ) -> Result<()> {
        if remote.is_active() {
            // Keep the stored status in step with the remote run.
            if job.status != remote {
                job.status = remote;
                job.touch();
                self.deps.store.save_job(job).await?;
            }
            return Ok(());
        }

        if let Some(idx) = prompts
            .iter()
            .rposition(|p| p.status == PromptStatus::Sent)
        {
            prompts[idx].status = if remote.is_successful() {
                PromptStatus::Completed
            } else {
                PromptStatus::Failed
            };
            prompts[idx].touch();
            self.deps.store.save_prompt(&prompts[idx]).await?;
            debug!(
                job_id = %job.id,
                prompt = %prompts[idx].source_file,
                status = ?prompts[idx].status,
                "Prompt settled"
            );
        }

        let next = prompts
            .iter()
            .position(|p| p.status == PromptStatus::Unknown);
        let Some(idx) = next else {
            // No prompts left; the remote outcome is the job's outcome.
            if job.status != remote {
                job.status = remote;
                job.touch();
                self.deps.store.save_job(job).await?;
                info!(job_id = %job.id, status = %remote, "Job reached terminal state");
            }
            return Ok(());
        };

        let Some(info) = infos.get(idx) else {
            warn!(
                job_id = %job.id,
                prompt = %prompts[idx].source_file,
                "Prompt has no matching description entry"
            );
            job.status = remote;
            job.touch();
            self.deps.store.save_job(job).await?;
            return Ok(());
        };

        let text = match self.prompt_text(job, info).await {
            Ok(text) => text,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to read follow-up prompt");
                return self.fail_follow_up(job, remote, &mut prompts[idx]).await;
            }
        };

        match self.deps.agent.follow_up(agent_id, &text).await {
            Ok(_) => {
                prompts[idx].status = PromptStatus::Sent;
                prompts[idx].touch();
                self.deps.store.save_prompt(&prompts[idx]).await?;
                job.status = AgentState::Running;
                job.touch();
                self.deps.store.save_job(job).await?;
                info!(
                    job_id = %job.id,
                    prompt = %prompts[idx].source_file,
                    "Follow-up prompt sent"
                );
                Ok(())
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Follow-up send failed");
                self.fail_follow_up(job, remote, &mut prompts[idx]).await
            }
        }
    }

    async fn fail_follow_up(
        &self,
        job: &mut Job,
        remote: AgentState,
        prompt: &mut Prompt,
    ) -> Result<()> {
        prompt.status = PromptStatus::Error;
        prompt.touch();
        self.deps.store.save_prompt(prompt).await?;
        job.status = remote;
        job.touch();
        self.deps.store.save_job(job).await?;
        Ok(())
    }

    /// Raw prompt content with the bound value substituted when the prompt
    /// declares a bind expression and the job carries a result.
    async fn prompt_text(&self, job: &Job, info: &PromptInfo) -> Result<String> {
        let raw = self
            .deps
            .prompts
            .read(&job.workflow_path, &info.source_file)
            .await?;
        Ok(match (&job.result, info.has_bind_expression) {
            (Some(value), true) => substitute_bound_value(&raw, value),
            _ => raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::testutil::{
        deps, seed_job, sequence_description, MapReader, ScriptedAgent, StaticParser,
    };
    use crate::store::{InMemoryStore, JobStore};

    struct Fixture {
        store: Arc<InMemoryStore>,
        agent: Arc<ScriptedAgent>,
        handler: SequenceHandler,
        description: WorkflowDescription,
    }

    fn fixture(description: WorkflowDescription, files: &[(&str, &str)]) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let agent = ScriptedAgent::new();
        let parser = Arc::new(StaticParser {
            description: description.clone(),
        });
        let reader = MapReader::with(files);
        let handler = SequenceHandler::new(
            deps(store.clone(), parser, agent.clone(), reader),
            TimeoutTracker::default(),
        );
        Fixture {
            store,
            agent,
            handler,
            description,
        }
    }

    async fn run_pass(fx: &Fixture, job: &mut Job) {
        let mut prompts = fx.store.find_prompts(job.id).await.unwrap();
        fx.handler
            .process(job, &fx.description, &mut prompts)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn launch_sets_agent_and_marks_prompt_sent() {
        let fx = fixture(
            sequence_description("launch.md", &[]),
            &[("launch.md", "start here")],
        );
        let mut job = seed_job(&fx.store, &fx.description).await;

        run_pass(&fx, &mut job).await;

        assert_eq!(job.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(job.status, AgentState::Creating);
        let prompts = fx.store.find_prompts(job.id).await.unwrap();
        assert_eq!(prompts[0].status, PromptStatus::Sent);
        assert_eq!(fx.agent.launches()[0].0, "start here");
    }

    #[tokio::test]
    async fn launch_failure_is_terminal() {
        let fx = fixture(
            sequence_description("launch.md", &[]),
            &[("launch.md", "start here")],
        );
        fx.agent.fail_launches();
        let mut job = seed_job(&fx.store, &fx.description).await;

        run_pass(&fx, &mut job).await;

        assert_eq!(job.status, AgentState::Error);
        assert!(job.agent_id.is_none());
        let prompts = fx.store.find_prompts(job.id).await.unwrap();
        assert_eq!(prompts[0].status, PromptStatus::Error);
    }

    #[tokio::test]
    async fn missing_prompt_file_is_terminal() {
        let fx = fixture(sequence_description("launch.md", &[]), &[]);
        let mut job = seed_job(&fx.store, &fx.description).await;

        run_pass(&fx, &mut job).await;

        assert_eq!(job.status, AgentState::Error);
    }

    #[tokio::test]
    async fn terminal_job_is_never_touched() {
        let fx = fixture(
            sequence_description("launch.md", &[]),
            &[("launch.md", "start here")],
        );
        let mut job = seed_job(&fx.store, &fx.description).await;
        job.status = AgentState::Expired;
        job.agent_id = Some("agent-old".into());
        fx.store.save_job(&job).await.unwrap();
        let before = job.clone();

        run_pass(&fx, &mut job).await;

        assert_eq!(job.status, before.status);
        assert_eq!(job.agent_id, before.agent_id);
        assert!(fx.agent.launches().is_empty());
        assert!(fx.agent.follow_ups().is_empty());
    }

    #[tokio::test]
    async fn bound_value_substituted_on_launch() {
        let description = {
            let mut d = sequence_description("launch.md", &[]);
            d.launch = d.launch.with_bind();
            d
        };
        let fx = fixture(description, &[("launch.md", "work on {{result}}")]);
        let mut job = seed_job(&fx.store, &fx.description).await;
        job.result = Some("10".into());
        fx.store.save_job(&job).await.unwrap();

        run_pass(&fx, &mut job).await;

        assert_eq!(fx.agent.launches()[0].0, "work on 10");
    }

    #[tokio::test]
    async fn follow_up_waits_for_remote_terminal() {
        let fx = fixture(
            sequence_description("launch.md", &["next.md"]),
            &[("launch.md", "start"), ("next.md", "continue")],
        );
        let mut job = seed_job(&fx.store, &fx.description).await;

        run_pass(&fx, &mut job).await; // launch
        fx.agent.queue_status("agent-1", AgentState::Running);
        run_pass(&fx, &mut job).await; // remote still active

        assert!(fx.agent.follow_ups().is_empty());
        assert_eq!(job.status, AgentState::Running);

        fx.agent.queue_status("agent-1", AgentState::Finished);
        run_pass(&fx, &mut job).await; // settles launch prompt, sends follow-up

        let prompts = fx.store.find_prompts(job.id).await.unwrap();
        assert_eq!(prompts[0].status, PromptStatus::Completed);
        assert_eq!(prompts[1].status, PromptStatus::Sent);
        assert_eq!(fx.agent.follow_ups(), vec![("agent-1".into(), "continue".into())]);
        assert_eq!(job.status, AgentState::Running);
    }

    #[tokio::test]
    async fn remote_failure_settles_prompt_as_failed() {
        let fx = fixture(
            sequence_description("launch.md", &[]),
            &[("launch.md", "start")],
        );
        let mut job = seed_job(&fx.store, &fx.description).await;

        run_pass(&fx, &mut job).await;
        fx.agent.queue_status("agent-1", AgentState::Expired);
        run_pass(&fx, &mut job).await;

        let prompts = fx.store.find_prompts(job.id).await.unwrap();
        assert_eq!(prompts[0].status, PromptStatus::Failed);
        assert_eq!(job.status, AgentState::Expired);
    }

    #[tokio::test]
    async fn transient_status_failure_leaves_job_for_next_pass() {
        let fx = fixture(
            sequence_description("launch.md", &[]),
            &[("launch.md", "start")],
        );
        let mut job = seed_job(&fx.store, &fx.description).await;

        run_pass(&fx, &mut job).await;
        // No status scripted: the check errors, nothing changes.
        run_pass(&fx, &mut job).await;
        assert_eq!(job.status, AgentState::Creating);

        fx.agent.queue_status("agent-1", AgentState::Finished);
        run_pass(&fx, &mut job).await;
        assert_eq!(job.status, AgentState::Finished);
    }
}

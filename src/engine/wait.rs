//! Blocking helpers — run-and-wait polling and single-agent monitoring.
//!
//! Both loops sleep between checks and honor a shared shutdown flag, the
//! same interrupt mechanism the outer scheduler uses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::agent::AgentClient;
use crate::engine::completion::{Completion, CompletionChecker};
use crate::engine::dispatcher::Dispatcher;
use crate::error::Result;
use crate::model::AgentState;

/// Outcome of a blocking wait.
#[derive(Debug)]
pub enum WaitOutcome {
    Done(Completion),
    /// The shutdown flag was raised before a final outcome.
    Interrupted,
}

/// Outcome of monitoring a single remote agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    Terminal(AgentState),
    Interrupted,
}

/// Drive the dispatcher until `job_id` (and, for parallel jobs, its whole
/// fan-out) reaches a final outcome.
pub async fn wait_for_outcome(
    dispatcher: &Dispatcher,
    checker: &CompletionChecker,
    job_id: Uuid,
    interval: Duration,
    shutdown: &AtomicBool,
) -> Result<WaitOutcome> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!(job_id = %job_id, "Wait interrupted");
            return Ok(WaitOutcome::Interrupted);
        }
        dispatcher.process_all().await;
        let completion = checker.check(job_id).await?;
        if completion.done {
            info!(job_id = %job_id, outcome = %completion.outcome, "Job reached final outcome");
            return Ok(WaitOutcome::Done(completion));
        }
        tokio::time::sleep(interval).await;
    }
}

/// Poll a single remote agent until it reaches a terminal state.
pub async fn monitor_agent(
    agent: &dyn AgentClient,
    agent_id: &str,
    interval: Duration,
    shutdown: &AtomicBool,
) -> Result<MonitorOutcome> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(MonitorOutcome::Interrupted);
        }
        let state = agent.status(agent_id).await?;
        if state.is_terminal() {
            return Ok(MonitorOutcome::Terminal(state));
        }
        tokio::time::sleep(interval).await;
    }
}

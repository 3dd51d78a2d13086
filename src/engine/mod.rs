//! Workflow execution engine.
//!
//! Core components:
//! - `dispatcher` — per-pass routing of unfinished jobs to shape handlers
//! - `sequence` — single-track prompt chains (shared step logic)
//! - `parallel` — fan-out/fan-in coordination
//! - `child` — sequence steps for fan-out children
//! - `timeout` — elapsed-time and staleness computation
//! - `fallback` — idempotent fallback-prompt dispatch
//! - `extract` — structured-result extraction from transcripts
//! - `completion` — terminal-state resolution for blocking callers
//! - `wait` — run-and-wait polling and single-agent monitoring
//! - `delete` — worklist-based cascade deletion

pub mod child;
pub mod completion;
pub mod delete;
pub mod dispatcher;
pub mod extract;
pub mod fallback;
pub mod parallel;
pub mod sequence;
pub mod timeout;
pub mod wait;

#[cfg(test)]
pub(crate) mod testutil;

pub use completion::{Completion, CompletionChecker};
pub use delete::delete_cascade;
pub use dispatcher::Dispatcher;
pub use extract::ResultExtractor;
pub use fallback::FallbackExecutor;
pub use timeout::TimeoutTracker;
pub use wait::{monitor_agent, wait_for_outcome, MonitorOutcome, WaitOutcome};

use std::sync::Arc;

use crate::agent::AgentClient;
use crate::prompts::PromptReader;
use crate::store::JobStore;
use crate::workflow::WorkflowParser;

/// Shared collaborator bundle for the engine.
///
/// All handlers re-read state through these seams; nothing is cached
/// across passes.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn JobStore>,
    pub parser: Arc<dyn WorkflowParser>,
    pub agent: Arc<dyn AgentClient>,
    pub prompts: Arc<dyn PromptReader>,
}

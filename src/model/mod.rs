//! Job/prompt records and the agent-state lattice.

pub mod job;
pub mod prompt;
pub mod state;

pub use job::{Job, WorkflowKind};
pub use prompt::{Prompt, PromptStatus};
pub use state::AgentState;

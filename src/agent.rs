//! Remote coding-agent client contract.
//!
//! The remote side does the heavy work; every call here returns promptly.
//! Implementations live outside this crate.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::model::AgentState;

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Launch a new remote agent run. Returns the remote agent id.
    async fn launch(
        &self,
        prompt: &str,
        model: &str,
        repository: &str,
        create_pr: bool,
    ) -> Result<String, AgentError>;

    /// Send a follow-up prompt to a launched agent. Returns the message id.
    async fn follow_up(&self, agent_id: &str, prompt: &str) -> Result<String, AgentError>;

    /// Current remote state of an agent run.
    async fn status(&self, agent_id: &str) -> Result<AgentState, AgentError>;

    /// Full transcript text of an agent run.
    async fn transcript(&self, agent_id: &str) -> Result<String, AgentError>;

    /// Delete the remote agent run.
    async fn delete(&self, agent_id: &str) -> Result<(), AgentError>;
}

//! Cascade deletion of a job and its fan-out descendants.

use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::agent::AgentClient;
use crate::error::Result;
use crate::store::JobStore;

/// Delete `job_id` and every descendant, leaves first.
///
/// Uses an explicit worklist with a visited set so a parent chain
/// corrupted into a cycle cannot recurse unboundedly. Remote agent
/// deletion is best effort; a missing remote run never blocks the cascade.
pub async fn delete_cascade(
    store: &dyn JobStore,
    agent: &dyn AgentClient,
    job_id: Uuid,
) -> Result<()> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut worklist = vec![job_id];

    while let Some(id) = worklist.pop() {
        if !visited.insert(id) {
            warn!(job_id = %id, "Cycle in parent chain, skipping");
            continue;
        }
        order.push(id);
        for child in store.find_children(id).await? {
            worklist.push(child.id);
        }
    }

    for id in order.into_iter().rev() {
        if let Some(job) = store.find_job(id).await? {
            if let Some(agent_id) = job.agent_id {
                if let Err(e) = agent.delete(&agent_id).await {
                    warn!(job_id = %id, agent_id = %agent_id, error = %e, "Remote agent delete failed");
                }
            }
        }
        store.delete_prompts_of(id).await?;
        store.delete_job(id).await?;
        debug!(job_id = %id, "Deleted job");
    }
    Ok(())
}

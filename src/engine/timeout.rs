//! Elapsed-time and staleness computation for timeout-bearing jobs.

use chrono::Utc;
use tracing::info;

use crate::config::STALE_RESET_MULTIPLIER;
use crate::model::Job;

/// Computes timeout progress for jobs that carry one.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutTracker {
    stale_reset_multiplier: u32,
}

impl Default for TimeoutTracker {
    fn default() -> Self {
        Self::new(STALE_RESET_MULTIPLIER)
    }
}

impl TimeoutTracker {
    pub fn new(stale_reset_multiplier: u32) -> Self {
        Self {
            stale_reset_multiplier,
        }
    }

    /// Milliseconds since the job's workflow start. 0 when the job carries
    /// no timeout or has not started.
    pub fn elapsed_millis(&self, job: &Job) -> i64 {
        match (job.timeout_millis, job.workflow_start_time) {
            (Some(_), Some(start)) => (Utc::now() - start).num_milliseconds(),
            _ => 0,
        }
    }

    /// True when the configured timeout has elapsed. Only meaningful for
    /// launched jobs; an unlaunched job cannot time out.
    pub fn reached(&self, job: &Job) -> bool {
        if job.agent_id.is_none() {
            return false;
        }
        match job.timeout_millis {
            Some(limit) => self.elapsed_millis(job) >= limit,
            None => false,
        }
    }

    /// Reset a start time that outlived a previous process lifetime.
    ///
    /// A non-terminal job whose elapsed time exceeds the multiplier times
    /// its timeout gets its clock restarted instead of firing the fallback
    /// right after a restart. Returns true when the caller must persist.
    pub fn reset_if_stale(&self, job: &mut Job) -> bool {
        if job.status.is_terminal() {
            return false;
        }
        let Some(limit) = job.timeout_millis else {
            return false;
        };
        if job.workflow_start_time.is_none() {
            return false;
        }
        let threshold = limit.saturating_mul(i64::from(self.stale_reset_multiplier));
        if self.elapsed_millis(job) > threshold {
            info!(
                job_id = %job.id,
                "Workflow start time predates this process, resetting clock"
            );
            job.workflow_start_time = Some(Utc::now());
            true
        } else {
            false
        }
    }
}

//! Hypervisor task polling

use std::time::Duration;

use tokio::time::Instant;

use pd_api::ClusterGateway;
use pd_core::Session;

use crate::error::{OperationError, OperationResult};

/// Timing for one task polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Interval between status queries
    pub interval: Duration,
    /// Overall deadline for the task to reach a terminal state
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(120),
        }
    }
}

/// Poll a hypervisor task until it reaches a terminal state.
///
/// The deadline is checked before each query, so a task that never
/// terminates costs at most `deadline + interval` wall-clock. A
/// transport error while polling is terminal, not retried; retrying
/// against an unreachable host would never converge.
pub async fn poll_task(
    gateway: &dyn ClusterGateway,
    session: &Session,
    node: &str,
    upid: &str,
    policy: PollPolicy,
) -> OperationResult<()> {
    let started = Instant::now();

    loop {
        if started.elapsed() > policy.deadline {
            tracing::warn!("Task {} exceeded its {:?} deadline", upid, policy.deadline);
            return Err(OperationError::TaskTimeout(policy.deadline));
        }

        let status = gateway
            .task_status(session, node, upid)
            .await
            .map_err(OperationError::Poll)?;

        if !status.is_running() {
            if status.is_success() {
                tracing::debug!("Task {} finished", upid);
                return Ok(());
            }
            return Err(OperationError::TaskFailed(
                status.exit_indicator().to_string(),
            ));
        }

        tokio::time::sleep(policy.interval).await;
    }
}

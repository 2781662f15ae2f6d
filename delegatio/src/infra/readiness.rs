//! Readiness gates between provisioning and cluster bootstrap.

use super::Infrastructure;
use crate::portal::AgentDialer;
use delegatio_shared::{DelegatioError, DelegatioResult};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `poll` until it resolves, the deadline passes or `cancel` fires.
async fn gate<F>(
    what: &str,
    deadline: Duration,
    cancel: &CancellationToken,
    poll: F,
) -> DelegatioResult<Result<(), tokio::time::error::Elapsed>>
where
    F: Future<Output = DelegatioResult<()>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DelegatioError::Cancelled(format!("waiting for {}", what))),
        result = tokio::time::timeout(deadline, poll) => match result {
            Ok(inner) => inner.map(Ok),
            Err(elapsed) => Ok(Err(elapsed)),
        },
    }
}

impl Infrastructure {
    /// Wait until the virtual network reports active.
    pub async fn wait_for_network_ready(&self, cancel: &CancellationToken) -> DelegatioResult<()> {
        let name = &self.options.network_name;
        let interval = self.options.timeouts.poll_interval();
        let deadline = self.options.timeouts.network_ready();

        let poll = async {
            loop {
                match self.host.network_active(name).await {
                    Ok(true) => return Ok(()),
                    Ok(false) => tracing::debug!(network = %name, "network not active yet"),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(network = %name, "network not defined yet")
                    }
                    Err(e) => return Err(e),
                }
                tokio::time::sleep(interval).await;
            }
        };

        match gate("network", deadline, cancel, poll).await? {
            Ok(()) => {
                tracing::info!(network = %name, "network is ready");
                Ok(())
            }
            Err(_) => Err(DelegatioError::Timeout(format!(
                "network '{}' not active after {:?}",
                name, deadline
            ))),
        }
    }

    /// Names of created domains whose agent has not answered yet, sorted.
    pub fn pending_agents(&self) -> Vec<String> {
        let mut pending: Vec<String> = self
            .state
            .lock()
            .domains
            .iter()
            .filter(|(_, info)| !info.guest_agent_ready)
            .map(|(name, _)| name.clone())
            .collect();
        pending.sort();
        pending
    }

    fn mark_agent_ready(&self, name: &str) {
        if let Some(info) = self.state.lock().domains.get_mut(name) {
            info.guest_agent_ready = true;
        }
    }

    /// Probe every created node until all agents answer.
    ///
    /// Probes within a round run concurrently, each bounded by the probe
    /// timeout. Nodes that answered are not probed again.
    pub async fn wait_for_agents_ready(
        &self,
        dialer: &dyn AgentDialer,
        cancel: &CancellationToken,
    ) -> DelegatioResult<()> {
        let interval = self.options.timeouts.poll_interval();
        let probe_timeout = self.options.timeouts.probe();
        let deadline = self.options.timeouts.agent_ready();

        let poll = async {
            loop {
                let pending = self.pending_agents();
                if pending.is_empty() {
                    return Ok::<(), DelegatioError>(());
                }

                let probes = pending.into_iter().map(|name| async move {
                    let probe = async {
                        let agent = dialer.dial(&name).await?;
                        agent.ping().await
                    };
                    let result = tokio::time::timeout(probe_timeout, probe).await;
                    (name, result)
                });

                for (name, result) in join_all(probes).await {
                    match result {
                        Ok(Ok(())) => {
                            self.mark_agent_ready(&name);
                            tracing::info!(node = %name, "agent is ready");
                        }
                        Ok(Err(e)) => tracing::debug!(node = %name, error = %e, "agent not reachable yet"),
                        Err(_) => tracing::debug!(node = %name, "agent probe timed out"),
                    }
                }

                if self.pending_agents().is_empty() {
                    return Ok(());
                }
                tokio::time::sleep(interval).await;
            }
        };

        match gate("agents", deadline, cancel, poll).await? {
            Ok(()) => Ok(()),
            Err(_) => Err(DelegatioError::Timeout(format!(
                "agents not ready after {:?}: {}",
                deadline,
                self.pending_agents().join(", ")
            ))),
        }
    }
}

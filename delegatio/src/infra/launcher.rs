//! Concurrent node creation.

use super::Infrastructure;
use crate::fanout::FanOut;
use crate::types::NodeId;
use delegatio_shared::DelegatioResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

impl Infrastructure {
    /// Create one node: its boot volume, then its domain.
    pub async fn create_instance(&self, node: NodeId) -> DelegatioResult<()> {
        self.create_boot_volume(node).await?;
        self.create_domain(node).await
    }

    /// Create every node concurrently.
    ///
    /// The first failure cancels the remaining creations and is returned.
    /// Resources created before the failure stay registered for teardown.
    pub async fn launch_instances(self: &Arc<Self>, cancel: &CancellationToken) -> DelegatioResult<()> {
        let mut group = FanOut::new("launch", cancel);
        for node in self.layout.nodes() {
            let infra = Arc::clone(self);
            let label = format!("create instance {}", self.layout.node_name(node));
            group.spawn(label, async move { infra.create_instance(node).await });
        }
        tracing::info!(nodes = group.len(), "launching instances");
        group.wait().await
    }
}

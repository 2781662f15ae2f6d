//! Orchestrator entry point.

use std::sync::Arc;

use crate::bootstrap::{BootstrapStage, ClusterBootstrap, JoinCredentials};
use crate::infra::{Infrastructure, VirshHost, VirtHost};
use crate::lock::HostLock;
use crate::options::DelegatioOptions;
use crate::portal::{AgentDialer, HostDialer};
use delegatio_shared::DelegatioResult;
use tokio_util::sync::CancellationToken;

/// Owns the home-directory lock, the infrastructure connection and the
/// bootstrap coordinator.
///
/// Only one `Delegatio` can use a given home directory at a time. The lock
/// is released when this value is dropped.
pub struct Delegatio {
    options: DelegatioOptions,
    cluster: ClusterBootstrap,
    _lock: HostLock,
}

impl Delegatio {
    /// Connect to the libvirt host named in `options` and dial agents at
    /// the addresses it reports.
    pub fn new(options: DelegatioOptions) -> DelegatioResult<Self> {
        options.validate()?;
        let host: Arc<dyn VirtHost> = Arc::new(VirshHost::new(options.libvirt_uri.clone()));
        let dialer: Arc<dyn AgentDialer> = Arc::new(HostDialer::new(
            Arc::clone(&host),
            options.agent_port,
            options.timeouts.probe(),
        ));
        Self::with_backends(options, host, dialer)
    }

    /// Build on explicit host and dialer backends.
    pub fn with_backends(
        options: DelegatioOptions,
        host: Arc<dyn VirtHost>,
        dialer: Arc<dyn AgentDialer>,
    ) -> DelegatioResult<Self> {
        options.validate()?;
        let lock = HostLock::acquire(&options.home_dir)?;
        let infra = Arc::new(Infrastructure::new(host, options.clone())?);
        let cluster = ClusterBootstrap::new(infra, dialer, &options);

        tracing::debug!(home = %options.home_dir.display(), nodes = options.num_nodes, "orchestrator ready");
        Ok(Self {
            options,
            cluster,
            _lock: lock,
        })
    }

    pub fn options(&self) -> &DelegatioOptions {
        &self.options
    }

    pub fn infrastructure(&self) -> &Arc<Infrastructure> {
        self.cluster.infrastructure()
    }

    pub fn cluster(&self) -> &ClusterBootstrap {
        &self.cluster
    }

    pub fn stage(&self) -> BootstrapStage {
        self.cluster.stage()
    }

    /// Provision the infrastructure and form the cluster.
    pub async fn bootstrap(&self, cancel: &CancellationToken) -> DelegatioResult<Arc<JoinCredentials>> {
        self.cluster.bootstrap(cancel).await
    }

    /// Destroy everything a run with these options creates.
    ///
    /// Cached agent sessions go with it.
    pub async fn terminate(&self) -> DelegatioResult<()> {
        self.cluster.dialer().reset();
        self.infrastructure().terminate_infrastructure().await
    }
}

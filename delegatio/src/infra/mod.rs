//! Virtualized infrastructure for the cluster.
//!
//! [`Infrastructure`] is the single handle to the virtualization host. It
//! owns everything created through it and the per-node readiness flags,
//! both behind one lock that is never held across a host or agent call.
//!
//! - `provision`: pools, volumes, network, domains and teardown
//! - `launcher`: concurrent node creation
//! - `readiness`: network and agent gates

pub mod host;
mod launcher;
mod provision;
mod readiness;
pub mod templates;
pub mod tracker;
pub mod virsh;

pub use host::VirtHost;
pub use templates::Templates;
pub use tracker::{DomainInfo, InfraState, ResourceTracker, TeardownPlan};
pub use virsh::VirshHost;

use crate::options::DelegatioOptions;
use crate::types::ClusterLayout;
use delegatio_shared::DelegatioResult;
use parking_lot::Mutex;
use std::sync::Arc;

/// Connection to the virtualization host plus the resources created on it.
pub struct Infrastructure {
    host: Arc<dyn VirtHost>,
    templates: Templates,
    layout: ClusterLayout,
    options: DelegatioOptions,
    state: Mutex<InfraState>,
}

impl Infrastructure {
    /// Create a connection using `options` for names, paths and timings.
    ///
    /// Template overrides are read from `options.template_dir` here, so a
    /// broken template fails before any host call.
    pub fn new(host: Arc<dyn VirtHost>, options: DelegatioOptions) -> DelegatioResult<Self> {
        options.validate()?;
        let templates = match &options.template_dir {
            Some(dir) => Templates::load(dir)?,
            None => Templates::builtin(),
        };
        Ok(Self {
            host,
            templates,
            layout: ClusterLayout::new(options.node_prefix.clone(), options.num_nodes),
            options,
            state: Mutex::new(InfraState::default()),
        })
    }

    pub fn host(&self) -> &Arc<dyn VirtHost> {
        &self.host
    }

    pub fn layout(&self) -> &ClusterLayout {
        &self.layout
    }

    pub fn options(&self) -> &DelegatioOptions {
        &self.options
    }

    /// Snapshot of the registered resources.
    pub fn resources(&self) -> ResourceTracker {
        self.state.lock().tracker.clone()
    }

    /// Readiness record of a created domain.
    pub fn domain_info(&self, name: &str) -> Option<DomainInfo> {
        self.state.lock().domains.get(name).cloned()
    }

    /// Names of created domains, sorted.
    pub fn domain_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().domains.keys().cloned().collect();
        names.sort();
        names
    }
}

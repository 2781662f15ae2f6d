//! Registry of host resources created during a provisioning run.

use std::collections::HashMap;

/// Append-only record of created resources, drained by teardown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceTracker {
    pools: Vec<String>,
    disks: Vec<String>,
    networks: Vec<String>,
    domains: Vec<String>,
}

/// Snapshot of the resources to destroy, in teardown order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownPlan {
    pub domains: Vec<String>,
    pub disks: Vec<String>,
    pub networks: Vec<String>,
    pub pools: Vec<String>,
}

impl TeardownPlan {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
            && self.disks.is_empty()
            && self.networks.is_empty()
            && self.pools.is_empty()
    }

    /// Add `other`'s names that are not already planned, keeping order.
    pub fn merge(&mut self, other: TeardownPlan) {
        fn extend_unique(into: &mut Vec<String>, from: Vec<String>) {
            for name in from {
                if !into.contains(&name) {
                    into.push(name);
                }
            }
        }
        extend_unique(&mut self.domains, other.domains);
        extend_unique(&mut self.disks, other.disks);
        extend_unique(&mut self.networks, other.networks);
        extend_unique(&mut self.pools, other.pools);
    }
}

impl ResourceTracker {
    pub fn register_pool(&mut self, name: impl Into<String>) {
        self.pools.push(name.into());
    }

    pub fn register_disk(&mut self, name: impl Into<String>) {
        self.disks.push(name.into());
    }

    pub fn register_network(&mut self, name: impl Into<String>) {
        self.networks.push(name.into());
    }

    pub fn register_domain(&mut self, name: impl Into<String>) {
        self.domains.push(name.into());
    }

    pub fn pools(&self) -> &[String] {
        &self.pools
    }

    pub fn disks(&self) -> &[String] {
        &self.disks
    }

    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
            && self.disks.is_empty()
            && self.networks.is_empty()
            && self.domains.is_empty()
    }

    /// Take every registered name, leaving the tracker empty.
    pub fn drain(&mut self) -> TeardownPlan {
        TeardownPlan {
            domains: std::mem::take(&mut self.domains),
            disks: std::mem::take(&mut self.disks),
            networks: std::mem::take(&mut self.networks),
            pools: std::mem::take(&mut self.pools),
        }
    }
}

/// Per-node state, present only for created domains.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainInfo {
    pub guest_agent_ready: bool,
}

/// Mutable orchestrator state guarded by the connection lock.
#[derive(Debug, Default)]
pub struct InfraState {
    pub tracker: ResourceTracker,
    pub domains: HashMap<String, DomainInfo>,
}

//! Configuration for delegatio.

use crate::constants::{agent, cluster, envs as const_envs, filenames, libvirt, timeouts};
use delegatio_shared::{DelegatioError, DelegatioResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Readiness, probe and upload timings.
///
/// Stored in milliseconds so config files stay plain numbers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Delay between readiness polls
    pub poll_interval_ms: u64,
    /// Upper bound for a single agent liveness probe
    pub probe_ms: u64,
    /// Deadline for the virtual network to become active
    pub network_ready_ms: u64,
    /// Deadline for every agent to answer
    pub agent_ready_ms: u64,
    /// Deadline for uploading the base image
    pub upload_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_ms: timeouts::POLL_INTERVAL_MS,
            probe_ms: timeouts::PROBE_MS,
            network_ready_ms: timeouts::NETWORK_READY_MS,
            agent_ready_ms: timeouts::AGENT_READY_MS,
            upload_ms: timeouts::UPLOAD_MS,
        }
    }
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn network_ready(&self) -> Duration {
        Duration::from_millis(self.network_ready_ms)
    }

    pub fn agent_ready(&self) -> Duration {
        Duration::from_millis(self.agent_ready_ms)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_millis(self.upload_ms)
    }
}

/// Options for a delegatio orchestrator.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegatioOptions {
    /// State directory (lock file, logs, admin kubeconfig)
    pub home_dir: PathBuf,
    /// Libvirt connection URI
    pub libvirt_uri: String,
    /// Node disk image uploaded into the base volume
    pub image_path: PathBuf,
    /// Directory with template overrides (`pool.xml`, `domain.xml`, ...)
    pub template_dir: Option<PathBuf>,
    pub num_nodes: usize,
    pub node_prefix: String,
    pub pool_name: String,
    pub pool_path: PathBuf,
    pub base_volume: String,
    pub network_name: String,
    /// Port the control agent listens on inside every node
    pub agent_port: u16,
    /// kubeadm configuration uploaded to the initializer before `kubeadm init`
    pub kubeadm_config: Option<PathBuf>,
    /// Where the admin kubeconfig is written. Defaults to `<home>/admin.conf`.
    pub kubeconfig_path: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl Default for DelegatioOptions {
    fn default() -> Self {
        let home_dir = std::env::var(const_envs::DELEGATIO_HOME)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
                path.push(".delegatio");
                path
            });

        Self {
            home_dir,
            libvirt_uri: libvirt::DEFAULT_URI.to_string(),
            image_path: PathBuf::from("delegatio.qcow2"),
            template_dir: None,
            num_nodes: cluster::NUM_NODES,
            node_prefix: cluster::NODE_PREFIX.to_string(),
            pool_name: libvirt::POOL_NAME.to_string(),
            pool_path: PathBuf::from(libvirt::POOL_PATH),
            base_volume: libvirt::BASE_VOLUME.to_string(),
            network_name: libvirt::NETWORK_NAME.to_string(),
            agent_port: agent::PORT,
            kubeadm_config: None,
            kubeconfig_path: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl DelegatioOptions {
    /// Load options from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> DelegatioResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DelegatioError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            DelegatioError::Config(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Check preconditions before any host call is made.
    pub fn validate(&self) -> DelegatioResult<()> {
        if !self.home_dir.is_absolute() {
            return Err(DelegatioError::Config(format!(
                "home_dir must be absolute path, got: {}",
                self.home_dir.display()
            )));
        }
        if self.num_nodes == 0 {
            return Err(DelegatioError::Config(
                "num_nodes must be at least 1".into(),
            ));
        }
        if self.node_prefix.is_empty() {
            return Err(DelegatioError::Config("node_prefix must not be empty".into()));
        }
        if self.pool_name.is_empty() || self.network_name.is_empty() || self.base_volume.is_empty()
        {
            return Err(DelegatioError::Config(
                "pool_name, network_name and base_volume must not be empty".into(),
            ));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(DelegatioError::Config(
                "timeouts.poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Resolved admin kubeconfig location.
    pub fn kubeconfig_path(&self) -> PathBuf {
        self.kubeconfig_path
            .clone()
            .unwrap_or_else(|| self.home_dir.join(filenames::ADMIN_CONF))
    }
}

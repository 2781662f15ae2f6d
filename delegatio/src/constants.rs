//! Constants for the delegatio orchestrator
//!
//! Centralized location for hardcoded names, paths and timings.

// Re-export shared constants
pub use delegatio_shared::constants::{agent, kubeadm};

pub mod envs {
    pub const DELEGATIO_HOME: &str = "DELEGATIO_HOME";
}

/// Cluster shape
pub mod cluster {
    /// Number of nodes in the reference configuration
    pub const NUM_NODES: usize = 3;

    /// Node names are this prefix followed by the node index
    pub const NODE_PREFIX: &str = "delegatio-";
}

/// Libvirt resource names and locations
pub mod libvirt {
    /// Connection URI for the system QEMU driver
    pub const DEFAULT_URI: &str = "qemu:///system";

    pub const POOL_NAME: &str = "delegatio-pool";

    /// Target directory of the storage pool on the host
    pub const POOL_PATH: &str = "/var/lib/libvirt/images/delegatio";

    pub const BASE_VOLUME: &str = "delegatio-base";

    pub const NETWORK_NAME: &str = "delegatio";

    /// Boot volume virtual size in GiB
    pub const BOOT_VOLUME_GIB: u64 = 20;
}

/// Readiness and upload timings (milliseconds)
pub mod timeouts {
    pub const POLL_INTERVAL_MS: u64 = 500;
    pub const PROBE_MS: u64 = 2_000;
    pub const NETWORK_READY_MS: u64 = 60_000;
    pub const AGENT_READY_MS: u64 = 300_000;
    pub const UPLOAD_MS: u64 = 600_000;
}

pub mod dirs {
    pub const LOGS_DIR: &str = "logs";
}

/// File naming patterns
pub mod filenames {
    /// Lock file name
    pub const LOCK_FILE: &str = ".lock";

    /// Admin kubeconfig persisted after a successful init
    pub const ADMIN_CONF: &str = "admin.conf";

    /// Rolling log file prefix
    pub const LOG_FILE: &str = "delegatio.log";
}

//! Shared constants between host and agent.
//!
//! These constants must be identical on both sides of the host-guest boundary.

/// Agent network constants
pub mod agent {
    /// TCP port the control agent listens on inside every node
    pub const PORT: u16 = 9000;

    /// Default listen URI for the agent binary
    pub const DEFAULT_LISTEN: &str = "tcp://0.0.0.0:9000";

    /// Command used as liveness probe (must exist on every node image)
    pub const PROBE_COMMAND: &str = "true";
}

/// Kubernetes bootstrap file locations on the initializer node
pub mod kubeadm {
    /// Directory the kubeadm configuration is uploaded to
    pub const CONFIG_DIR: &str = "/tmp";

    /// File name of the uploaded kubeadm configuration
    pub const CONFIG_FILE: &str = "kubeadmconf.yaml";

    /// Admin kubeconfig written by `kubeadm init`
    pub const ADMIN_CONF: &str = "/etc/kubernetes/admin.conf";
}

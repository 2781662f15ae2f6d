//! Libvirt backend driven through the `virsh` command line.

use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use delegatio_shared::{DelegatioError, DelegatioResult};
use tokio::process::Command;

use super::host::VirtHost;

/// Messages libvirt prints when a lookup fails.
const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "no domain with matching name",
    "no storage vol with matching",
    "no storage pool with matching",
    "no network with matching",
];

/// [`VirtHost`] backed by `virsh --connect <uri>`.
///
/// Every call spawns a child with `kill_on_drop`, so dropping the future
/// (cancellation, timeout) stops the host call.
#[derive(Clone, Debug)]
pub struct VirshHost {
    uri: String,
    binary: String,
}

impl VirshHost {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            binary: "virsh".to_string(),
        }
    }

    /// Use a different `virsh` executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn virsh(&self, args: &[&str]) -> DelegatioResult<String> {
        tracing::debug!(uri = %self.uri, ?args, "virsh");

        let output = Command::new(&self.binary)
            .arg("--connect")
            .arg(&self.uri)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DelegatioError::Provision(format!("failed to run {}: {}", self.binary, e))
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(&args.join(" "), &stderr))
    }

    /// Run a virsh subcommand that takes a definition file.
    async fn virsh_with_definition(&self, args: &[&str], definition: &str) -> DelegatioResult<()> {
        let mut file = tempfile::Builder::new()
            .prefix("delegatio-")
            .suffix(".xml")
            .tempfile()
            .map_err(|e| DelegatioError::Storage(format!("failed to create definition file: {}", e)))?;
        file.write_all(definition.as_bytes())
            .map_err(|e| DelegatioError::Storage(format!("failed to write definition file: {}", e)))?;

        let path = file.path().to_string_lossy().into_owned();
        let mut full: Vec<&str> = args.to_vec();
        full.push(&path);
        self.virsh(&full).await.map(|_| ())
    }
}

fn classify_failure(command: &str, stderr: &str) -> DelegatioError {
    let lower = stderr.to_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker)) {
        DelegatioError::NotFound(format!("virsh {}: {}", command, stderr))
    } else {
        DelegatioError::Provision(format!("virsh {}: {}", command, stderr))
    }
}

/// Parse `virsh net-info` output for the `Active:` row.
fn parse_net_active(output: &str) -> bool {
    output.lines().any(|line| {
        let mut parts = line.split(':');
        matches!(
            (parts.next().map(str::trim), parts.next().map(str::trim)),
            (Some("Active"), Some("yes"))
        )
    })
}

/// Parse `virsh domifaddr` output for the first IPv4 address.
///
/// ```text
///  Name       MAC address          Protocol     Address
/// -------------------------------------------------------------
///  vnet0      52:54:00:6b:3c:1a    ipv4         10.42.0.11/24
/// ```
fn parse_domifaddr(output: &str) -> Option<IpAddr> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let proto = fields.iter().position(|f| *f == "ipv4")?;
        let cidr = fields.get(proto + 1)?;
        cidr.split('/').next()?.parse().ok()
    })
}

#[async_trait]
impl VirtHost for VirshHost {
    async fn create_pool(&self, name: &str, definition: &str) -> DelegatioResult<()> {
        self.virsh_with_definition(&["pool-define"], definition).await?;
        self.virsh(&["pool-build", name]).await?;
        self.virsh(&["pool-start", name]).await?;
        Ok(())
    }

    async fn create_volume(&self, pool: &str, definition: &str) -> DelegatioResult<()> {
        self.virsh_with_definition(&["vol-create", "--pool", pool], definition)
            .await
    }

    async fn upload_volume(&self, pool: &str, volume: &str, source: &Path) -> DelegatioResult<()> {
        let source = source.to_string_lossy();
        self.virsh(&["vol-upload", "--pool", pool, volume, &source])
            .await
            .map(|_| ())
    }

    async fn create_network(&self, definition: &str) -> DelegatioResult<()> {
        self.virsh_with_definition(&["net-create"], definition).await
    }

    async fn network_active(&self, name: &str) -> DelegatioResult<bool> {
        let output = self.virsh(&["net-info", name]).await?;
        Ok(parse_net_active(&output))
    }

    async fn create_domain(&self, definition: &str) -> DelegatioResult<()> {
        self.virsh_with_definition(&["create"], definition).await
    }

    async fn domain_address(&self, name: &str) -> DelegatioResult<Option<IpAddr>> {
        let output = self.virsh(&["domifaddr", name]).await?;
        Ok(parse_domifaddr(&output))
    }

    async fn destroy_domain(&self, name: &str) -> DelegatioResult<()> {
        self.virsh(&["destroy", name]).await.map(|_| ())
    }

    async fn delete_volume(&self, pool: &str, name: &str) -> DelegatioResult<()> {
        self.virsh(&["vol-delete", "--pool", pool, name])
            .await
            .map(|_| ())
    }

    async fn destroy_network(&self, name: &str) -> DelegatioResult<()> {
        self.virsh(&["net-destroy", name]).await.map(|_| ())
    }

    async fn destroy_pool(&self, name: &str) -> DelegatioResult<()> {
        match self.virsh(&["pool-destroy", name]).await {
            Ok(_) => {}
            // A defined but stopped pool still needs undefining.
            Err(DelegatioError::Provision(msg)) if msg.contains("is not active") => {}
            Err(e) => return Err(e),
        }
        self.virsh(&["pool-undefine", name]).await.map(|_| ())
    }
}

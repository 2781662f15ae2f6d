//! Virtualization host abstraction.

use async_trait::async_trait;
use delegatio_shared::DelegatioResult;
use std::net::IpAddr;
use std::path::Path;

/// Operations the provisioner needs from a virtualization host.
///
/// Definitions are rendered templates (libvirt XML for [`VirshHost`]).
/// Destroy operations return [`DelegatioError::NotFound`] when the resource
/// is absent, which teardown treats as success.
///
/// [`VirshHost`]: crate::infra::VirshHost
/// [`DelegatioError::NotFound`]: delegatio_shared::DelegatioError::NotFound
#[async_trait]
pub trait VirtHost: Send + Sync {
    /// Define, build and start a storage pool.
    async fn create_pool(&self, name: &str, definition: &str) -> DelegatioResult<()>;

    async fn create_volume(&self, pool: &str, definition: &str) -> DelegatioResult<()>;

    /// Upload `source` into an existing volume.
    async fn upload_volume(&self, pool: &str, volume: &str, source: &Path) -> DelegatioResult<()>;

    /// Define and start a virtual network.
    async fn create_network(&self, definition: &str) -> DelegatioResult<()>;

    async fn network_active(&self, name: &str) -> DelegatioResult<bool>;

    /// Create and start a compute domain.
    async fn create_domain(&self, definition: &str) -> DelegatioResult<()>;

    /// First IPv4 address leased to the domain, if any yet.
    async fn domain_address(&self, name: &str) -> DelegatioResult<Option<IpAddr>>;

    async fn destroy_domain(&self, name: &str) -> DelegatioResult<()>;

    async fn delete_volume(&self, pool: &str, name: &str) -> DelegatioResult<()>;

    async fn destroy_network(&self, name: &str) -> DelegatioResult<()>;

    /// Stop and undefine a storage pool.
    async fn destroy_pool(&self, name: &str) -> DelegatioResult<()>;
}

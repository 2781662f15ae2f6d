//! Resource creation and teardown.

use super::Infrastructure;
use super::templates::render;
use super::tracker::{DomainInfo, TeardownPlan};
use crate::constants::libvirt::BOOT_VOLUME_GIB;
use crate::fanout::cancellable;
use crate::types::NodeId;
use delegatio_shared::{DelegatioError, DelegatioResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Prefix host failures with the operation that caused them.
fn context(what: String) -> impl FnOnce(DelegatioError) -> DelegatioError {
    move |err| match err {
        DelegatioError::Provision(msg) | DelegatioError::NotFound(msg) => {
            DelegatioError::Provision(format!("{}: {}", what, msg))
        }
        other => other,
    }
}

/// Treat an absent resource as already destroyed.
async fn ignore_not_found<F>(what: &str, name: &str, op: F) -> DelegatioResult<()>
where
    F: Future<Output = DelegatioResult<()>>,
{
    match op.await {
        Ok(()) => {
            tracing::info!(resource = what, name, "destroyed");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(resource = what, name, "already gone");
            Ok(())
        }
        Err(e) => Err(context(format!("destroying {} '{}'", what, name))(e)),
    }
}

impl Infrastructure {
    fn pool_path_of(&self, volume: &str) -> String {
        self.options.pool_path.join(volume).to_string_lossy().into_owned()
    }

    /// Define, build and start the storage pool.
    pub async fn create_storage_pool(&self) -> DelegatioResult<()> {
        let name = &self.options.pool_name;
        let pool_path = self.options.pool_path.to_string_lossy();
        let definition = render(
            &self.templates.pool,
            &[("name", name.as_str()), ("path", pool_path.as_ref())],
        )?;

        tracing::info!(pool = %name, "creating storage pool");
        self.host
            .create_pool(name, &definition)
            .await
            .map_err(context(format!("creating storage pool '{}'", name)))?;

        self.state.lock().tracker.register_pool(name.clone());
        Ok(())
    }

    /// Create the shared base volume and upload the node image into it.
    ///
    /// The upload is bounded by `timeouts.upload` and by `cancel`.
    pub async fn create_base_image(&self, cancel: &CancellationToken) -> DelegatioResult<()> {
        let pool = &self.options.pool_name;
        let name = &self.options.base_volume;
        let image = &self.options.image_path;

        let capacity = tokio::fs::metadata(image)
            .await
            .map_err(|e| {
                DelegatioError::Config(format!(
                    "base image {} is not readable: {}",
                    image.display(),
                    e
                ))
            })?
            .len()
            .to_string();
        let path = self.pool_path_of(name);
        let definition = render(
            &self.templates.base_volume,
            &[
                ("name", name.as_str()),
                ("capacity", capacity.as_str()),
                ("path", path.as_str()),
            ],
        )?;

        tracing::info!(volume = %name, "creating base storage image");
        self.host
            .create_volume(pool, &definition)
            .await
            .map_err(context(format!("creating base volume '{}'", name)))?;
        self.state.lock().tracker.register_disk(name.clone());

        tracing::info!(image = %image.display(), "uploading base image to storage pool");
        let deadline = self.options.timeouts.upload();
        let upload = tokio::time::timeout(deadline, self.host.upload_volume(pool, name, image));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DelegatioError::Cancelled(format!(
                "upload of base volume '{}' cancelled",
                name
            ))),
            result = upload => match result {
                Ok(inner) => inner.map_err(context(format!("uploading base volume '{}'", name))),
                Err(_) => Err(DelegatioError::Provision(format!(
                    "uploading base volume '{}' did not finish within {:?}",
                    name, deadline
                ))),
            },
        }
    }

    /// Create the node's copy-on-write boot volume on top of the base volume.
    pub async fn create_boot_volume(&self, node: NodeId) -> DelegatioResult<()> {
        let name = self.layout.node_name(node);
        let path = self.pool_path_of(&name);
        let backing = self.pool_path_of(&self.options.base_volume);
        let capacity = (BOOT_VOLUME_GIB * 1024 * 1024 * 1024).to_string();
        let definition = render(
            &self.templates.boot_volume,
            &[
                ("name", name.as_str()),
                ("capacity", capacity.as_str()),
                ("path", path.as_str()),
                ("backing", backing.as_str()),
            ],
        )?;

        tracing::info!(node = %name, "creating boot volume");
        self.host
            .create_volume(&self.options.pool_name, &definition)
            .await
            .map_err(context(format!("creating boot volume '{}'", name)))?;

        self.state.lock().tracker.register_disk(name);
        Ok(())
    }

    /// Define and start the shared virtual network.
    pub async fn create_network(&self) -> DelegatioResult<()> {
        let name = &self.options.network_name;
        let definition = render(&self.templates.network, &[("name", name.as_str())])?;

        tracing::info!(network = %name, "creating network");
        self.host
            .create_network(&definition)
            .await
            .map_err(context(format!("creating network '{}'", name)))?;

        self.state.lock().tracker.register_network(name.clone());
        Ok(())
    }

    /// Start the node's compute domain from its boot volume.
    pub async fn create_domain(&self, node: NodeId) -> DelegatioResult<()> {
        let name = self.layout.node_name(node);
        let definition = render(
            &self.templates.domain,
            &[
                ("name", name.as_str()),
                ("pool", self.options.pool_name.as_str()),
                ("volume", name.as_str()),
                ("network", self.options.network_name.as_str()),
            ],
        )?;

        tracing::info!(node = %name, "creating domain");
        self.host
            .create_domain(&definition)
            .await
            .map_err(context(format!("creating domain '{}'", name)))?;

        let mut state = self.state.lock();
        state.tracker.register_domain(name.clone());
        state.domains.insert(name, DomainInfo::default());
        Ok(())
    }

    /// Every resource a run with these options creates.
    pub fn planned_resources(&self) -> TeardownPlan {
        let node_names = self.layout.node_names();
        let mut disks = vec![self.options.base_volume.clone()];
        disks.extend(node_names.iter().cloned());
        TeardownPlan {
            domains: node_names,
            disks,
            networks: vec![self.options.network_name.clone()],
            pools: vec![self.options.pool_name.clone()],
        }
    }

    /// Destroy registered and planned resources: domains, then volumes,
    /// then networks, then pools.
    ///
    /// Absent resources count as destroyed, so this is safe on a fresh host
    /// and safe to repeat. Registration is cleared only after success.
    pub async fn terminate_infrastructure(&self) -> DelegatioResult<()> {
        let mut plan = self.state.lock().tracker.clone().drain();
        plan.merge(self.planned_resources());

        tracing::info!(
            domains = plan.domains.len(),
            disks = plan.disks.len(),
            networks = plan.networks.len(),
            pools = plan.pools.len(),
            "terminating infrastructure"
        );

        for name in &plan.domains {
            ignore_not_found("domain", name, self.host.destroy_domain(name)).await?;
        }
        for name in &plan.disks {
            ignore_not_found(
                "volume",
                name,
                self.host.delete_volume(&self.options.pool_name, name),
            )
            .await?;
        }
        for name in &plan.networks {
            ignore_not_found("network", name, self.host.destroy_network(name)).await?;
        }
        for name in &plan.pools {
            ignore_not_found("pool", name, self.host.destroy_pool(name)).await?;
        }

        let mut state = self.state.lock();
        state.tracker.drain();
        state.domains.clear();
        Ok(())
    }

    /// Clear stale state, then create the pool, base image and network.
    ///
    /// Every step races `cancel`; a step in flight is dropped when it fires.
    pub async fn initialize_infrastructure(&self, cancel: &CancellationToken) -> DelegatioResult<()> {
        cancellable(cancel, "teardown of stale resources", self.terminate_infrastructure()).await?;
        cancellable(cancel, "storage pool creation", self.create_storage_pool()).await?;
        cancellable(cancel, "base image creation", self.create_base_image(cancel)).await?;
        cancellable(cancel, "network creation", self.create_network()).await?;
        Ok(())
    }
}

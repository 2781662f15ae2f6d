use crate::log::CallLog;
use async_trait::async_trait;
use delegatio::VirtHost;
use delegatio_shared::{DelegatioError, DelegatioResult};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

#[derive(Default)]
struct HostState {
    pools: BTreeSet<String>,
    volumes: BTreeSet<(String, String)>,
    networks: BTreeSet<String>,
    domains: BTreeSet<String>,
    network_polls: usize,
}

/// In-memory virtualization host.
///
/// Creating something that exists fails like libvirt does, destroying
/// something absent returns `NotFound`. Networks become active on the first
/// poll unless configured otherwise.
pub struct FakeHost {
    log: CallLog,
    state: Mutex<HostState>,
    failures: Mutex<Vec<(String, String)>>,
    delays: Mutex<HashMap<String, Duration>>,
    /// Polls answered "inactive" before the network turns active. `None`
    /// keeps it inactive forever.
    network_inactive_polls: Mutex<Option<usize>>,
    address: Mutex<IpAddr>,
}

/// Content of the first `<name>` element of a libvirt definition.
fn definition_name(definition: &str) -> String {
    definition
        .split_once("<name>")
        .and_then(|(_, rest)| rest.split_once("</name>"))
        .map(|(name, _)| name.trim().to_string())
        .unwrap_or_default()
}

impl FakeHost {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            state: Mutex::new(HostState::default()),
            failures: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
            network_inactive_polls: Mutex::new(Some(0)),
            address: Mutex::new(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        }
    }

    /// Address reported for every existing domain from now on.
    pub fn set_address(&self, address: IpAddr) {
        *self.address.lock() = address;
    }

    /// Make `op` on `name` fail with a provisioning error.
    pub fn fail(&self, op: &str, name: &str) {
        self.failures.lock().push((op.to_string(), name.to_string()));
    }

    /// Delay every `op` call.
    pub fn delay(&self, op: &str, delay: Duration) {
        self.delays.lock().insert(op.to_string(), delay);
    }

    pub fn activate_network_after(&self, polls: usize) {
        *self.network_inactive_polls.lock() = Some(polls);
    }

    pub fn never_activate_network(&self) {
        *self.network_inactive_polls.lock() = None;
    }

    pub fn seed_pool(&self, name: &str) {
        self.state.lock().pools.insert(name.to_string());
    }

    pub fn seed_volume(&self, pool: &str, name: &str) {
        self.state
            .lock()
            .volumes
            .insert((pool.to_string(), name.to_string()));
    }

    pub fn seed_network(&self, name: &str) {
        self.state.lock().networks.insert(name.to_string());
    }

    pub fn seed_domain(&self, name: &str) {
        self.state.lock().domains.insert(name.to_string());
    }

    pub fn pools(&self) -> Vec<String> {
        self.state.lock().pools.iter().cloned().collect()
    }

    pub fn volumes(&self) -> Vec<String> {
        self.state.lock().volumes.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn networks(&self) -> Vec<String> {
        self.state.lock().networks.iter().cloned().collect()
    }

    pub fn domains(&self) -> Vec<String> {
        self.state.lock().domains.iter().cloned().collect()
    }

    async fn enter(&self, op: &str, name: &str) -> DelegatioResult<()> {
        self.log.record(format!("{} {}", op, name));

        let delay = self.delays.lock().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let injected = self
            .failures
            .lock()
            .iter()
            .any(|(o, n)| o == op && n == name);
        if injected {
            return Err(DelegatioError::Provision(format!(
                "injected failure: {} {}",
                op, name
            )));
        }
        Ok(())
    }
}

fn insert_new(set: &mut BTreeSet<String>, kind: &str, name: &str) -> DelegatioResult<()> {
    if !set.insert(name.to_string()) {
        return Err(DelegatioError::Provision(format!(
            "{} '{}' already exists",
            kind, name
        )));
    }
    Ok(())
}

fn remove_existing(set: &mut BTreeSet<String>, kind: &str, name: &str) -> DelegatioResult<()> {
    if !set.remove(name) {
        return Err(DelegatioError::NotFound(format!("{} '{}'", kind, name)));
    }
    Ok(())
}

#[async_trait]
impl VirtHost for FakeHost {
    async fn create_pool(&self, name: &str, _definition: &str) -> DelegatioResult<()> {
        self.enter("create_pool", name).await?;
        insert_new(&mut self.state.lock().pools, "pool", name)
    }

    async fn create_volume(&self, pool: &str, definition: &str) -> DelegatioResult<()> {
        let name = definition_name(definition);
        self.enter("create_volume", &name).await?;
        let mut state = self.state.lock();
        if !state.pools.contains(pool) {
            return Err(DelegatioError::NotFound(format!("pool '{}'", pool)));
        }
        if !state.volumes.insert((pool.to_string(), name.clone())) {
            return Err(DelegatioError::Provision(format!(
                "volume '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    async fn upload_volume(&self, pool: &str, volume: &str, source: &Path) -> DelegatioResult<()> {
        self.enter("upload_volume", volume).await?;
        if !source.exists() {
            return Err(DelegatioError::Provision(format!(
                "cannot read {}",
                source.display()
            )));
        }
        if !self
            .state
            .lock()
            .volumes
            .contains(&(pool.to_string(), volume.to_string()))
        {
            return Err(DelegatioError::NotFound(format!("volume '{}'", volume)));
        }
        Ok(())
    }

    async fn create_network(&self, definition: &str) -> DelegatioResult<()> {
        let name = definition_name(definition);
        self.enter("create_network", &name).await?;
        let mut state = self.state.lock();
        state.network_polls = 0;
        insert_new(&mut state.networks, "network", &name)
    }

    async fn network_active(&self, name: &str) -> DelegatioResult<bool> {
        self.enter("network_active", name).await?;
        let threshold = *self.network_inactive_polls.lock();
        let mut state = self.state.lock();
        if !state.networks.contains(name) {
            return Err(DelegatioError::NotFound(format!("network '{}'", name)));
        }
        state.network_polls += 1;
        Ok(match threshold {
            Some(inactive) => state.network_polls > inactive,
            None => false,
        })
    }

    async fn create_domain(&self, definition: &str) -> DelegatioResult<()> {
        let name = definition_name(definition);
        self.enter("create_domain", &name).await?;
        insert_new(&mut self.state.lock().domains, "domain", &name)
    }

    async fn domain_address(&self, name: &str) -> DelegatioResult<Option<IpAddr>> {
        self.log.record(format!("domain_address {}", name));
        let address = *self.address.lock();
        Ok(self.state.lock().domains.contains(name).then_some(address))
    }

    async fn destroy_domain(&self, name: &str) -> DelegatioResult<()> {
        self.enter("destroy_domain", name).await?;
        remove_existing(&mut self.state.lock().domains, "domain", name)
    }

    async fn delete_volume(&self, pool: &str, name: &str) -> DelegatioResult<()> {
        self.enter("delete_volume", name).await?;
        if !self
            .state
            .lock()
            .volumes
            .remove(&(pool.to_string(), name.to_string()))
        {
            return Err(DelegatioError::NotFound(format!("volume '{}'", name)));
        }
        Ok(())
    }

    async fn destroy_network(&self, name: &str) -> DelegatioResult<()> {
        self.enter("destroy_network", name).await?;
        remove_existing(&mut self.state.lock().networks, "network", name)
    }

    async fn destroy_pool(&self, name: &str) -> DelegatioResult<()> {
        self.enter("destroy_pool", name).await?;
        remove_existing(&mut self.state.lock().pools, "pool", name)
    }
}

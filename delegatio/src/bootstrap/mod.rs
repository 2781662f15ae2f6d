//! Two-phase cluster formation on top of provisioned infrastructure.
//!
//! Phase 1 runs `kubeadm init` on the initializer node and extracts the
//! admin kubeconfig and worker join credentials from its output. Phase 2
//! joins every other node concurrently with those credentials. Phase 2 never
//! starts before Phase 1 has finished.

pub mod kubeconfig;
pub mod parser;

pub use parser::{
    ADMIN_CONFIG_BEGIN, ADMIN_CONFIG_END, InitCommand, InitOutputParser, JoinCredentials,
    KubeadmOutputParser,
};

use crate::constants::kubeadm;
use crate::fanout::{FanOut, cancellable};
use crate::infra::Infrastructure;
use crate::options::DelegatioOptions;
use crate::portal::{AgentDialer, RemoteControl, StreamFrame};
use crate::types::NodeId;
use delegatio_shared::{DelegatioError, DelegatioResult};
use futures::StreamExt;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const JOIN_PROGRAM: &str = "kubeadm";

/// Where a bootstrap run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    /// Nothing has run yet.
    Idle,
    Provisioning,
    Launching,
    AwaitingReady,
    Initializing,
    Joining,
    Ready,
    Failed,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStage::Idle => "idle",
            BootstrapStage::Provisioning => "provisioning",
            BootstrapStage::Launching => "launching",
            BootstrapStage::AwaitingReady => "awaiting readiness",
            BootstrapStage::Initializing => "initializing",
            BootstrapStage::Joining => "joining",
            BootstrapStage::Ready => "ready",
            BootstrapStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Drives a cluster from empty host to joined nodes.
pub struct ClusterBootstrap {
    infra: Arc<Infrastructure>,
    dialer: Arc<dyn AgentDialer>,
    parser: Arc<dyn InitOutputParser>,
    init_command: InitCommand,
    kubeadm_config: Option<PathBuf>,
    kubeconfig_path: PathBuf,
    stage: Mutex<BootstrapStage>,
}

impl ClusterBootstrap {
    pub fn new(
        infra: Arc<Infrastructure>,
        dialer: Arc<dyn AgentDialer>,
        options: &DelegatioOptions,
    ) -> Self {
        let config_file = options
            .kubeadm_config
            .as_ref()
            .map(|_| format!("{}/{}", kubeadm::CONFIG_DIR, kubeadm::CONFIG_FILE));
        Self {
            infra,
            dialer,
            parser: Arc::new(KubeadmOutputParser),
            init_command: KubeadmOutputParser::init_command(config_file.as_deref()),
            kubeadm_config: options.kubeadm_config.clone(),
            kubeconfig_path: options.kubeconfig_path(),
            stage: Mutex::new(BootstrapStage::Idle),
        }
    }

    /// Replace the output parser and the init command that feeds it.
    pub fn with_parser(mut self, parser: Arc<dyn InitOutputParser>, init_command: InitCommand) -> Self {
        self.parser = parser;
        self.init_command = init_command;
        self
    }

    pub fn stage(&self) -> BootstrapStage {
        *self.stage.lock()
    }

    pub fn infrastructure(&self) -> &Arc<Infrastructure> {
        &self.infra
    }

    pub fn dialer(&self) -> &Arc<dyn AgentDialer> {
        &self.dialer
    }

    fn enter(&self, stage: BootstrapStage) {
        tracing::info!(%stage, "bootstrap stage");
        *self.stage.lock() = stage;
    }

    /// Move to `Failed` and wrap `err` with the stage it happened in.
    fn fail(&self, err: DelegatioError) -> DelegatioError {
        let stage = {
            let mut current = self.stage.lock();
            let stage = *current;
            *current = BootstrapStage::Failed;
            stage
        };
        tracing::error!(%stage, error = %err, "bootstrap failed");
        DelegatioError::Bootstrap {
            stage: stage.to_string(),
            source: Box::new(err),
        }
    }

    /// Full run: clear and provision infrastructure, then form the cluster.
    pub async fn bootstrap(&self, cancel: &CancellationToken) -> DelegatioResult<Arc<JoinCredentials>> {
        self.enter(BootstrapStage::Provisioning);
        self.dialer.reset();
        self.infra
            .initialize_infrastructure(cancel)
            .await
            .map_err(|e| self.fail(e))?;
        self.initialize_kubernetes(cancel).await
    }

    /// Launch nodes, wait for readiness, init the control plane, join workers.
    pub async fn initialize_kubernetes(
        &self,
        cancel: &CancellationToken,
    ) -> DelegatioResult<Arc<JoinCredentials>> {
        self.enter(BootstrapStage::Launching);
        self.infra
            .launch_instances(cancel)
            .await
            .map_err(|e| self.fail(e))?;

        self.enter(BootstrapStage::AwaitingReady);
        self.infra
            .wait_for_network_ready(cancel)
            .await
            .map_err(|e| self.fail(e))?;
        self.infra
            .wait_for_agents_ready(self.dialer.as_ref(), cancel)
            .await
            .map_err(|e| self.fail(e))?;
        tracing::info!("delegatio-agent is ready on every node");

        self.enter(BootstrapStage::Initializing);
        let creds = cancellable(cancel, "kubernetes init", self.run_init())
            .await
            .map_err(|e| self.fail(e))?;
        let creds = Arc::new(creds);

        self.enter(BootstrapStage::Joining);
        self.run_joins(&creds, cancel)
            .await
            .map_err(|e| self.fail(e))?;

        self.enter(BootstrapStage::Ready);
        Ok(creds)
    }

    async fn run_init(&self) -> DelegatioResult<JoinCredentials> {
        let node = self.infra.layout().node_name(NodeId::INITIALIZER);
        let agent = self.dialer.dial(&node).await?;

        if let Some(path) = &self.kubeadm_config {
            let content = tokio::fs::read(path).await.map_err(|e| {
                DelegatioError::Config(format!(
                    "kubeadm config {} is not readable: {}",
                    path.display(),
                    e
                ))
            })?;
            agent
                .write_file(kubeadm::CONFIG_DIR, kubeadm::CONFIG_FILE, content)
                .await?;
            tracing::debug!(node = %node, "kubeadm config uploaded");
        }

        let raw = self.collect_init_output(agent.as_ref(), &node).await?;
        tracing::info!(node = %node, "kubernetes init successful");

        let admin = self.parser.admin_config(&raw)?;
        kubeconfig::persist_admin_config(&self.kubeconfig_path, &admin).await?;

        self.parser.join_credentials(&raw)
    }

    /// Accumulate the init command's stdout; stderr lines are only traced.
    async fn collect_init_output(&self, agent: &dyn RemoteControl, node: &str) -> DelegatioResult<String> {
        let cmd = &self.init_command;
        let mut frames = agent.exec_command_stream(&cmd.program, &cmd.args).await?;

        let mut output = Vec::new();
        while let Some(frame) = frames.next().await {
            match frame? {
                StreamFrame::Output(chunk) => output.extend_from_slice(&chunk),
                StreamFrame::Log(line) => tracing::info!(node = %node, "{}", line),
            }
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn run_joins(&self, creds: &Arc<JoinCredentials>, cancel: &CancellationToken) -> DelegatioResult<()> {
        let layout = self.infra.layout();
        let mut group = FanOut::new("join", cancel);
        for node in layout.joiners() {
            let name = layout.node_name(node);
            let dialer = Arc::clone(&self.dialer);
            let creds = Arc::clone(creds);
            group.spawn(format!("join {}", name), async move {
                let agent = dialer.dial(&name).await?;
                agent.exec_command(JOIN_PROGRAM, &creds.join_args()).await?;
                tracing::info!(node = %name, "node joined the cluster");
                Ok(())
            });
        }
        group.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(BootstrapStage::AwaitingReady.to_string(), "awaiting readiness");
        assert_eq!(BootstrapStage::Joining.to_string(), "joining");
    }
}

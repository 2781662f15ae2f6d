use crate::log::CallLog;
use async_trait::async_trait;
use delegatio::bootstrap::{ADMIN_CONFIG_BEGIN, ADMIN_CONFIG_END};
use delegatio::{AgentDialer, FrameStream, RemoteControl, StreamFrame};
use delegatio_shared::{DelegatioError, DelegatioResult};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SAMPLE_ENDPOINT: &str = "10.42.0.10:6443";
pub const SAMPLE_TOKEN: &str = "abcdef.0123456789abcdef";
pub const SAMPLE_HASH: &str =
    "sha256:7f2c1a9d0e4b3c6a8f5e2d1c0b9a8f7e6d5c4b3a2f1e0d9c8b7a6f5e4d3c2b1a";
pub const SAMPLE_KUBECONFIG: &str = "apiVersion: v1\nkind: Config\nclusters: []\n";

/// `kubeadm init` output followed by the marked admin kubeconfig.
pub fn sample_init_output() -> String {
    format!(
        "[init] Using Kubernetes version: v1.29.0\n\
         Your Kubernetes control-plane has initialized successfully!\n\
         \n\
         Then you can join any number of worker nodes by running the following on each as root:\n\
         \n\
         kubeadm join {} --token {} \\\n\
         \t--discovery-token-ca-cert-hash {}\n\
         {}\n{}{}\n",
        SAMPLE_ENDPOINT,
        SAMPLE_TOKEN,
        SAMPLE_HASH,
        ADMIN_CONFIG_BEGIN,
        SAMPLE_KUBECONFIG,
        ADMIN_CONFIG_END
    )
}

/// How scripted agents answer.
#[derive(Clone, Debug)]
pub struct AgentBehavior {
    /// Stdout of the init stream.
    pub init_output: String,
    /// Time the init stream takes before producing output.
    pub init_delay: Duration,
    /// End the init stream with a remote failure after its output.
    pub init_fails: bool,
    /// Pings that fail on each node before it answers.
    pub failing_pings: usize,
    /// Nodes whose `exec_command` fails.
    pub failing_exec: HashSet<String>,
}

impl Default for AgentBehavior {
    fn default() -> Self {
        Self {
            init_output: sample_init_output(),
            init_delay: Duration::ZERO,
            init_fails: false,
            failing_pings: 0,
            failing_exec: HashSet::new(),
        }
    }
}

/// Scripted agent for one node.
pub struct FakeAgent {
    node: String,
    log: CallLog,
    behavior: AgentBehavior,
    pings: AtomicUsize,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

#[async_trait]
impl RemoteControl for FakeAgent {
    async fn exec_command(&self, command: &str, args: &[String]) -> DelegatioResult<Vec<u8>> {
        self.log
            .record(format!("exec {} {} {}", self.node, command, args.join(" ")));
        if self.behavior.failing_exec.contains(&self.node) {
            return Err(DelegatioError::Internal(format!(
                "{} failed: exit status: 1",
                command
            )));
        }
        Ok(Vec::new())
    }

    async fn exec_command_stream(&self, command: &str, _args: &[String]) -> DelegatioResult<FrameStream> {
        self.log.record(format!("stream {} {}", self.node, command));
        tokio::time::sleep(self.behavior.init_delay).await;

        let output = self.behavior.init_output.as_bytes();
        let (head, tail) = output.split_at(output.len() / 2);
        let mut frames = vec![
            Ok(StreamFrame::Log("[preflight] Running pre-flight checks".to_string())),
            Ok(StreamFrame::Output(head.to_vec())),
            Ok(StreamFrame::Output(tail.to_vec())),
        ];
        if self.behavior.init_fails {
            frames.push(Err(DelegatioError::Internal(format!(
                "{} failed: exit status: 1",
                command
            ))));
        }
        self.log.record(format!("stream-open {}", self.node));

        // "stream-done" is recorded once the consumer has drained every frame.
        let log = self.log.clone();
        let node = self.node.clone();
        let done = futures::stream::once(async move {
            log.record(format!("stream-done {}", node));
            None
        });
        let frames = futures::stream::iter(frames.into_iter().map(Some))
            .chain(done)
            .filter_map(futures::future::ready);
        Ok(Box::pin(frames))
    }

    async fn write_file(&self, filepath: &str, filename: &str, content: Vec<u8>) -> DelegatioResult<()> {
        let path = format!("{}/{}", filepath, filename);
        self.log.record(format!("write {} {}", self.node, path));
        self.files.lock().insert(format!("{}:{}", self.node, path), content);
        Ok(())
    }

    async fn ping(&self) -> DelegatioResult<()> {
        self.log.record(format!("ping {}", self.node));
        let attempt = self.pings.fetch_add(1, Ordering::SeqCst);
        if attempt < self.behavior.failing_pings {
            return Err(DelegatioError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Dialer handing out one [`FakeAgent`] per node.
pub struct FakeDialer {
    log: CallLog,
    behavior: AgentBehavior,
    agents: Mutex<HashMap<String, Arc<FakeAgent>>>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FakeDialer {
    pub fn new(log: CallLog) -> Self {
        Self::with_behavior(log, AgentBehavior::default())
    }

    pub fn with_behavior(log: CallLog, behavior: AgentBehavior) -> Self {
        Self {
            log,
            behavior,
            agents: Mutex::new(HashMap::new()),
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Content written to `path` on `node`, if any.
    pub fn file(&self, node: &str, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(&format!("{}:{}", node, path)).cloned()
    }

    fn agent(&self, node: &str) -> Arc<FakeAgent> {
        self.agents
            .lock()
            .entry(node.to_string())
            .or_insert_with(|| {
                Arc::new(FakeAgent {
                    node: node.to_string(),
                    log: self.log.clone(),
                    behavior: self.behavior.clone(),
                    pings: AtomicUsize::new(0),
                    files: Arc::clone(&self.files),
                })
            })
            .clone()
    }
}

#[async_trait]
impl AgentDialer for FakeDialer {
    async fn dial(&self, node: &str) -> DelegatioResult<Arc<dyn RemoteControl>> {
        let agent: Arc<dyn RemoteControl> = self.agent(node);
        Ok(agent)
    }
}

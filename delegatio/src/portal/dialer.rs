//! Resolving node names to agent sessions.

use crate::infra::VirtHost;
use crate::portal::remote::{FrameStream, RemoteControl};
use crate::portal::session::AgentSession;
use async_trait::async_trait;
use delegatio_shared::{DelegatioError, DelegatioResult, Transport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Hands out a remote-control handle for a node by name.
#[async_trait]
pub trait AgentDialer: Send + Sync {
    async fn dial(&self, node: &str) -> DelegatioResult<Arc<dyn RemoteControl>>;

    /// Drop every cached session. Called when the domains they point at
    /// are torn down or about to be recreated.
    fn reset(&self) {}
}

type SessionCache = Arc<Mutex<HashMap<String, CachedSession>>>;

struct CachedSession {
    addr: SocketAddr,
    session: Arc<AgentSession>,
}

/// Dials agents at the address the virtualization host reports for a domain.
///
/// The address is resolved on every dial. A cached session is reused only
/// while the node still reports the address it was opened for, and is
/// evicted as soon as a call on it fails at the transport level.
pub struct HostDialer {
    host: Arc<dyn VirtHost>,
    port: u16,
    connect_timeout: Duration,
    sessions: SessionCache,
}

impl HostDialer {
    pub fn new(host: Arc<dyn VirtHost>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host,
            port,
            connect_timeout,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of nodes with a cached session.
    pub fn cached(&self) -> usize {
        self.sessions.lock().len()
    }

    fn session_for(&self, node: &str, addr: SocketAddr) -> Arc<AgentSession> {
        let mut sessions = self.sessions.lock();
        if let Some(cached) = sessions.get(node) {
            if cached.addr == addr {
                return Arc::clone(&cached.session);
            }
            tracing::debug!(node, old = %cached.addr, new = %addr, "agent address changed");
        }

        let session = Arc::new(AgentSession::with_connect_timeout(
            Transport::tcp(addr),
            self.connect_timeout,
        ));
        sessions.insert(
            node.to_string(),
            CachedSession {
                addr,
                session: Arc::clone(&session),
            },
        );
        session
    }
}

#[async_trait]
impl AgentDialer for HostDialer {
    async fn dial(&self, node: &str) -> DelegatioResult<Arc<dyn RemoteControl>> {
        let ip = match self.host.domain_address(node).await? {
            Some(ip) => ip,
            None => {
                self.sessions.lock().remove(node);
                return Err(DelegatioError::Rpc(format!(
                    "node {} has no network address yet",
                    node
                )));
            }
        };
        let addr = SocketAddr::new(ip, self.port);
        tracing::trace!(node, %addr, "resolved agent address");

        let session = self.session_for(node, addr);
        Ok(Arc::new(DialedAgent {
            node: node.to_string(),
            addr,
            session,
            sessions: Arc::clone(&self.sessions),
        }))
    }

    fn reset(&self) {
        let dropped = std::mem::take(&mut *self.sessions.lock());
        if !dropped.is_empty() {
            tracing::debug!(sessions = dropped.len(), "dropped cached agent sessions");
        }
    }
}

/// Session handed out by [`HostDialer`]; evicts itself from the cache on
/// transport failures so the next dial opens a fresh connection.
struct DialedAgent {
    node: String,
    addr: SocketAddr,
    session: Arc<AgentSession>,
    sessions: SessionCache,
}

impl DialedAgent {
    fn observe<T>(&self, result: DelegatioResult<T>) -> DelegatioResult<T> {
        if let Err(DelegatioError::Rpc(reason)) = &result {
            let mut sessions = self.sessions.lock();
            if sessions.get(&self.node).is_some_and(|c| c.addr == self.addr) {
                sessions.remove(&self.node);
                tracing::debug!(node = %self.node, addr = %self.addr, %reason, "evicted agent session");
            }
        }
        result
    }
}

#[async_trait]
impl RemoteControl for DialedAgent {
    async fn exec_command(&self, command: &str, args: &[String]) -> DelegatioResult<Vec<u8>> {
        let result = self.session.exec_command(command, args).await;
        self.observe(result)
    }

    async fn exec_command_stream(&self, command: &str, args: &[String]) -> DelegatioResult<FrameStream> {
        let result = self.session.exec_command_stream(command, args).await;
        self.observe(result)
    }

    async fn write_file(&self, filepath: &str, filename: &str, content: Vec<u8>) -> DelegatioResult<()> {
        let result = self.session.write_file(filepath, filename, content).await;
        self.observe(result)
    }
}

use async_trait::async_trait;
use delegatio::portal::AgentSession;
use delegatio::{AgentDialer, RemoteControl, Transport};
use delegatio_agent::GuestAgent;
use delegatio_shared::DelegatioResult;
use std::net::SocketAddr;
use std::sync::Arc;

/// Serve a real agent on an ephemeral loopback port.
pub async fn spawn_agent() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(GuestAgent::new().serve_tcp(listener));
    addr
}

/// Dialer sending every node to the same agent address.
pub struct StaticDialer {
    session: Arc<AgentSession>,
}

impl StaticDialer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            session: Arc::new(AgentSession::new(Transport::tcp(addr))),
        }
    }
}

#[async_trait]
impl AgentDialer for StaticDialer {
    async fn dial(&self, _node: &str) -> DelegatioResult<Arc<dyn RemoteControl>> {
        let session: Arc<dyn RemoteControl> = self.session.clone();
        Ok(session)
    }
}

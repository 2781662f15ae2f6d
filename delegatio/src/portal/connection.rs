//! Connection management.
//!
//! Converts Transport to tonic Channel with lazy initialization.

use delegatio_shared::{DelegatioResult, Transport};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

/// Lazy connection to a node agent.
///
/// Connects on first use. A failed attempt leaves the cell empty so the
/// next call dials again.
#[derive(Clone)]
pub struct Connection {
    transport: Transport,
    connect_timeout: Option<Duration>,
    channel: Arc<OnceCell<Channel>>,
}

impl Connection {
    /// Create a lazy connection (does not connect immediately).
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            connect_timeout: None,
            channel: Arc::new(OnceCell::new()),
        }
    }

    /// Bound each dial attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Get or establish the channel.
    pub async fn channel(&self) -> DelegatioResult<Channel> {
        let channel = self
            .channel
            .get_or_try_init(|| async {
                connect_transport(&self.transport, self.connect_timeout).await
            })
            .await?;

        Ok(channel.clone())
    }
}

async fn connect_transport(
    transport: &Transport,
    connect_timeout: Option<Duration>,
) -> DelegatioResult<Channel> {
    match transport {
        Transport::Unix { socket_path } => {
            tracing::debug!("Connecting via Unix: {}", socket_path.display());
            connect_unix(socket_path, connect_timeout).await
        }
        Transport::Tcp { addr } => {
            tracing::debug!("Connecting via TCP: {}", addr);
            connect_tcp(*addr, connect_timeout).await
        }
    }
}

fn endpoint(uri: String, connect_timeout: Option<Duration>) -> DelegatioResult<Endpoint> {
    let endpoint = Endpoint::try_from(uri)?;
    Ok(match connect_timeout {
        Some(timeout) => endpoint.connect_timeout(timeout),
        None => endpoint,
    })
}

async fn connect_unix(
    socket_path: &std::path::Path,
    connect_timeout: Option<Duration>,
) -> DelegatioResult<Channel> {
    let socket_path = socket_path.to_path_buf();

    let channel = endpoint("http://[::]:50051".to_string(), connect_timeout)?
        .connect_with_connector(service_fn(move |_: Uri| {
            let socket_path = socket_path.clone();
            async move {
                let stream = tokio::net::UnixStream::connect(socket_path).await?;
                Ok::<_, std::io::Error>(TokioIo::new(stream))
            }
        }))
        .await?;

    tracing::debug!("Connected via Unix socket");
    Ok(channel)
}

async fn connect_tcp(addr: SocketAddr, connect_timeout: Option<Duration>) -> DelegatioResult<Channel> {
    let channel = endpoint(format!("http://{}", addr), connect_timeout)?
        .connect()
        .await?;

    tracing::debug!("Connected via TCP");
    Ok(channel)
}

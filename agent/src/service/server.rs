use delegatio_shared::{AgentServer, DelegatioError, DelegatioResult, Transport};
use std::sync::Arc;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tracing::info;

/// Bytes read from a child's stdout per output frame.
pub(crate) const DEFAULT_READ_CHUNK: usize = 8 * 1024;

/// Control agent server.
///
/// Implements the `Agent` gRPC service: unary exec, streaming exec and
/// file writes. Stateless between requests.
pub struct GuestAgent {
    /// Maximum size of one `Output` frame
    pub(crate) read_chunk: usize,
}

impl Default for GuestAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestAgent {
    pub fn new() -> Self {
        Self {
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }

    /// Override the output frame size.
    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk.max(1);
        self
    }

    fn router(self) -> Router {
        Server::builder().add_service(AgentServer::from_arc(Arc::new(self)))
    }

    /// Run the tonic server listening on the specified transport URI.
    pub async fn run(self, listen_uri: &str) -> DelegatioResult<()> {
        let transport = Transport::from_uri(listen_uri).map_err(|e| {
            DelegatioError::Config(format!("Invalid listen URI '{}': {}", listen_uri, e))
        })?;

        info!("Parsed transport from URI: {:?}", transport);

        match transport {
            Transport::Tcp { addr } => {
                info!("Binding to TCP address: {}", addr);
                let listener = tokio::net::TcpListener::bind(addr).await?;
                self.serve_tcp(listener).await
            }
            Transport::Unix { socket_path } => {
                #[cfg(unix)]
                {
                    // Remove socket if it exists
                    if socket_path.exists() {
                        std::fs::remove_file(&socket_path)?;
                    }
                    if let Some(parent) = socket_path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }

                    info!("Binding to Unix socket: {}", socket_path.display());
                    let listener = tokio::net::UnixListener::bind(&socket_path)?;
                    self.serve_unix(listener).await
                }
                #[cfg(not(unix))]
                {
                    Err(DelegatioError::Config(format!(
                        "unix sockets are not supported on this platform: {}",
                        socket_path.display()
                    )))
                }
            }
        }
    }

    /// Serve on an already bound TCP listener.
    pub async fn serve_tcp(self, listener: tokio::net::TcpListener) -> DelegatioResult<()> {
        use tokio_stream::wrappers::TcpListenerStream;

        info!("Listening on tcp://{}", listener.local_addr()?);
        self.router()
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .map_err(|e| DelegatioError::Internal(format!("Server error: {}", e)))
    }

    /// Serve on an already bound Unix listener.
    #[cfg(unix)]
    pub async fn serve_unix(self, listener: tokio::net::UnixListener) -> DelegatioResult<()> {
        use tokio_stream::wrappers::UnixListenerStream;

        info!("Listening on unix socket");
        self.router()
            .serve_with_incoming(UnixListenerStream::new(listener))
            .await
            .map_err(|e| DelegatioError::Internal(format!("Server error: {}", e)))
    }
}

//! Transport types for host-agent communication.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Transport mechanism for host-agent communication.
///
/// The agent listens on it, the host dials it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Transport {
    /// TCP transport (agent reachable on the virtual network)
    Tcp { addr: SocketAddr },

    /// Unix socket transport
    Unix { socket_path: PathBuf },
}

impl Transport {
    /// Create a TCP transport.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self::Tcp { addr }
    }

    /// Create a Unix socket transport.
    pub fn unix(socket_path: PathBuf) -> Self {
        Self::Unix { socket_path }
    }

    /// Get the URI representation of this transport.
    pub fn to_uri(&self) -> String {
        match self {
            Transport::Tcp { addr } => format!("tcp://{}", addr),
            Transport::Unix { socket_path } => format!("unix://{}", socket_path.display()),
        }
    }

    /// Parse a transport from a URI string.
    pub fn from_uri(uri: &str) -> Result<Self, String> {
        if let Some(rest) = uri.strip_prefix("tcp://") {
            let addr = rest
                .parse::<SocketAddr>()
                .map_err(|e| format!("invalid TCP address in '{}': {}", uri, e))?;
            Ok(Self::tcp(addr))
        } else if let Some(path) = uri.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(format!("invalid unix URI '{}': missing path", uri));
            }
            Ok(Self::unix(PathBuf::from(path)))
        } else {
            Err(format!(
                "invalid transport URI '{}': expected tcp:// or unix://",
                uri
            ))
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_with_host() {
        let t: Transport = "tcp://10.42.0.11:9000".parse().unwrap();
        assert_eq!(t, Transport::tcp("10.42.0.11:9000".parse().unwrap()));
        assert_eq!(t.to_uri(), "tcp://10.42.0.11:9000");
    }

    #[test]
    fn parses_unix() {
        let t = Transport::from_uri("unix:///run/delegatio/agent.sock").unwrap();
        assert_eq!(t, Transport::unix(PathBuf::from("/run/delegatio/agent.sock")));
    }

    #[test]
    fn rejects_missing_port_and_unknown_scheme() {
        assert!(Transport::from_uri("tcp://10.42.0.11").is_err());
        assert!(Transport::from_uri("unix://").is_err());
        assert!(Transport::from_uri("vsock://2695").is_err());
    }
}

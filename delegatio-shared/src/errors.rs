//! Error type shared by the host orchestrator and the guest agent.

use thiserror::Error;

/// Result alias used throughout delegatio.
pub type DelegatioResult<T> = Result<T, DelegatioError>;

/// Every failure delegatio can report.
///
/// Leaf operations return the narrow variants. The fan-out task groups wrap
/// the first failure in [`DelegatioError::FanOut`], and the bootstrap entry
/// point wraps whatever escaped in [`DelegatioError::Bootstrap`] so the
/// caller learns which stage failed.
#[derive(Debug, Error)]
pub enum DelegatioError {
    /// Pool, volume, network or domain creation/teardown failed on the host.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// A host resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A readiness gate expired.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A remote exec, stream or file write failed on the guest.
    #[error("remote execution failed: {0}")]
    Internal(String),

    /// The initializer's output could not be parsed.
    #[error("could not parse init output: {0}")]
    ProtocolParse(String),

    /// The operation observed cancellation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// First failure of a fan-out task group. Sibling errors are discarded.
    #[error("{task} failed: {source}")]
    FanOut {
        task: String,
        #[source]
        source: Box<DelegatioError>,
    },

    /// Bootstrap aborted in `stage`.
    #[error("bootstrap failed while {stage}: {source}")]
    Bootstrap {
        stage: String,
        #[source]
        source: Box<DelegatioError>,
    },

    /// Invalid options or templates.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local filesystem failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The gRPC transport to an agent failed.
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl DelegatioError {
    /// Whether this error means the resource was already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DelegatioError::NotFound(_))
    }

    /// Innermost error, unwrapping fan-out and bootstrap wrappers.
    pub fn root_cause(&self) -> &DelegatioError {
        match self {
            DelegatioError::FanOut { source, .. } | DelegatioError::Bootstrap { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

impl From<std::io::Error> for DelegatioError {
    fn from(err: std::io::Error) -> Self {
        DelegatioError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DelegatioError {
    fn from(err: serde_json::Error) -> Self {
        DelegatioError::Config(err.to_string())
    }
}

impl From<tonic::transport::Error> for DelegatioError {
    fn from(err: tonic::transport::Error) -> Self {
        DelegatioError::Rpc(err.to_string())
    }
}

impl From<tonic::Status> for DelegatioError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            tonic::Code::Internal => DelegatioError::Internal(message),
            tonic::Code::DeadlineExceeded => DelegatioError::Timeout(message),
            tonic::Code::Cancelled => DelegatioError::Cancelled(message),
            tonic::Code::NotFound => DelegatioError::NotFound(message),
            tonic::Code::InvalidArgument => DelegatioError::Config(message),
            code => DelegatioError::Rpc(format!("{:?}: {}", code, message)),
        }
    }
}

impl From<DelegatioError> for tonic::Status {
    fn from(err: DelegatioError) -> Self {
        match err {
            DelegatioError::NotFound(msg) => tonic::Status::not_found(msg),
            DelegatioError::Config(msg) => tonic::Status::invalid_argument(msg),
            DelegatioError::Timeout(msg) => tonic::Status::deadline_exceeded(msg),
            DelegatioError::Cancelled(msg) => tonic::Status::cancelled(msg),
            DelegatioError::Internal(msg) => tonic::Status::internal(msg),
            other => tonic::Status::internal(other.to_string()),
        }
    }
}

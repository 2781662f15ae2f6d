//! Delegatio control agent.
//!
//! Serves the `delegatio.v1.Agent` gRPC service inside a cluster node so the
//! host orchestrator can run commands and drop files on it.

pub mod service;

pub use service::server::GuestAgent;

//! Delegatio shared code for the host orchestrator and the guest agent.
//!
//! This crate contains the remote control wire schema, the error type
//! used on both sides of the boundary, and the transport description the
//! host dials and the agent listens on.

pub mod constants;
pub mod errors;
pub mod transport;

// Generated protobuf types
pub mod generated {
    #![allow(clippy::all, unused_qualifications)]
    tonic::include_proto!("delegatio.v1");
}

pub use errors::{DelegatioError, DelegatioResult};
pub use transport::Transport;

// Agent service
pub use generated::agent_client::AgentClient;
pub use generated::agent_server::{Agent, AgentServer};

// All generated types
pub use generated::*;

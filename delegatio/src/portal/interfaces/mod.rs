//! Service interfaces.
//!
//! High-level facades over gRPC services.

pub mod agent;

pub use agent::AgentInterface;

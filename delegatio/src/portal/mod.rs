//! Host-side portal for driving node agents over tonic/gRPC.

pub mod connection;
pub mod dialer;
pub mod interfaces;
pub mod remote;
pub mod session;

pub use dialer::{AgentDialer, HostDialer};
pub use remote::{FrameStream, RemoteControl, StreamFrame};
pub use session::AgentSession;

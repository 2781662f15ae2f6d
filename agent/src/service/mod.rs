//! Agent service implementations.
//!
//! - `server`: transport binding and the tonic server
//! - `agent`: the `delegatio.v1.Agent` RPC surface
//! - `exec`: process spawning for unary and streaming execution
//! - `file`: file uploads

mod agent;
pub(crate) mod exec;
pub(crate) mod file;
pub mod server;

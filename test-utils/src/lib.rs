//! Test doubles and fixtures shared by delegatio integration tests.
//!
//! - [`FakeHost`]: in-memory virtualization host with failure injection
//! - [`FakeDialer`] / [`FakeAgent`]: scripted node agents
//! - [`RecordingParser`]: kubeadm output parser that logs each parse
//! - [`spawn_agent`] / [`StaticDialer`]: a real agent over loopback gRPC
//!
//! Every double records into a shared [`CallLog`] so tests can assert on
//! call order across the host and the agents.

mod agent;
mod host;
mod log;
mod parser;
mod server;

pub use agent::{
    AgentBehavior, FakeAgent, FakeDialer, SAMPLE_ENDPOINT, SAMPLE_HASH, SAMPLE_KUBECONFIG,
    SAMPLE_TOKEN, sample_init_output,
};
pub use host::FakeHost;
pub use log::CallLog;
pub use parser::RecordingParser;
pub use server::{StaticDialer, spawn_agent};

use delegatio::{DelegatioOptions, Timeouts};
use std::path::Path;

/// Options rooted at `home` with a small fake image and short timeouts.
pub fn test_options(home: &Path) -> DelegatioOptions {
    let image_path = home.join("image.qcow2");
    std::fs::create_dir_all(home).expect("create test home");
    std::fs::write(&image_path, vec![0u8; 4096]).expect("write fake image");

    DelegatioOptions {
        home_dir: home.to_path_buf(),
        image_path,
        pool_path: home.join("pool"),
        timeouts: Timeouts {
            poll_interval_ms: 10,
            probe_ms: 200,
            network_ready_ms: 2_000,
            agent_ready_ms: 2_000,
            upload_ms: 2_000,
        },
        ..DelegatioOptions::default()
    }
}

//! Delegatio provisions a small virtual cluster on a libvirt host and forms
//! a Kubernetes cluster on it by driving a control agent inside each node.
//!
//! The usual entry point is [`Delegatio`]:
//!
//! ```rust,no_run
//! use delegatio::{Delegatio, DelegatioOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> delegatio::DelegatioResult<()> {
//! let orchestrator = Delegatio::new(DelegatioOptions::default())?;
//! let creds = orchestrator.bootstrap(&CancellationToken::new()).await?;
//! println!("cluster API at {}", creds.api_endpoint());
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod constants;
pub mod fanout;
pub mod infra;
pub mod lock;
pub mod options;
pub mod portal;
pub mod runtime;
pub mod types;
pub mod util;

pub use bootstrap::{BootstrapStage, ClusterBootstrap, InitOutputParser, JoinCredentials};
pub use delegatio_shared::{DelegatioError, DelegatioResult, Transport};
pub use infra::{Infrastructure, VirshHost, VirtHost};
pub use options::{DelegatioOptions, Timeouts};
pub use portal::{AgentDialer, FrameStream, HostDialer, RemoteControl, StreamFrame};
pub use runtime::Delegatio;
pub use types::{ClusterLayout, NodeId};
pub use util::init_logging_for;

//! Remote-control surface the orchestrator uses to drive one node.

use crate::portal::session::AgentSession;
use async_trait::async_trait;
use delegatio_shared::DelegatioResult;
use delegatio_shared::constants::agent::PROBE_COMMAND;
use futures::Stream;
use std::pin::Pin;

/// One frame of a streamed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Raw stdout bytes.
    Output(Vec<u8>),
    /// One stderr line.
    Log(String),
}

pub type FrameStream = Pin<Box<dyn Stream<Item = DelegatioResult<StreamFrame>> + Send>>;

/// Operations a node agent accepts.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    /// Run a command to completion and return stdout followed by stderr.
    async fn exec_command(&self, command: &str, args: &[String]) -> DelegatioResult<Vec<u8>>;

    /// Run a command and stream its output.
    async fn exec_command_stream(&self, command: &str, args: &[String]) -> DelegatioResult<FrameStream>;

    /// Write a file into an existing directory.
    async fn write_file(&self, filepath: &str, filename: &str, content: Vec<u8>) -> DelegatioResult<()>;

    /// Liveness check: succeeds once the agent answers a trivial command.
    async fn ping(&self) -> DelegatioResult<()> {
        self.exec_command(PROBE_COMMAND, &[]).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteControl for AgentSession {
    async fn exec_command(&self, command: &str, args: &[String]) -> DelegatioResult<Vec<u8>> {
        self.agent().await?.exec_command(command, args).await
    }

    async fn exec_command_stream(&self, command: &str, args: &[String]) -> DelegatioResult<FrameStream> {
        self.agent().await?.exec_command_stream(command, args).await
    }

    async fn write_file(&self, filepath: &str, filename: &str, content: Vec<u8>) -> DelegatioResult<()> {
        self.agent().await?.write_file(filepath, filename, content).await
    }
}

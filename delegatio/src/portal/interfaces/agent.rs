//! Agent service interface.
//!
//! Request building and response unwrapping for the three agent RPCs.

use crate::portal::remote::{FrameStream, StreamFrame};
use delegatio_shared::{
    AgentClient, DelegatioError, DelegatioResult, ExecCommandRequest, ExecCommandStreamRequest,
    WriteFileRequest, exec_command_stream_response,
};
use tonic::transport::Channel;

/// Agent service interface.
#[derive(Clone)]
pub struct AgentInterface {
    client: AgentClient<Channel>,
}

impl AgentInterface {
    /// Create from a channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            client: AgentClient::new(channel),
        }
    }

    /// Run a command to completion and return its combined output.
    pub async fn exec_command(&mut self, command: &str, args: &[String]) -> DelegatioResult<Vec<u8>> {
        tracing::debug!(command, ?args, "ExecCommand");
        let request = ExecCommandRequest {
            command: command.to_string(),
            args: args.to_vec(),
        };
        let response = self.client.exec_command(request).await?.into_inner();
        Ok(response.output)
    }

    /// Start a command and return its output as it is produced.
    ///
    /// Stdout arrives as [`StreamFrame::Output`], stderr lines as
    /// [`StreamFrame::Log`]. A failing command ends the stream with an error.
    pub async fn exec_command_stream(
        &mut self,
        command: &str,
        args: &[String],
    ) -> DelegatioResult<FrameStream> {
        tracing::debug!(command, ?args, "ExecCommandStream");
        let request = ExecCommandStreamRequest {
            command: command.to_string(),
            args: args.to_vec(),
        };
        let mut inbound = self.client.exec_command_stream(request).await?.into_inner();

        let frames = async_stream::stream! {
            loop {
                match inbound.message().await {
                    Ok(Some(frame)) => match frame.content {
                        Some(exec_command_stream_response::Content::Output(data)) => {
                            yield Ok(StreamFrame::Output(data));
                        }
                        Some(exec_command_stream_response::Content::Log(log)) => {
                            yield Ok(StreamFrame::Log(log.message));
                        }
                        None => {}
                    },
                    Ok(None) => break,
                    Err(status) => {
                        yield Err(DelegatioError::from(status));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(frames))
    }

    /// Write `content` to `filepath/filename` on the node.
    pub async fn write_file(
        &mut self,
        filepath: &str,
        filename: &str,
        content: Vec<u8>,
    ) -> DelegatioResult<()> {
        tracing::debug!(filepath, filename, bytes = content.len(), "WriteFile");
        let request = WriteFileRequest {
            filepath: filepath.to_string(),
            filename: filename.to_string(),
            content,
        };
        self.client.write_file(request).await?;
        Ok(())
    }
}

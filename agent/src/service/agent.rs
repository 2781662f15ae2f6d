//! `delegatio.v1.Agent` service implementation.

use crate::service::exec;
use crate::service::file;
use crate::service::server::GuestAgent;
use delegatio_shared::{
    Agent, ExecCommandRequest, ExecCommandResponse, ExecCommandStreamRequest,
    ExecCommandStreamResponse, WriteFileRequest, WriteFileResponse,
};
use futures::stream::Stream;
use std::pin::Pin;
use tonic::{Request, Response, Status};
use tracing::{error, info};

#[tonic::async_trait]
impl Agent for GuestAgent {
    type ExecCommandStreamStream =
        Pin<Box<dyn Stream<Item = Result<ExecCommandStreamResponse, Status>> + Send + 'static>>;

    async fn exec_command_stream(
        &self,
        request: Request<ExecCommandStreamRequest>,
    ) -> Result<Response<Self::ExecCommandStreamStream>, Status> {
        let req = request.into_inner();
        info!(command = %req.command, args = ?req.args, "exec stream request");

        let frames = exec::spawn_streaming(req.command, req.args, self.read_chunk)?;
        Ok(Response::new(Box::pin(frames) as Self::ExecCommandStreamStream))
    }

    async fn exec_command(
        &self,
        request: Request<ExecCommandRequest>,
    ) -> Result<Response<ExecCommandResponse>, Status> {
        let req = request.into_inner();
        info!(command = %req.command, args = ?req.args, "exec request");

        let output = exec::run_to_completion(&req.command, &req.args)
            .await
            .inspect_err(|e| error!(command = %req.command, error = %e.message(), "exec failed"))?;
        Ok(Response::new(ExecCommandResponse { output }))
    }

    async fn write_file(
        &self,
        request: Request<WriteFileRequest>,
    ) -> Result<Response<WriteFileResponse>, Status> {
        let req = request.into_inner();
        info!(path = %req.filepath, name = %req.filename, "request to write file");

        file::write_file(&req.filepath, &req.filename, &req.content)
            .await
            .inspect_err(|e| {
                error!(path = %req.filepath, name = %req.filename, error = %e.message(), "failed to write file")
            })?;
        Ok(Response::new(WriteFileResponse {}))
    }
}

//! Command execution.
//!
//! Unary execution collects the combined output once the process exits.
//! Streaming execution forwards stdout chunks as `Output` frames and stderr
//! lines as `Log` frames while the process runs.

use delegatio_shared::{exec_command_stream_response, ExecCommandStreamResponse, Log};
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;
use tracing::debug;

/// Frames buffered between the child pumps and the gRPC stream.
const STREAM_BUFFER: usize = 64;

/// Stderr lines kept for the failure status of a streamed command.
const STDERR_TAIL: usize = 5;

type FrameSender = mpsc::Sender<Result<ExecCommandStreamResponse, Status>>;

fn command(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
    cmd
}

fn start_failed(program: &str, err: std::io::Error) -> Status {
    Status::internal(format!("command '{}' failed to start: {}", program, err))
}

/// Run a command to completion, returning stdout followed by stderr.
pub(crate) async fn run_to_completion(program: &str, args: &[String]) -> Result<Vec<u8>, Status> {
    let output = command(program, args)
        .output()
        .await
        .map_err(|e| start_failed(program, e))?;

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);

    if !output.status.success() {
        return Err(Status::internal(format!(
            "command '{}' exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&combined).trim()
        )));
    }

    Ok(combined)
}

fn output_frame(data: Vec<u8>) -> ExecCommandStreamResponse {
    ExecCommandStreamResponse {
        content: Some(exec_command_stream_response::Content::Output(data)),
    }
}

fn log_frame(message: String) -> ExecCommandStreamResponse {
    ExecCommandStreamResponse {
        content: Some(exec_command_stream_response::Content::Log(Log { message })),
    }
}

/// Spawn a command and return the stream of its frames.
///
/// The stream ends after the last frame if the command succeeds, or with an
/// `Internal` status if it exits abnormally. That status carries the last
/// few stderr lines. Dropping the stream kills the child.
pub(crate) fn spawn_streaming(
    program: String,
    args: Vec<String>,
    read_chunk: usize,
) -> Result<ReceiverStream<Result<ExecCommandStreamResponse, Status>>, Status> {
    let mut child = command(&program, &args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| start_failed(&program, e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Status::internal("child stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Status::internal("child stderr was not captured"))?;

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    tokio::spawn(async move {
        let log_pump = tokio::spawn(pump_logs(stderr, tx.clone()));

        if !pump_output(stdout, read_chunk, &tx).await {
            // Receiver gone or read failed; dropping the child kills it.
            log_pump.abort();
            return;
        }
        let tail = log_pump.await.unwrap_or_default();

        match child.wait().await {
            Ok(status) if status.success() => {
                debug!(command = %program, "streamed command finished");
            }
            Ok(status) => {
                let mut message = format!("command '{}' exited with {}", program, status);
                if !tail.is_empty() {
                    message.push_str(": ");
                    message.push_str(&Vec::from(tail).join("\n"));
                }
                let _ = tx.send(Err(Status::internal(message))).await;
            }
            Err(e) => {
                let _ = tx
                    .send(Err(Status::internal(format!(
                        "waiting for command '{}' failed: {}",
                        program, e
                    ))))
                    .await;
            }
        }
    });

    Ok(ReceiverStream::new(rx))
}

/// Forward stdout in order. Returns false if the stream must stop early.
async fn pump_output<R>(mut reader: R, read_chunk: usize, tx: &FrameSender) -> bool
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; read_chunk];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return true,
            Ok(n) => {
                if tx.send(Ok(output_frame(buf[..n].to_vec()))).await.is_err() {
                    return false;
                }
            }
            Err(e) => {
                let _ = tx
                    .send(Err(Status::internal(format!("reading output failed: {}", e))))
                    .await;
                return false;
            }
        }
    }
}

/// Forward stderr line by line and return the last [`STDERR_TAIL`] lines.
async fn pump_logs<R>(reader: R, tx: FrameSender) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line.clone());
        if tx.send(Ok(log_frame(line))).await.is_err() {
            break;
        }
    }
    tail
}

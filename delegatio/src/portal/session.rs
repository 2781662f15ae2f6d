//! High-level agent session.
//!
//! Thin facade over the agent interface.

use crate::portal::connection::Connection;
use crate::portal::interfaces::AgentInterface;
use delegatio_shared::{DelegatioResult, Transport};
use std::time::Duration;

/// Session with one node agent (connects lazily on first use).
#[derive(Clone)]
pub struct AgentSession {
    connection: Connection,
}

impl AgentSession {
    pub fn new(transport: Transport) -> Self {
        Self {
            connection: Connection::new(transport),
        }
    }

    pub fn with_connect_timeout(transport: Transport, timeout: Duration) -> Self {
        Self {
            connection: Connection::new(transport).with_connect_timeout(timeout),
        }
    }

    /// Get the agent interface.
    pub async fn agent(&self) -> DelegatioResult<AgentInterface> {
        let channel = self.connection.channel().await?;
        Ok(AgentInterface::new(channel))
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<AgentSession>;
};

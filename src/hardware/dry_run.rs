//! Transport for running the host without an FPGA attached.

use crate::error::Result;
use crate::hardware::Transport;
use async_trait::async_trait;

/// Logs every message it would have sent and keeps nothing.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    sent: u64,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages accepted so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[async_trait]
impl Transport for DryRunTransport {
    async fn send_text(&mut self, command: &str) -> Result<()> {
        self.sent += 1;
        tracing::info!("dry run -> {}", command);
        Ok(())
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.sent += 1;
        tracing::info!("dry run -> frame {:02X?}", frame);
        Ok(())
    }
}

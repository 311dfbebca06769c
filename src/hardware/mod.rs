// src/hardware/mod.rs - Byte sink between the device facade and the FPGA link
pub mod dry_run;
pub mod recording;
pub mod serial;

pub use dry_run::DryRunTransport;
pub use recording::{RecordingTransport, TransportEvent, TransportLog};
pub use serial::{FramedTransport, SerialTransport};

use crate::error::Result;
use async_trait::async_trait;

/// What the device facade needs from the link to the FPGA.
///
/// `send_text` carries plain control commands (`Board1 Select`,
/// `WRITE DDS REG`); `send_frame` carries the binary register payload that
/// the next command consumes. Failures are reported as-is and never retried.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, command: &str) -> Result<()>;
    async fn send_frame(&mut self, frame: &[u8]) -> Result<()>;
}


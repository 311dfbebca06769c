// src/hardware/serial.rs - FPGA framing protocol over a serial port
//
// Message formats understood by the FPGA:
//
//   '!' <len:1 hex digit> <ascii body> "\r\n"              control command
//   '#' <ndigits:1 hex digit> <len:hex> <raw body> "\r\n"   binary block
//
// Inside a body the DLE byte (0x10) is sent twice; the doubled pair counts
// as a single byte towards <len>.
use crate::error::{Error, Result};
use crate::hardware::Transport;
use async_trait::async_trait;
use serial2_tokio::{CharSize, FlowControl, Parity, SerialPort, Settings, StopBits};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const DLE: u8 = 0x10;
pub const TERMINATOR: &[u8] = b"\r\n";

/// Longest control command the FPGA command buffer accepts.
pub const MAX_COMMAND_LEN: usize = 0xF;
/// Longest binary block the FPGA block buffer accepts.
pub const MAX_BLOCK_LEN: usize = 0x100;

pub const DEFAULT_BAUD: u32 = 57600;

fn push_escaped(out: &mut Vec<u8>, body: &[u8]) {
    for &b in body {
        if b == DLE {
            out.push(DLE);
        }
        out.push(b);
    }
}

/// Encode a control command, e.g. `WRITE DDS REG` -> `!dWRITE DDS REG\r\n`.
pub fn encode_command(command: &str) -> Result<Vec<u8>> {
    if command.is_empty() || command.len() > MAX_COMMAND_LEN {
        return Err(Error::Transport(format!(
            "command '{}' has length {}, expected 1..={}",
            command,
            command.len(),
            MAX_COMMAND_LEN
        )));
    }
    if !command.is_ascii() {
        return Err(Error::Transport(format!("command '{}' is not ASCII", command)));
    }
    let mut out = Vec::with_capacity(command.len() + 4);
    out.extend_from_slice(format!("!{:x}", command.len()).as_bytes());
    push_escaped(&mut out, command.as_bytes());
    out.extend_from_slice(TERMINATOR);
    Ok(out)
}

/// Encode a binary block, e.g. nine frame bytes -> `#19<bytes>\r\n`.
pub fn encode_block(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() > MAX_BLOCK_LEN {
        return Err(Error::Transport(format!(
            "block of {} bytes, expected 1..={}",
            data.len(),
            MAX_BLOCK_LEN
        )));
    }
    let count = format!("{:x}", data.len());
    let mut out = Vec::with_capacity(data.len() + count.len() + 4);
    out.extend_from_slice(format!("#{:x}{}", count.len(), count).as_bytes());
    push_escaped(&mut out, data);
    out.extend_from_slice(TERMINATOR);
    Ok(out)
}

/// [`Transport`] writing FPGA-framed messages to any async byte sink.
pub struct FramedTransport<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FramedTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_message(&mut self, message: &[u8]) -> Result<()> {
        self.writer
            .write_all(message)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Transport for FramedTransport<W> {
    async fn send_text(&mut self, command: &str) -> Result<()> {
        let message = encode_command(command)?;
        tracing::debug!("Serial TX command: {}", command);
        self.write_message(&message).await
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let message = encode_block(frame)?;
        tracing::debug!("Serial TX block: {:02X?}", frame);
        self.write_message(&message).await
    }
}

/// Serial link to the FPGA.
pub type SerialTransport = FramedTransport<SerialPort>;

impl FramedTransport<SerialPort> {
    /// Open `path` with the FPGA's line settings: 8 data bits, no parity,
    /// two stop bits, no flow control.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        tracing::info!("Opening serial port {} at {} baud", path, baud);
        let port = SerialPort::open(path, |mut settings: Settings| {
            settings.set_raw();
            settings.set_baud_rate(baud)?;
            settings.set_char_size(CharSize::Bits8);
            settings.set_parity(Parity::None);
            settings.set_stop_bits(StopBits::Two);
            settings.set_flow_control(FlowControl::None);
            Ok(settings)
        })
        .map_err(|e| Error::Transport(format!("failed to open {}: {}", path, e)))?;
        Ok(Self::new(port))
    }
}

impl<W> std::fmt::Debug for FramedTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedTransport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        assert_eq!(encode_command("WRITE DDS REG").unwrap(), b"!dWRITE DDS REG\r\n");
        assert_eq!(encode_command("Board2 Select").unwrap(), b"!dBoard2 Select\r\n");
    }

    #[test]
    fn test_encode_command_limits() {
        assert!(encode_command("").is_err());
        assert!(encode_command("SIXTEEN CHARS!!!").is_err());
    }

    #[test]
    fn test_encode_block_with_escape() {
        let encoded = encode_block(&[0x13, 0x00, 0x10, 0x01]).unwrap();
        assert_eq!(encoded, b"#14\x13\x00\x10\x10\x01\r\n");
    }

    #[test]
    fn test_encode_block_counts_digits() {
        let data = vec![0u8; 0x100];
        let encoded = encode_block(&data).unwrap();
        assert!(encoded.starts_with(b"#3100"));
        assert!(encode_block(&vec![0u8; 0x101]).is_err());
        assert!(encode_block(&[]).is_err());
    }

    #[tokio::test]
    async fn test_framed_transport_writes_messages() {
        let mut transport = FramedTransport::new(Vec::new());
        transport.send_frame(&[0x23, 0x00, 0x05, 0x01, 0, 0, 0, 0, 0]).await.unwrap();
        transport.send_text("WRITE DDS REG").await.unwrap();
        let written = transport.into_inner();
        let mut expected = b"#19\x23\x00\x05\x01\x00\x00\x00\x00\x00\r\n".to_vec();
        expected.extend_from_slice(b"!dWRITE DDS REG\r\n");
        assert_eq!(written, expected);
    }
}

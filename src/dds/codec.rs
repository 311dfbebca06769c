//! # Register codec
//!
//! Pure conversions between human units and the AD9912 register format as
//! carried by the FPGA: instruction headers, frequency tuning words, phase
//! codes and the fixed 9-byte frames handed to the transport.
//!
//! Nothing in here touches hardware or keeps state. Range checks belong to
//! the device facade; the arithmetic below assumes its inputs were already
//! validated.
//!
//! ```text
//! frame[0]    mode byte: payload byte count | channel bit | board bits
//! frame[1..]  header (2 bytes) + register value, MSB first
//! ...         zero padding up to FRAME_LEN
//! ```

use crate::dds::DeviceKey;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference clock of the DDS core in Hz.
pub const REFERENCE_CLOCK_HZ: f64 = 1e9;

/// Every register write is padded to this many bytes.
pub const FRAME_LEN: usize = 9;

/// Largest payload (header + value) that fits in one frame.
pub const MAX_PAYLOAD_BYTES: usize = FRAME_LEN - 1;

pub const PHASE_RESOLUTION: u32 = 1 << 14;

// Register map (address, width in bytes).
pub const REG_SERIAL_CONFIG: u16 = 0x0000;
pub const REG_UPDATE: u16 = 0x0005;
pub const REG_POWER_CONTROL: u16 = 0x0010;
pub const REG_FTW: u16 = 0x01AB;
pub const REG_PHASE: u16 = 0x01AD;
pub const REG_DAC_CURRENT: u16 = 0x040C;

pub const FTW_BYTES: usize = 6;
pub const PHASE_BYTES: usize = 2;
pub const DAC_CURRENT_BYTES: usize = 2;

pub const POWER_UP: u8 = 0x90;
pub const POWER_DOWN: u8 = 0x91;
pub const SOFT_RESET_ASSERT: u8 = 0x3C;
pub const SOFT_RESET_CLEAR: u8 = 0x18;
pub const UPDATE_TRIGGER: u8 = 0x01;

pub type Frame = [u8; FRAME_LEN];

/// Transfer direction encoded in the instruction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "W" | "w" => Ok(Direction::Write),
            "R" | "r" => Ok(Direction::Read),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}

/// 16-bit instruction word preceding every register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterHeader(u16);

impl RegisterHeader {
    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RegisterHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Placement of the selector bits inside the mode byte.
///
/// The defaults match the FPGA bitstream shipped with the triple-board
/// setup, which routes boards through the `Board<n> Select` command and
/// therefore leaves `board_shift` unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModeLayout {
    /// Bit position flagging channel 1 and channel 2 respectively.
    #[serde(default = "default_channel_bits")]
    pub channel_bits: [u8; 2],
    /// When set, `board - 1` is packed as a 2-bit field at this position.
    #[serde(default)]
    pub board_shift: Option<u8>,
}

impl Default for ModeLayout {
    fn default() -> Self {
        Self {
            channel_bits: default_channel_bits(),
            board_shift: None,
        }
    }
}

impl ModeLayout {
    pub fn validate(&self) -> std::result::Result<(), String> {
        for bit in self.channel_bits {
            if !(4..=7).contains(&bit) {
                return Err(format!("channel bit {} collides with the byte count field", bit));
            }
        }
        if self.channel_bits[0] == self.channel_bits[1] {
            return Err("channel bits must differ".to_string());
        }
        if let Some(shift) = self.board_shift {
            if !(4..=6).contains(&shift) {
                return Err(format!("board shift {} does not fit above the byte count field", shift));
            }
            let board_mask = 0b11u8 << shift;
            if self.channel_bits.iter().any(|bit| board_mask & (1 << bit) != 0) {
                return Err("board bits overlap a channel bit".to_string());
            }
        }
        Ok(())
    }

    fn selector(&self, key: DeviceKey) -> u8 {
        let channel_bit = self.channel_bits[usize::from(key.channel.number() - 1)];
        let mut selector = 1u8 << channel_bit;
        if let Some(shift) = self.board_shift {
            selector |= (key.board.number() - 1) << shift;
        }
        selector
    }
}

fn default_channel_bits() -> [u8; 2] { [5, 4] }

/// Build the instruction header for a register access.
///
/// Layout: bit 15 read flag, bits 14..13 the `W1W0` length field, bits
/// 12..0 the register address. Lengths of four bytes and more all use the
/// streaming code `0b11`.
pub fn build_header(address: u16, byte_length: usize, direction: Direction) -> Result<RegisterHeader> {
    if !(1..=8).contains(&byte_length) {
        return Err(Error::InvalidLength(byte_length));
    }
    let read_flag: u16 = match direction {
        Direction::Write => 0,
        Direction::Read => 1,
    };
    let w1w0 = (byte_length.min(4) - 1) as u16;
    Ok(RegisterHeader((read_flag << 15) | (w1w0 << 13) | (address & 0x1FFF)))
}

/// `round(freq_hz * 2^48 / f_ref)`. Callers keep `freq_hz` inside the
/// configured limits, which keeps the result within 48 bits.
pub fn frequency_to_tuning_word(freq_hz: f64) -> u64 {
    (freq_hz * (1u64 << 48) as f64 / REFERENCE_CLOCK_HZ).round() as u64
}

/// 14-bit phase offset word for an angle in degrees.
pub fn phase_to_code(degrees: f64) -> u16 {
    let code = (degrees / 360.0 * PHASE_RESOLUTION as f64).round() as i64;
    code.rem_euclid(PHASE_RESOLUTION as i64) as u16
}

/// Header followed by `value` as `width` big-endian bytes, as hex text.
pub fn register_write_hex(address: u16, width: usize, value: u64) -> Result<String> {
    let header = build_header(address, width, Direction::Write)?;
    Ok(format!("{}{:0digits$X}", header, value, digits = width * 2))
}

/// Turn a hex payload into the frame the FPGA expects for one register
/// write addressed to `key`.
pub fn serialize_payload(hex: &str, key: DeviceKey, layout: &ModeLayout) -> Result<Frame> {
    if hex.len() % 2 != 0 {
        return Err(Error::OddLength(hex.len()));
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidHex(hex.to_string()));
    }
    let byte_length = hex.len() / 2;
    if byte_length > MAX_PAYLOAD_BYTES {
        return Err(Error::InvalidLength(byte_length));
    }

    let mut frame = [0u8; FRAME_LEN];
    frame[0] = layout.selector(key) | byte_length as u8;
    for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
        // Both characters were checked above, so the slice is valid UTF-8 hex.
        let text = std::str::from_utf8(pair).map_err(|_| Error::InvalidHex(hex.to_string()))?;
        frame[i + 1] = u8::from_str_radix(text, 16).map_err(|_| Error::InvalidHex(hex.to_string()))?;
    }
    Ok(frame)
}

// src/dds/mod.rs - Board/channel addressing shared by the codec and the device facade
pub mod codec;
pub mod device;

pub use device::{DdsDevice, Limits};

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One of the three DDS boards behind the FPGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoardId(u8);

/// One of the two output channels on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u8);

impl BoardId {
    pub const ALL: [BoardId; 3] = [BoardId(1), BoardId(2), BoardId(3)];

    pub fn new(number: u8) -> Result<Self> {
        match number {
            1..=3 => Ok(BoardId(number)),
            _ => Err(Error::InvalidBoard(number.to_string())),
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl ChannelId {
    pub const ALL: [ChannelId; 2] = [ChannelId(1), ChannelId(2)];

    pub fn new(number: u8) -> Result<Self> {
        match number {
            1 | 2 => Ok(ChannelId(number)),
            _ => Err(Error::InvalidChannel(number.to_string())),
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl FromStr for BoardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u8>()
            .ok()
            .and_then(|n| BoardId::new(n).ok())
            .ok_or_else(|| Error::InvalidBoard(s.to_string()))
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u8>()
            .ok()
            .and_then(|n| ChannelId::new(n).ok())
            .ok_or_else(|| Error::InvalidChannel(s.to_string()))
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addressing unit for hardware operations and mirrored state.
///
/// Ordering is board first, then channel, which is also the replay order
/// used when restoring persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceKey {
    pub board: BoardId,
    pub channel: ChannelId,
}

impl DeviceKey {
    pub fn new(board: BoardId, channel: ChannelId) -> Self {
        Self { board, channel }
    }

    /// All six keys in board-then-channel order.
    pub fn all() -> impl Iterator<Item = DeviceKey> {
        BoardId::ALL
            .into_iter()
            .flat_map(|board| ChannelId::ALL.into_iter().map(move |channel| DeviceKey { board, channel }))
    }

    /// Persistence section name, e.g. `board2_ch1`.
    pub fn section(&self) -> String {
        format!("board{}_ch{}", self.board, self.channel)
    }

    pub fn from_section(section: &str) -> Option<DeviceKey> {
        let rest = section.strip_prefix("board")?;
        let (board, channel) = rest.split_once("_ch")?;
        Some(DeviceKey {
            board: board.parse().ok()?,
            channel: channel.parse().ok()?,
        })
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "board {} channel {}", self.board, self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_and_channel_parsing() {
        assert_eq!("3".parse::<BoardId>().unwrap().number(), 3);
        assert!(matches!("0".parse::<BoardId>(), Err(Error::InvalidBoard(_))));
        assert!(matches!("4".parse::<BoardId>(), Err(Error::InvalidBoard(_))));
        assert!(matches!("x".parse::<BoardId>(), Err(Error::InvalidBoard(_))));
        assert_eq!("2".parse::<ChannelId>().unwrap().number(), 2);
        assert!(matches!("3".parse::<ChannelId>(), Err(Error::InvalidChannel(_))));
    }

    #[test]
    fn test_all_keys_board_then_channel() {
        let keys: Vec<String> = DeviceKey::all().map(|k| k.section()).collect();
        assert_eq!(
            keys,
            ["board1_ch1", "board1_ch2", "board2_ch1", "board2_ch2", "board3_ch1", "board3_ch2"]
        );
    }

    #[test]
    fn test_section_roundtrip() {
        for key in DeviceKey::all() {
            assert_eq!(DeviceKey::from_section(&key.section()), Some(key));
        }
        assert_eq!(DeviceKey::from_section("board4_ch1"), None);
        assert_eq!(DeviceKey::from_section("server"), None);
    }
}

//! Network host for the triple AD9912 DDS board.
//!
//! Clients send text commands (`FREQ 2 1 100 MHZ`, `OUTPUT 1 1 1`, ...) over
//! TCP; the host validates them, converts them into AD9912 register writes
//! and pushes those over the FPGA's serial link, keeping a mirror of the last
//! commanded state per board and channel.
pub mod config;
pub mod dds;
pub mod dispatch;
pub mod error;
pub mod hardware;
pub mod server;
pub mod session;
pub mod state;

pub use dds::{BoardId, ChannelId, DdsDevice, DeviceKey, Limits};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use session::Session;
pub use state::{DdsState, StateStore};

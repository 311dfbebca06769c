// src/dds/device.rs - AD9912 device facade shared by all boards and channels
use crate::dds::codec::{self, ModeLayout};
use crate::dds::{BoardId, DeviceKey};
use crate::error::{Error, Result};
use crate::hardware::Transport;

/// Command that latches a binary block into the addressed DDS registers.
pub const WRITE_DDS_REG: &str = "WRITE DDS REG";

pub const MIN_AMPLITUDE: i64 = 0;
pub const MAX_AMPLITUDE: i64 = 0x3FF;
pub const MIN_PHASE: f64 = 0.0;
pub const MAX_PHASE: f64 = 360.0;

/// Output frequency limits in MHz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min_freq_mhz: f64,
    pub max_freq_mhz: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self { min_freq_mhz: 10.0, max_freq_mhz: 400.0 }
    }
}

impl Limits {
    pub fn contains_mhz(&self, freq_mhz: f64) -> bool {
        (self.min_freq_mhz..=self.max_freq_mhz).contains(&freq_mhz)
    }
}

/// The DDS chips behind one FPGA, addressed per board and channel.
///
/// Keeps track of which board the FPGA currently routes register writes
/// to, so consecutive operations on the same board select it only once.
pub struct DdsDevice {
    transport: Box<dyn Transport>,
    limits: Limits,
    layout: ModeLayout,
    selected_board: Option<BoardId>,
}

impl DdsDevice {
    pub fn new(transport: Box<dyn Transport>, limits: Limits, layout: ModeLayout) -> Self {
        Self {
            transport,
            limits,
            layout,
            selected_board: None,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn selected_board(&self) -> Option<BoardId> {
        self.selected_board
    }

    /// Route subsequent register writes to `board`.
    pub async fn select_board(&mut self, board: BoardId) -> Result<()> {
        tracing::debug!("Selecting board {}", board);
        // A failed send may still have reached the FPGA, so the old board is
        // no longer known to be selected.
        self.selected_board = None;
        self.transport.send_text(&format!("Board{} Select", board)).await?;
        self.selected_board = Some(board);
        Ok(())
    }

    async fn ensure_board(&mut self, board: BoardId) -> Result<()> {
        if self.selected_board != Some(board) {
            self.select_board(board).await?;
        }
        Ok(())
    }

    async fn write_register(&mut self, hex: &str, key: DeviceKey) -> Result<()> {
        let frame = codec::serialize_payload(hex, key, &self.layout)?;
        self.ensure_board(key.board).await?;
        self.transport.send_frame(&frame).await?;
        self.transport.send_text(WRITE_DDS_REG).await
    }

    /// Latch the buffered frequency/phase/amplitude registers.
    async fn commit(&mut self, key: DeviceKey) -> Result<()> {
        let hex = codec::register_write_hex(codec::REG_UPDATE, 1, codec::UPDATE_TRIGGER.into())?;
        self.write_register(&hex, key).await
    }

    /// Program the output frequency. Returns the tuning word written.
    pub async fn set_frequency(&mut self, freq_mhz: f64, key: DeviceKey) -> Result<u64> {
        if !self.limits.contains_mhz(freq_mhz) {
            return Err(Error::out_of_range(
                "frequency",
                format!("{}MHz", freq_mhz),
                &format!("[{}MHz, {}MHz]", self.limits.min_freq_mhz, self.limits.max_freq_mhz),
            ));
        }
        let ftw = codec::frequency_to_tuning_word(freq_mhz * 1e6);
        let hex = codec::register_write_hex(codec::REG_FTW, codec::FTW_BYTES, ftw)?;
        self.write_register(&hex, key).await?;
        self.commit(key).await?;
        tracing::debug!("{}: frequency {} MHz (FTW {:012X})", key, freq_mhz, ftw);
        Ok(ftw)
    }

    /// Program the DAC full-scale current, which scales the output amplitude.
    pub async fn set_amplitude(&mut self, value: i64, key: DeviceKey) -> Result<()> {
        if !(MIN_AMPLITUDE..=MAX_AMPLITUDE).contains(&value) {
            return Err(Error::out_of_range(
                "amplitude",
                value,
                &format!("[{}, {}]", MIN_AMPLITUDE, MAX_AMPLITUDE),
            ));
        }
        let hex = codec::register_write_hex(codec::REG_DAC_CURRENT, codec::DAC_CURRENT_BYTES, value as u64)?;
        self.write_register(&hex, key).await?;
        self.commit(key).await?;
        tracing::debug!("{}: amplitude {}", key, value);
        Ok(())
    }

    /// Program the phase offset. Returns the 14-bit phase code written.
    pub async fn set_phase(&mut self, degrees: f64, key: DeviceKey) -> Result<u16> {
        if !(MIN_PHASE..MAX_PHASE).contains(&degrees) {
            return Err(Error::out_of_range("phase", degrees, "[0, 360)"));
        }
        let code = codec::phase_to_code(degrees);
        let hex = codec::register_write_hex(codec::REG_PHASE, codec::PHASE_BYTES, code.into())?;
        self.write_register(&hex, key).await?;
        self.commit(key).await?;
        tracing::debug!("{}: phase {} deg (code {:04X})", key, degrees, code);
        Ok(code)
    }

    pub async fn power_up(&mut self, key: DeviceKey) -> Result<()> {
        let hex = codec::register_write_hex(codec::REG_POWER_CONTROL, 1, codec::POWER_UP.into())?;
        self.write_register(&hex, key).await?;
        tracing::debug!("{}: powered up", key);
        Ok(())
    }

    pub async fn power_down(&mut self, key: DeviceKey) -> Result<()> {
        let hex = codec::register_write_hex(codec::REG_POWER_CONTROL, 1, codec::POWER_DOWN.into())?;
        self.write_register(&hex, key).await?;
        tracing::debug!("{}: powered down", key);
        Ok(())
    }

    pub async fn soft_reset(&mut self, key: DeviceKey) -> Result<()> {
        for value in [codec::SOFT_RESET_ASSERT, codec::SOFT_RESET_CLEAR] {
            let hex = codec::register_write_hex(codec::REG_SERIAL_CONFIG, 1, value.into())?;
            self.write_register(&hex, key).await?;
        }
        tracing::debug!("{}: soft reset", key);
        Ok(())
    }
}

impl std::fmt::Debug for DdsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdsDevice")
            .field("limits", &self.limits)
            .field("layout", &self.layout)
            .field("selected_board", &self.selected_board)
            .finish()
    }
}

// src/session.rs - Device facade and state mirror executed as one unit
use crate::dds::device::{MAX_AMPLITUDE, MAX_PHASE, MIN_AMPLITUDE, MIN_PHASE};
use crate::dds::{DdsDevice, DeviceKey};
use crate::dispatch::format::format_significant;
use crate::dispatch::parser::{Bound, Command, Quantity};
use crate::error::Result;
use crate::state::{DdsState, DdsUpdate, StateStore};
use std::collections::BTreeMap;

pub const FREQ_DIGITS: usize = 12;
pub const PHASE_DIGITS: usize = 7;

/// Everything that must only be touched by one command at a time: the
/// transport (inside the device), the selected-board cache and the mirror.
#[derive(Debug)]
pub struct Session {
    device: DdsDevice,
    store: StateStore,
}

impl Session {
    pub fn new(device: DdsDevice) -> Self {
        let store = StateStore::new(&device.limits());
        Self { device, store }
    }

    pub fn device(&self) -> &DdsDevice {
        &self.device
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn state(&self, key: DeviceKey) -> DdsState {
        self.store.get(key)
    }

    /// Drive one channel to `state` and mirror it once every write succeeded.
    pub async fn apply_state(&mut self, key: DeviceKey, state: DdsState) -> Result<DdsState> {
        self.device.set_frequency(state.frequency_mhz(), key).await?;
        self.device.set_amplitude(state.amplitude.into(), key).await?;
        self.device.set_phase(state.phase_deg, key).await?;
        if state.output_enabled {
            self.device.power_up(key).await?;
        } else {
            self.device.power_down(key).await?;
        }
        Ok(self.store.update(key, DdsUpdate {
            output_enabled: Some(state.output_enabled),
            frequency_hz: Some(state.frequency_hz),
            amplitude: Some(state.amplitude),
            phase_deg: Some(state.phase_deg),
        }))
    }

    /// Bring hardware and mirror in line with a persisted map, replaying
    /// board by board, channel by channel.
    pub async fn restore(&mut self, map: &BTreeMap<String, String>) -> Result<()> {
        let limits = self.device.limits();
        for (key, state) in self.store.import(map, &limits) {
            tracing::info!(
                "Restoring {}: output={} freq={} MHz ampl={} phase={} deg",
                key,
                state.output_enabled,
                state.frequency_mhz(),
                state.amplitude,
                state.phase_deg
            );
            self.apply_state(key, state).await?;
        }
        Ok(())
    }

    /// Run a parsed command and render its reply value.
    pub async fn execute(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Output { key, enable } => {
                let state = match enable {
                    Some(true) => {
                        self.device.power_up(key).await?;
                        self.store.update(key, DdsUpdate { output_enabled: Some(true), ..Default::default() })
                    }
                    Some(false) => {
                        self.device.power_down(key).await?;
                        self.store.update(key, DdsUpdate { output_enabled: Some(false), ..Default::default() })
                    }
                    None => self.store.get(key),
                };
                Ok(if state.output_enabled { "1" } else { "0" }.to_string())
            }
            Command::Freq { key, value, unit } => {
                let state = match value {
                    Some(value) => {
                        let freq_hz = value * unit.hz_per_unit();
                        self.device.set_frequency(freq_hz / 1e6, key).await?;
                        self.store.update(key, DdsUpdate { frequency_hz: Some(freq_hz), ..Default::default() })
                    }
                    None => self.store.get(key),
                };
                Ok(format_significant(state.frequency_hz / unit.hz_per_unit(), FREQ_DIGITS))
            }
            Command::Ampl { key, value } => {
                let state = match value {
                    Some(value) => {
                        self.device.set_amplitude(value, key).await?;
                        // set_amplitude accepted it, so it fits in 10 bits.
                        self.store.update(key, DdsUpdate { amplitude: Some(value as u16), ..Default::default() })
                    }
                    None => self.store.get(key),
                };
                Ok(state.amplitude.to_string())
            }
            Command::Phase { key, value } => {
                let state = match value {
                    Some(degrees) => {
                        self.device.set_phase(degrees, key).await?;
                        self.store.update(key, DdsUpdate { phase_deg: Some(degrees), ..Default::default() })
                    }
                    None => self.store.get(key),
                };
                Ok(format_significant(state.phase_deg, PHASE_DIGITS))
            }
            Command::Reset { key } => {
                self.device.soft_reset(key).await?;
                let state = self.store.get(key);
                self.apply_state(key, state).await?;
                Ok("OK".to_string())
            }
            Command::Limit { bound, quantity } => {
                let limits = self.device.limits();
                Ok(match (bound, quantity) {
                    (Bound::Min, Quantity::Frequency) => format_significant(limits.min_freq_mhz, FREQ_DIGITS),
                    (Bound::Max, Quantity::Frequency) => format_significant(limits.max_freq_mhz, FREQ_DIGITS),
                    (Bound::Min, Quantity::Amplitude) => MIN_AMPLITUDE.to_string(),
                    (Bound::Max, Quantity::Amplitude) => MAX_AMPLITUDE.to_string(),
                    (Bound::Min, Quantity::Phase) => format_significant(MIN_PHASE, PHASE_DIGITS),
                    (Bound::Max, Quantity::Phase) => format_significant(MAX_PHASE, PHASE_DIGITS),
                })
            }
        }
    }
}

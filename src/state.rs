//! # State mirror
//!
//! The host cannot read DDS registers back, so it keeps the last value
//! commanded for every board/channel. Each entry is a [`DdsState`] snapshot
//! that is replaced wholesale after a successful hardware write; readers
//! never see a half-applied update.
//!
//! Persistence uses a flat `"<section>.<field>"` map, for example:
//!
//! ```text
//! board1_ch1.output    = "True"
//! board1_ch1.frequency = "100000000"
//! board1_ch1.amplitude = "1023"
//! board1_ch1.phase     = "0"
//! ```

use crate::dds::device::{MAX_AMPLITUDE, MAX_PHASE, MIN_AMPLITUDE, MIN_PHASE};
use crate::dds::{DeviceKey, Limits};
use std::collections::BTreeMap;

pub const FIELD_OUTPUT: &str = "output";
pub const FIELD_FREQUENCY: &str = "frequency";
pub const FIELD_AMPLITUDE: &str = "amplitude";
pub const FIELD_PHASE: &str = "phase";

/// Last commanded output settings of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DdsState {
    pub output_enabled: bool,
    pub frequency_hz: f64,
    pub amplitude: u16,
    pub phase_deg: f64,
}

impl DdsState {
    /// Power-on assumption before anything has been restored.
    pub fn initial(limits: &Limits) -> Self {
        Self {
            output_enabled: false,
            frequency_hz: limits.min_freq_mhz * 1e6,
            amplitude: 0,
            phase_deg: 0.0,
        }
    }

    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_hz / 1e6
    }
}

/// Field overrides applied by [`StateStore::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DdsUpdate {
    pub output_enabled: Option<bool>,
    pub frequency_hz: Option<f64>,
    pub amplitude: Option<u16>,
    pub phase_deg: Option<f64>,
}

impl DdsUpdate {
    fn apply(self, base: DdsState) -> DdsState {
        DdsState {
            output_enabled: self.output_enabled.unwrap_or(base.output_enabled),
            frequency_hz: self.frequency_hz.unwrap_or(base.frequency_hz),
            amplitude: self.amplitude.unwrap_or(base.amplitude),
            phase_deg: self.phase_deg.unwrap_or(base.phase_deg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    states: BTreeMap<DeviceKey, DdsState>,
}

impl StateStore {
    pub fn new(limits: &Limits) -> Self {
        let initial = DdsState::initial(limits);
        Self {
            states: DeviceKey::all().map(|key| (key, initial)).collect(),
        }
    }

    pub fn get(&self, key: DeviceKey) -> DdsState {
        // Every key is inserted in `new` and never removed.
        self.states[&key]
    }

    /// Replace the snapshot for `key` with a copy carrying `update`.
    pub fn update(&mut self, key: DeviceKey, update: DdsUpdate) -> DdsState {
        let next = update.apply(self.get(key));
        self.states.insert(key, next);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceKey, DdsState)> + '_ {
        self.states.iter().map(|(key, state)| (*key, *state))
    }

    /// Flatten every snapshot into `"<section>.<field>"` entries.
    pub fn export(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for (key, state) in self.iter() {
            let section = key.section();
            let output = if state.output_enabled { "True" } else { "False" };
            map.insert(format!("{}.{}", section, FIELD_OUTPUT), output.to_string());
            map.insert(format!("{}.{}", section, FIELD_FREQUENCY), state.frequency_hz.to_string());
            map.insert(format!("{}.{}", section, FIELD_AMPLITUDE), state.amplitude.to_string());
            map.insert(format!("{}.{}", section, FIELD_PHASE), state.phase_deg.to_string());
        }
        map
    }

    /// Decode a persisted map into one state per key, board-then-channel.
    ///
    /// Fields that are missing, malformed or out of range keep the value the
    /// store currently holds for that key; each skipped entry is logged.
    pub fn import(&self, map: &BTreeMap<String, String>, limits: &Limits) -> Vec<(DeviceKey, DdsState)> {
        let mut restored: BTreeMap<DeviceKey, DdsState> = self.states.clone();

        for (entry, value) in map {
            let Some((section, field)) = entry.split_once('.') else {
                tracing::warn!("Skipping state entry '{}': expected <section>.<field>", entry);
                continue;
            };
            let Some(key) = DeviceKey::from_section(section) else {
                tracing::warn!("Skipping state entry '{}': unknown section", entry);
                continue;
            };
            let Some(state) = restored.get_mut(&key) else {
                continue;
            };
            let value = value.trim();
            match field {
                FIELD_OUTPUT => state.output_enabled = value == "True",
                FIELD_FREQUENCY => match value.parse::<f64>() {
                    Ok(hz) if limits.contains_mhz(hz / 1e6) => state.frequency_hz = hz,
                    _ => tracing::warn!("Skipping state entry '{}': invalid frequency '{}'", entry, value),
                },
                FIELD_AMPLITUDE => match value.parse::<i64>() {
                    Ok(a) if (MIN_AMPLITUDE..=MAX_AMPLITUDE).contains(&a) => state.amplitude = a as u16,
                    _ => tracing::warn!("Skipping state entry '{}': invalid amplitude '{}'", entry, value),
                },
                FIELD_PHASE => match value.parse::<f64>() {
                    Ok(p) if (MIN_PHASE..MAX_PHASE).contains(&p) => state.phase_deg = p,
                    _ => tracing::warn!("Skipping state entry '{}': invalid phase '{}'", entry, value),
                },
                other => tracing::warn!("Skipping state entry '{}': unknown field '{}'", entry, other),
            }
        }

        restored.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::{BoardId, ChannelId};

    fn key(board: u8, channel: u8) -> DeviceKey {
        DeviceKey::new(BoardId::new(board).unwrap(), ChannelId::new(channel).unwrap())
    }

    #[test]
    fn test_initial_states() {
        let store = StateStore::new(&Limits::default());
        assert_eq!(store.iter().count(), 6);
        let state = store.get(key(3, 2));
        assert!(!state.output_enabled);
        assert_eq!(state.frequency_mhz(), 10.0);
        assert_eq!(state.amplitude, 0);
    }

    #[test]
    fn test_update_replaces_snapshot() {
        let mut store = StateStore::new(&Limits::default());
        let before = store.get(key(1, 1));
        let after = store.update(key(1, 1), DdsUpdate { amplitude: Some(512), ..Default::default() });
        assert_eq!(after.amplitude, 512);
        assert_eq!(after.frequency_hz, before.frequency_hz);
        assert_eq!(store.get(key(1, 1)), after);
        // Other keys are untouched.
        assert_eq!(store.get(key(1, 2)).amplitude, 0);
    }

    #[test]
    fn test_export_keys() {
        let mut store = StateStore::new(&Limits::default());
        store.update(key(2, 1), DdsUpdate {
            output_enabled: Some(true),
            frequency_hz: Some(123.456e6),
            ..Default::default()
        });
        let map = store.export();
        assert_eq!(map.len(), 24);
        assert_eq!(map["board2_ch1.output"], "True");
        assert_eq!(map["board2_ch1.frequency"], "123456000");
        assert_eq!(map["board1_ch1.output"], "False");
    }

    #[test]
    fn test_export_import_roundtrip() {
        let limits = Limits::default();
        let mut store = StateStore::new(&limits);
        store.update(key(3, 2), DdsUpdate {
            output_enabled: Some(true),
            frequency_hz: Some(87.654321e6),
            amplitude: Some(777),
            phase_deg: Some(123.25),
        });
        let restored = StateStore::new(&limits).import(&store.export(), &limits);
        assert_eq!(restored.len(), 6);
        for (key, state) in restored {
            assert_eq!(state, store.get(key));
        }
    }

    #[test]
    fn test_import_skips_malformed_entries() {
        let limits = Limits::default();
        let store = StateStore::new(&limits);
        let mut map = BTreeMap::new();
        map.insert("board1_ch1.amplitude".to_string(), "not-a-number".to_string());
        map.insert("board1_ch1.frequency".to_string(), "5000".to_string());
        map.insert("board1_ch1.phase".to_string(), "45".to_string());
        map.insert("board1_ch1.output".to_string(), "yes".to_string());
        map.insert("board9_ch1.phase".to_string(), "45".to_string());
        map.insert("garbage".to_string(), "1".to_string());
        let restored = store.import(&map, &limits);
        let (first_key, first) = restored[0];
        assert_eq!(first_key, key(1, 1));
        assert_eq!(first.amplitude, 0);
        assert_eq!(first.frequency_mhz(), 10.0);
        assert_eq!(first.phase_deg, 45.0);
        assert!(!first.output_enabled);
    }
}

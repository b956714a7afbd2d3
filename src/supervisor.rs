use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::config::{EngineSettings, RootSettings};
use crate::engine::TimecodeEngine;
use crate::logger::{log, LogContext, LogKind};
use crate::passthru::AudioPassthru;
use crate::status::EngineStatus;
use crate::timecode::MAX_ENGINES;

#[derive(Debug)]
pub enum SupervisorError {
    Full,
    IndexOutOfRange(usize),
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SupervisorError::Full => write!(f, "cannot add engine: already at the {MAX_ENGINES}-engine limit"),
            SupervisorError::IndexOutOfRange(i) => write!(f, "engine index {i} out of range"),
        }
    }
}

/// The namespace a device belongs to for conflict-resolution purposes. Each
/// protocol direction (and the pass-through consumer) tracks its own opens;
/// an MTC input and an MTC output never conflict with each other even if
/// named identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceNamespace {
    MtcIn,
    MtcOut,
    ArtnetIn,
    ArtnetOut,
    LtcIn,
    LtcOut,
    Passthru,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOpenResult {
    Ok,
    /// Another engine already holds this device; the open proceeds anyway,
    /// but the caller should surface the annotation in the engine's status.
    OkAnnotated(String),
}

/// Tracks which engine currently holds each (namespace, device) pair so
/// cross-engine opens of the same device can be annotated instead of
/// silently colliding. Within-engine conflicts (LTC out vs. pass-through on
/// the same device) are resolved separately, since they always stop the
/// pass-through rather than merely annotate.
#[derive(Default)]
pub struct DeviceRegistry {
    open: HashMap<(DeviceNamespace, String), usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by a handler before it opens `device` in `namespace` for
    /// `engine_index`. Cross-engine duplicate opens are permitted; same-engine
    /// re-opens on the same device just refresh the holder.
    pub fn request_open(&mut self, engine_index: usize, namespace: DeviceNamespace, device: &str) -> DeviceOpenResult {
        let key = (namespace, device.to_string());
        let result = match self.open.get(&key) {
            Some(&holder) if holder != engine_index => {
                DeviceOpenResult::OkAnnotated(format!("shared with engine {holder}"))
            }
            _ => DeviceOpenResult::Ok,
        };
        self.open.insert(key, engine_index);
        result
    }

    pub fn release(&mut self, engine_index: usize, namespace: DeviceNamespace, device: &str) {
        let key = (namespace, device.to_string());
        if self.open.get(&key) == Some(&engine_index) {
            self.open.remove(&key);
        }
    }

    /// Drops every entry held by `engine_index`, e.g. when that engine is removed.
    pub fn release_all_for(&mut self, engine_index: usize) {
        self.open.retain(|_, holder| *holder != engine_index);
    }
}

/// Within-engine conflict: LtcOutput and AudioPassthru targeting the same
/// device. The pass-through always loses.
fn same_engine_conflict(settings: &EngineSettings) -> bool {
    match (&settings.ltc_output.device, &settings.passthru_output_device) {
        (Some(ltc_device), Some(passthru_device)) => {
            settings.ltc_output.enabled && ltc_device.to_string() == *passthru_device
        }
        _ => false,
    }
}

/// Owns `engines[0..≤8]`, the global audio preferences, and the cross-engine
/// device registry. Drives every engine's `tick()` at 60 Hz regardless of
/// which one is UI-selected, so background outputs keep producing.
pub struct EngineSupervisor {
    engines: Vec<TimecodeEngine>,
    selected_engine: usize,
    preferred_sample_rate: u32,
    preferred_buffer_size: u32,
    devices: DeviceRegistry,
    status_tx: Option<Sender<EngineStatus>>,
}

impl EngineSupervisor {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
            selected_engine: 0,
            preferred_sample_rate: 48000,
            preferred_buffer_size: 512,
            devices: DeviceRegistry::new(),
            status_tx: None,
        }
    }

    pub fn from_settings(settings: &RootSettings) -> Self {
        let mut supervisor = Self::new();
        supervisor.preferred_sample_rate = settings.preferred_sample_rate;
        supervisor.preferred_buffer_size = settings.preferred_buffer_size;
        for engine_settings in &settings.engines {
            let _ = supervisor.add_engine(engine_settings.clone());
        }
        supervisor.selected_engine = settings.selected_engine.min(supervisor.engines.len().saturating_sub(1));
        supervisor
    }

    pub fn set_status_sender(&mut self, tx: Sender<EngineStatus>) {
        self.status_tx = Some(tx);
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn selected_engine(&self) -> usize {
        self.selected_engine
    }

    pub fn select_engine(&mut self, index: usize) -> Result<(), SupervisorError> {
        if index >= self.engines.len() {
            return Err(SupervisorError::IndexOutOfRange(index));
        }
        self.selected_engine = index;
        Ok(())
    }

    pub fn engine(&self, index: usize) -> Option<&TimecodeEngine> {
        self.engines.get(index)
    }

    pub fn engine_mut(&mut self, index: usize) -> Option<&mut TimecodeEngine> {
        self.engines.get_mut(index)
    }

    /// Appends a new engine, applying its settings and annotating its status
    /// if any device is in same-engine conflict with the pass-through.
    /// Rejects once the 8-engine cap is reached.
    pub fn add_engine(&mut self, settings: EngineSettings) -> Result<usize, SupervisorError> {
        if self.engines.len() >= MAX_ENGINES {
            return Err(SupervisorError::Full);
        }
        let mut engine = TimecodeEngine::new(settings.name.clone());
        engine.apply_settings(&settings);
        if same_engine_conflict(&settings) {
            engine.status_mut().passthru_status = Some("CONFLICT: same device as LTC OUT".to_string());
        }
        let index = self.engines.len();
        if index == 0 {
            engine.passthru = Some(Arc::new(AudioPassthru::new()));
        }
        self.engines.push(engine);
        log(format!("engine added at index {index}"), LogContext::Supervisor, LogKind::Note);
        Ok(index)
    }

    /// Stops engine `i`'s handlers, removes it, and reindexes the rest:
    /// exactly the new index-0 engine gets a lazily created `AudioPassthru`;
    /// any engine that stops being index 0 has its `AudioPassthru` destroyed.
    pub fn remove(&mut self, i: usize) -> Result<(), SupervisorError> {
        if i >= self.engines.len() {
            return Err(SupervisorError::IndexOutOfRange(i));
        }
        {
            let engine = &mut self.engines[i];
            if let Some(mtc_out) = engine.mtc_output.as_ref() {
                mtc_out.pause();
            }
            if let Some(artnet_out) = engine.artnet_output.as_ref() {
                artnet_out.pause();
            }
            if let Some(ltc_out) = engine.ltc_output.as_ref() {
                ltc_out.pause();
            }
            if let Some(passthru) = engine.passthru.as_ref() {
                passthru.stop();
            }
        }
        self.engines.remove(i);
        self.devices.release_all_for(i);

        for (index, engine) in self.engines.iter_mut().enumerate() {
            let should_be_primary = index == 0;
            let is_primary = engine.passthru.is_some();
            if should_be_primary && !is_primary {
                engine.passthru = Some(Arc::new(AudioPassthru::new()));
            } else if !should_be_primary && is_primary {
                if let Some(passthru) = engine.passthru.take() {
                    passthru.stop();
                }
            }
        }

        if self.selected_engine >= self.engines.len() {
            self.selected_engine = self.engines.len().saturating_sub(1);
        }
        log(format!("engine at index {i} removed, {} remain", self.engines.len()), LogContext::Supervisor, LogKind::Note);
        Ok(())
    }

    /// Queries whether `device` in `namespace` is already open elsewhere.
    pub fn resolve_device_open(&mut self, engine_index: usize, namespace: DeviceNamespace, device: &str) -> DeviceOpenResult {
        self.devices.request_open(engine_index, namespace, device)
    }

    /// Drives every engine's `tick()`, whether or not it is UI-selected, and
    /// forwards each engine's refreshed status over the status channel.
    pub fn tick_all(&mut self, now_ms: f64, wall_clock_ms_since_midnight: i64) {
        for engine in &mut self.engines {
            engine.tick(now_ms, wall_clock_ms_since_midnight);
            if let Some(tx) = &self.status_tx {
                let _ = tx.try_send(engine.status().clone());
            }
        }
    }
}

impl Default for EngineSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_engine_rejects_past_the_cap() {
        let mut sup = EngineSupervisor::new();
        for i in 0..MAX_ENGINES {
            assert!(sup.add_engine(EngineSettings::named(format!("e{i}"))).is_ok());
        }
        assert!(matches!(sup.add_engine(EngineSettings::named("overflow")), Err(SupervisorError::Full)));
    }

    #[test]
    fn first_engine_gets_passthru_and_only_that_one() {
        let mut sup = EngineSupervisor::new();
        sup.add_engine(EngineSettings::named("a")).unwrap();
        sup.add_engine(EngineSettings::named("b")).unwrap();
        assert!(sup.engine(0).unwrap().passthru.is_some());
        assert!(sup.engine(1).unwrap().passthru.is_none());
    }

    #[test]
    fn removing_primary_promotes_the_next_engine() {
        let mut sup = EngineSupervisor::new();
        sup.add_engine(EngineSettings::named("a")).unwrap();
        sup.add_engine(EngineSettings::named("b")).unwrap();
        sup.remove(0).unwrap();
        assert_eq!(sup.len(), 1);
        assert!(sup.engine(0).unwrap().passthru.is_some());
    }

    #[test]
    fn same_device_for_ltc_out_and_passthru_is_flagged_as_conflict() {
        let mut settings = EngineSettings::named("a");
        settings.ltc_output.enabled = true;
        settings.ltc_output.device = Some(3);
        settings.passthru_output_device = Some("3".to_string());
        let mut sup = EngineSupervisor::new();
        sup.add_engine(settings).unwrap();
        assert_eq!(sup.engine(0).unwrap().status().passthru_status.as_deref(), Some("CONFLICT: same device as LTC OUT"));
    }

    #[test]
    fn device_registry_annotates_cross_engine_reuse() {
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.request_open(0, DeviceNamespace::ArtnetOut, "eth0"), DeviceOpenResult::Ok);
        assert!(matches!(
            registry.request_open(1, DeviceNamespace::ArtnetOut, "eth0"),
            DeviceOpenResult::OkAnnotated(_)
        ));
    }

    #[test]
    fn tick_all_advances_every_engine_even_when_unselected() {
        let mut sup = EngineSupervisor::new();
        sup.add_engine(EngineSettings::named("a")).unwrap();
        sup.add_engine(EngineSettings::named("b")).unwrap();
        sup.select_engine(0).unwrap();
        sup.tick_all(0.0, 0);
        assert!(sup.engine(1).unwrap().status().source_active);
    }
}

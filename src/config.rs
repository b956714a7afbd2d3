use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::timecode::FrameRate;

pub const CONFIG_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InputSource {
    Mtc,
    ArtNet,
    SystemTime,
    Ltc,
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::SystemTime
    }
}

/// Per-protocol output enable + frame offset, shared shape for MTC, Art-Net and LTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSlot {
    pub enabled: bool,
    pub offset_frames: i32,
    pub device: Option<u32>,
}

impl Default for OutputSlot {
    fn default() -> Self {
        Self { enabled: false, offset_frames: 0, device: None }
    }
}

/// One pipeline's persistable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    pub name: String,
    pub input_source: InputSource,
    pub input_frame_rate: FrameRate,
    pub mtc_input_device: Option<String>,
    pub artnet_input_interface: Option<String>,
    pub ltc_input_device: Option<String>,
    pub mtc_output: OutputSlot,
    pub artnet_output: OutputSlot,
    pub ltc_output: OutputSlot,
    pub fps_convert_enabled: bool,
    pub output_frame_rate: FrameRate,
    /// Passthru channel: `-1` means stereo (duplicate into a second channel).
    pub passthru_channel: i32,
    pub passthru_output_device: Option<String>,
    /// Percent, 0..=200.
    pub gain_percent: u32,
    pub user_overrode_ltc_fps: bool,
}

impl EngineSettings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_source: InputSource::default(),
            input_frame_rate: FrameRate::Fps25,
            mtc_input_device: None,
            artnet_input_interface: None,
            ltc_input_device: None,
            mtc_output: OutputSlot::default(),
            artnet_output: OutputSlot::default(),
            ltc_output: OutputSlot::default(),
            fps_convert_enabled: false,
            output_frame_rate: FrameRate::Fps25,
            passthru_channel: -1,
            passthru_output_device: None,
            gain_percent: 100,
            user_overrode_ltc_fps: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootSettings {
    pub version: u32,
    pub audio_input_type_filter: String,
    pub audio_output_type_filter: String,
    pub preferred_sample_rate: u32,
    pub preferred_buffer_size: u32,
    pub selected_engine: usize,
    pub engines: Vec<EngineSettings>,
}

impl Default for RootSettings {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            audio_input_type_filter: String::new(),
            audio_output_type_filter: String::new(),
            preferred_sample_rate: 48000,
            preferred_buffer_size: 512,
            selected_engine: 0,
            engines: vec![EngineSettings::named("Engine 1")],
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {err}"),
            ConfigError::Parse(err) => write!(f, "config parse error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parses a settings JSON blob, migrating a version-1 (single-engine) shape
/// by lifting its top-level engine fields into `engines[0]`.
pub fn parse(json: &str) -> Result<RootSettings, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(ConfigError::Parse)?;
    let version = value.get("version").and_then(|v| v.as_u64()).unwrap_or(1);

    if version >= 2 {
        return serde_json::from_value(value).map_err(ConfigError::Parse);
    }

    let mut engine = EngineSettings::named("Engine 1");
    if let Some(obj) = value.as_object() {
        if let Some(v) = obj.get("inputSource").and_then(|v| serde_json::from_value(v.clone()).ok()) {
            engine.input_source = v;
        }
        if let Some(v) = obj.get("inputFrameRate").and_then(|v| serde_json::from_value(v.clone()).ok()) {
            engine.input_frame_rate = v;
        }
        if let Some(v) = obj.get("mtcOutput").and_then(|v| serde_json::from_value(v.clone()).ok()) {
            engine.mtc_output = v;
        }
        if let Some(v) = obj.get("artnetOutput").and_then(|v| serde_json::from_value(v.clone()).ok()) {
            engine.artnet_output = v;
        }
        if let Some(v) = obj.get("ltcOutput").and_then(|v| serde_json::from_value(v.clone()).ok()) {
            engine.ltc_output = v;
        }
        if let Some(v) = obj.get("gainPercent").and_then(|v| v.as_u64()) {
            engine.gain_percent = v as u32;
        }
    }

    let mut settings = RootSettings::default();
    settings.version = CONFIG_VERSION;
    settings.engines = vec![engine];
    Ok(settings)
}

pub fn to_json(settings: &RootSettings) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(settings).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_round_trip_through_json() {
        let settings = RootSettings::default();
        let json = to_json(&settings).unwrap();
        let back = parse(&json).unwrap();
        assert_eq!(back.version, CONFIG_VERSION);
        assert_eq!(back.engines.len(), 1);
    }

    #[test]
    fn version_1_shape_migrates_into_single_engine() {
        let v1 = serde_json::json!({
            "inputSource": "Ltc",
            "gainPercent": 150,
        });
        let migrated = parse(&v1.to_string()).unwrap();
        assert_eq!(migrated.version, CONFIG_VERSION);
        assert_eq!(migrated.engines.len(), 1);
        assert_eq!(migrated.engines[0].input_source, InputSource::Ltc);
        assert_eq!(migrated.engines[0].gain_percent, 150);
    }

    #[test]
    fn missing_version_field_is_treated_as_v1() {
        let v1 = serde_json::json!({});
        let migrated = parse(&v1.to_string()).unwrap();
        assert_eq!(migrated.version, CONFIG_VERSION);
    }
}

use crate::timecode::{FrameRate, Timecode};

/// A VU level with the engine's per-tick decay applied: `new = max(new, old * 0.85)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VuLevel(f32);

impl VuLevel {
    pub fn update(&mut self, instantaneous: f32) {
        self.0 = instantaneous.max(self.0 * 0.85);
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

/// Status snapshot for one [`crate::engine::TimecodeEngine`], refreshed every tick.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub name: String,
    pub input_status: String,
    pub current_timecode: Timecode,
    pub current_fps: FrameRate,
    pub source_active: bool,
    pub mtc_output_status: String,
    pub artnet_output_status: String,
    pub ltc_output_status: String,
    pub passthru_status: Option<String>,
    pub input_vu: VuLevel,
    pub passthru_vu: VuLevel,
}

impl EngineStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_status: "not receiving".to_string(),
            current_timecode: Timecode::zero(),
            current_fps: FrameRate::Fps25,
            source_active: false,
            mtc_output_status: "stopped".to_string(),
            artnet_output_status: "stopped".to_string(),
            ltc_output_status: "stopped".to_string(),
            passthru_status: None,
            input_vu: VuLevel::default(),
            passthru_vu: VuLevel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vu_decays_but_tracks_peaks() {
        let mut vu = VuLevel::default();
        vu.update(1.0);
        assert_eq!(vu.value(), 1.0);
        vu.update(0.0);
        assert!((vu.value() - 0.85).abs() < 1e-6);
        vu.update(0.9);
        assert_eq!(vu.value(), 0.9);
    }
}

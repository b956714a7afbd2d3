use std::sync::Arc;

use crate::artnet::{ArtnetInput, ArtnetOutput};
use crate::config::{EngineSettings, InputSource, OutputSlot};
use crate::logger::{log, LogContext, LogKind};
use crate::ltc::{LtcOutput, LtcPublished, LtcTarget};
use crate::mtc::{MtcInput, MtcOutput};
use crate::passthru::AudioPassthru;
use crate::status::EngineStatus;
use crate::timecode::{convert_timecode_rate, offset_timecode, wall_clock_to_timecode, FrameRate, Timecode};

/// Which of the four mutually-exclusive sources is currently driving this
/// engine's target timecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveInput {
    Mtc,
    ArtNet,
    SystemTime,
    Ltc,
}

impl From<InputSource> for ActiveInput {
    fn from(src: InputSource) -> Self {
        match src {
            InputSource::Mtc => ActiveInput::Mtc,
            InputSource::ArtNet => ActiveInput::ArtNet,
            InputSource::SystemTime => ActiveInput::SystemTime,
            InputSource::Ltc => ActiveInput::Ltc,
        }
    }
}

/// Thin per-pipeline orchestrator. Owns the six protocol handlers (and, if
/// primary, an [`AudioPassthru`]) and is driven exclusively from the
/// single-threaded orchestration context — never from an audio or network
/// callback thread.
pub struct TimecodeEngine {
    pub name: String,
    active_input: ActiveInput,
    current_fps: FrameRate,
    current_timecode: Timecode,
    source_active: bool,
    user_overrode_ltc_fps: bool,
    fps_convert_enabled: bool,
    output_fps: FrameRate,

    /// Every handler below is `Arc`-wrapped so the same instance can be
    /// cloned into whatever thread actually owns the device (a MIDI/audio
    /// callback, a UDP receive thread, a transmit timer) while the
    /// orchestration thread keeps its own clone for `tick()`. Every
    /// cross-thread-called method on these types takes `&self`.
    pub mtc_input: Option<Arc<MtcInput>>,
    pub mtc_output: Option<Arc<MtcOutput>>,
    pub artnet_input: Option<Arc<ArtnetInput>>,
    pub artnet_output: Option<Arc<ArtnetOutput>>,
    /// Only the handle published by the audio input thread's `LtcInput` --
    /// the real decoder lives exclusively on that thread and is never shared.
    pub ltc_published: Option<Arc<LtcPublished>>,
    pub ltc_output: Option<Arc<LtcOutput>>,
    pub passthru: Option<Arc<AudioPassthru>>,

    mtc_out_slot: OutputSlot,
    artnet_out_slot: OutputSlot,
    ltc_out_slot: OutputSlot,

    status: EngineStatus,
}

impl TimecodeEngine {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            status: EngineStatus::new(name.clone()),
            name,
            active_input: ActiveInput::SystemTime,
            current_fps: FrameRate::Fps25,
            current_timecode: Timecode::zero(),
            source_active: false,
            user_overrode_ltc_fps: false,
            fps_convert_enabled: false,
            output_fps: FrameRate::Fps25,
            mtc_input: None,
            mtc_output: None,
            artnet_input: None,
            artnet_output: None,
            ltc_published: None,
            ltc_output: None,
            passthru: None,
            mtc_out_slot: OutputSlot::default(),
            artnet_out_slot: OutputSlot::default(),
            ltc_out_slot: OutputSlot::default(),
        }
    }

    pub fn apply_settings(&mut self, settings: &EngineSettings) {
        self.set_active_input(settings.input_source.into());
        self.current_fps = settings.input_frame_rate;
        self.fps_convert_enabled = settings.fps_convert_enabled;
        self.output_fps = settings.output_frame_rate;
        self.mtc_out_slot = settings.mtc_output;
        self.artnet_out_slot = settings.artnet_output;
        self.ltc_out_slot = settings.ltc_output;
    }

    /// Switches the active input. Stops the prior handler's involvement in
    /// routing (it may keep running in the background, e.g. to stay synced),
    /// clears the user LTC-rate override, and reseeds `sourceActive`.
    pub fn set_active_input(&mut self, input: ActiveInput) {
        if self.active_input == input {
            return;
        }
        self.active_input = input;
        self.user_overrode_ltc_fps = false;
        self.source_active = false;
        log(format!("{} active input -> {input:?}", self.name), LogContext::Engine, LogKind::Note);
    }

    pub fn set_user_overrode_ltc_fps(&mut self, overridden: bool) {
        self.user_overrode_ltc_fps = overridden;
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut EngineStatus {
        &mut self.status
    }

    fn output_status_text(enabled: bool, paused: Option<bool>) -> String {
        match (enabled, paused) {
            (false, _) | (true, None) => "stopped".to_string(),
            (true, Some(true)) => "paused".to_string(),
            (true, Some(false)) => "running".to_string(),
        }
    }

    fn ambiguous_pair(a: FrameRate, b: FrameRate) -> bool {
        matches!(
            (a, b),
            (FrameRate::Fps24, FrameRate::Fps2398)
                | (FrameRate::Fps2398, FrameRate::Fps24)
                | (FrameRate::Fps30, FrameRate::Fps2997)
                | (FrameRate::Fps2997, FrameRate::Fps30)
        )
    }

    /// One 60Hz tick: read the active input, reconcile detected rate,
    /// compute the routed output timecode, push it to every enabled output,
    /// and decay the VU meters. Called on every engine every tick, whether or
    /// not it is the UI-selected one, so outputs never stall.
    pub fn tick(&mut self, now_ms: f64, wall_clock_ms_since_midnight: i64) {
        let (read_tc, read_fps, receiving) = match self.active_input {
            ActiveInput::SystemTime => {
                (wall_clock_to_timecode(wall_clock_ms_since_midnight, self.current_fps), self.current_fps, true)
            }
            ActiveInput::Mtc => match self.mtc_input.as_ref() {
                Some(input) => {
                    let receiving = input.is_receiving();
                    match input.current_timecode() {
                        Some((tc, fps)) => (tc, fps, receiving),
                        None => (self.current_timecode, self.current_fps, false),
                    }
                }
                None => (self.current_timecode, self.current_fps, false),
            },
            ActiveInput::ArtNet => match self.artnet_input.as_ref() {
                Some(input) => {
                    let (tc, fps) = input.current();
                    (tc, fps, input.is_receiving())
                }
                None => (self.current_timecode, self.current_fps, false),
            },
            ActiveInput::Ltc => match self.ltc_published.as_ref() {
                Some(published) => {
                    let (tc, fps) = published.current();
                    (tc, fps, published.is_receiving())
                }
                None => (self.current_timecode, self.current_fps, false),
            },
        };

        self.current_timecode = read_tc;
        self.source_active = receiving;

        if self.active_input != ActiveInput::SystemTime && read_fps != self.current_fps {
            let ignore_for_ltc_override = self.active_input == ActiveInput::Ltc
                && self.user_overrode_ltc_fps
                && Self::ambiguous_pair(read_fps, self.current_fps);
            if !ignore_for_ltc_override {
                self.current_fps = read_fps;
            }
        }

        let output_tc = if self.fps_convert_enabled {
            convert_timecode_rate(self.current_timecode, self.current_fps, self.output_fps)
        } else {
            self.current_timecode
        };
        let output_fps = if self.fps_convert_enabled { self.output_fps } else { self.current_fps };

        if self.mtc_out_slot.enabled {
            if let Some(output) = self.mtc_output.as_ref() {
                let target = offset_timecode(output_tc, self.mtc_out_slot.offset_frames, output_fps);
                output.set_pending(target, output_fps);
                if !self.source_active && !output.is_paused() {
                    output.pause();
                } else if self.source_active && output.is_paused() {
                    output.resume(now_ms);
                }
            }
        }
        self.status.mtc_output_status = Self::output_status_text(self.mtc_out_slot.enabled, self.mtc_output.as_ref().map(|o| o.is_paused()));

        if self.artnet_out_slot.enabled {
            if let Some(output) = self.artnet_output.as_ref() {
                let target = offset_timecode(output_tc, self.artnet_out_slot.offset_frames, output_fps);
                output.set_pending(target, output_fps);
                if !self.source_active && !output.is_paused() {
                    output.pause();
                } else if self.source_active && output.is_paused() {
                    output.resume(now_ms);
                }
            }
        }
        self.status.artnet_output_status =
            Self::output_status_text(self.artnet_out_slot.enabled, self.artnet_output.as_ref().map(|o| o.is_paused()));

        if self.ltc_out_slot.enabled {
            if let Some(output) = self.ltc_output.as_ref() {
                let target = offset_timecode(output_tc, self.ltc_out_slot.offset_frames, output_fps);
                output.set_target(LtcTarget { tc: target, fps: output_fps, gain: 1.0, base_amplitude: 0.8 });
                if !self.source_active && !output.is_paused() {
                    output.pause();
                } else if self.source_active && output.is_paused() {
                    output.resume();
                }
            }
        }
        self.status.ltc_output_status = Self::output_status_text(self.ltc_out_slot.enabled, self.ltc_output.as_ref().map(|o| o.is_paused()));

        self.status.current_timecode = self.current_timecode;
        self.status.current_fps = self.current_fps;
        self.status.source_active = self.source_active;
        self.status.input_status =
            if self.source_active { format!("receiving ({:?})", self.active_input) } else { "not receiving".to_string() };

        // MTC/Art-Net/SystemTime carry no audio amplitude, so their VU is a
        // digital presence signal; LTC's real peak is fed in separately via
        // `report_input_peak` from the audio callback that decodes it.
        if self.active_input != ActiveInput::Ltc {
            self.status.input_vu.update(if self.source_active { 1.0 } else { 0.0 });
        }
        let passthru_active = self.passthru.as_ref().is_some_and(|p| p.is_attached());
        if !passthru_active {
            self.status.passthru_vu.update(0.0);
        }
    }

    /// Feeds a freshly measured peak into the input VU meter; called from the
    /// LTC decode callback, which is the only input protocol carrying audio
    /// amplitude. Decay still applies via [`VuLevel::update`]'s own formula.
    pub fn report_input_peak(&mut self, peak: f32) {
        self.status.input_vu.update(peak);
    }

    /// Feeds a freshly measured peak into the pass-through VU meter; called
    /// from the pass-through render callback.
    pub fn report_passthru_peak(&mut self, peak: f32) {
        self.status.passthru_vu.update(peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_input_is_always_active() {
        let mut engine = TimecodeEngine::new("e");
        engine.tick(0.0, 3_661_000);
        assert!(engine.status().source_active);
        assert_eq!(engine.status().current_timecode, Timecode::new(1, 1, 1, 0));
    }

    #[test]
    fn switching_active_input_clears_override_and_resets_active_flag() {
        let mut engine = TimecodeEngine::new("e");
        engine.set_user_overrode_ltc_fps(true);
        engine.set_active_input(ActiveInput::Ltc);
        assert!(!engine.user_overrode_ltc_fps);
        assert!(!engine.status().source_active);
    }

    #[test]
    fn ltc_override_ignores_ambiguous_2398_24_mismatch() {
        use crate::ltc::{LtcEncoder, LtcInput};

        let mut engine = TimecodeEngine::new("e");
        engine.set_active_input(ActiveInput::Ltc);
        engine.current_fps = FrameRate::Fps2398;

        // Publish a real Fps24 sync, the other half of the ambiguous pair
        // with the engine's current Fps2398, so the override path this test
        // claims to cover is actually entered.
        let sample_rate = 48000.0;
        let fps = FrameRate::Fps24;
        let mut enc = LtcEncoder::new(sample_rate, fps);
        let mut input = LtcInput::new(sample_rate);
        let tc = Timecode::zero();
        let samples_per_frame = (sample_rate / fps.frames_per_second_real()).round() as usize;
        for _ in 0..(samples_per_frame * 8) {
            let s = enc.next_sample(tc, 1.0, 1.0);
            input.process_block(&[s], None);
        }
        engine.ltc_published = Some(input.published());
        engine.set_user_overrode_ltc_fps(true);

        engine.tick(0.0, 0);
        assert!(engine.status().source_active);
        assert_eq!(engine.current_fps, FrameRate::Fps2398);
    }

    #[test]
    fn output_not_routed_when_source_inactive_leaves_outputs_paused() {
        let mut engine = TimecodeEngine::new("e");
        engine.mtc_out_slot.enabled = true;
        engine.mtc_output = Some(Arc::new(MtcOutput::new()));
        engine.set_active_input(ActiveInput::Mtc);
        engine.tick(0.0, 0);
        assert!(engine.mtc_output.as_ref().unwrap().is_paused());
    }
}

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::timecode::{FrameRate, Timecode};

use super::encoder::LtcEncoder;

/// The UI/engine-facing target: where the encoder's auto-increment clock
/// should be tracking. Written from the orchestration thread, read from the
/// audio callback thread via [`ArcSwap`] — matches the teacher's
/// non-RT-write/RT-read handoff pattern for clip pointers.
#[derive(Debug, Clone, Copy)]
pub struct LtcTarget {
    pub tc: Timecode,
    pub fps: FrameRate,
    pub gain: f32,
    pub base_amplitude: f32,
}

impl Default for LtcTarget {
    fn default() -> Self {
        Self { tc: Timecode::zero(), fps: FrameRate::Fps25, gain: 1.0, base_amplitude: 0.8 }
    }
}

/// Owns the [`LtcEncoder`] and runs it against a lock-free-readable target,
/// for use from an audio output callback thread. `pause`/`resume`/`is_paused`
/// are `&self` (atomic flag) so the orchestration thread can drive them each
/// tick; `render` stays `&mut self` since only the audio callback thread that
/// owns this output ever calls it.
pub struct LtcOutput {
    encoder: LtcEncoder,
    target: Arc<ArcSwap<LtcTarget>>,
    paused: AtomicBool,
}

impl LtcOutput {
    pub fn new(sample_rate: f64, fps: FrameRate) -> Self {
        Self {
            encoder: LtcEncoder::new(sample_rate, fps),
            target: Arc::new(ArcSwap::from_pointee(LtcTarget { fps, ..LtcTarget::default() })),
            paused: AtomicBool::new(true),
        }
    }

    /// A cloneable handle for the orchestration thread to publish new targets.
    pub fn target_handle(&self) -> Arc<ArcSwap<LtcTarget>> {
        self.target.clone()
    }

    pub fn set_target(&self, target: LtcTarget) {
        self.target.store(Arc::new(target));
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Fills `out` with the next block of synthesised LTC samples. Silence
    /// while paused, matching the teacher's default-silence convention for
    /// inactive audio sources.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.is_paused() {
            out.fill(0.0);
            return;
        }
        let target = self.target.load();
        self.encoder.set_fps(target.fps);
        for slot in out.iter_mut() {
            *slot = self.encoder.next_sample(target.tc, target.gain, target.base_amplitude);
        }
    }
}

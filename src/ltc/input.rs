use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ring::RingBuffer;
use crate::timecode::{now_ms, AtomicFrameRate, AtomicTimecode, FrameRate, Timecode, SOURCE_TIMEOUT_MS};

use super::decoder::LtcDecoder;

/// Cross-thread-visible state published by the decoder, plus the pass-through
/// ring buffer: both live here because the ring is "inside LtcInput, shared
/// with passthru" per the pass-through design.
pub struct LtcPublished {
    tc: AtomicTimecode,
    fps: AtomicFrameRate,
    last_frame_time_ms: AtomicU64,
    ring: RingBuffer,
}

impl Default for LtcPublished {
    fn default() -> Self {
        Self {
            tc: AtomicTimecode::new(Timecode::zero()),
            fps: AtomicFrameRate::default(),
            last_frame_time_ms: AtomicU64::new(0),
            ring: RingBuffer::new(crate::ring::RING_CAPACITY),
        }
    }
}

impl LtcPublished {
    pub fn is_receiving(&self) -> bool {
        let last = self.last_frame_time_ms.load(Ordering::Acquire);
        last != 0 && now_ms().saturating_sub(last) < SOURCE_TIMEOUT_MS
    }

    pub fn current(&self) -> (Timecode, FrameRate) {
        (self.tc.load(Ordering::Acquire), self.fps.load(Ordering::Acquire))
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }
}

/// Decodes LTC from one audio input channel, and optionally captures a
/// second channel into the pass-through ring buffer. Owned exclusively by
/// the audio input callback thread — the decoder itself carries no
/// synchronisation, only the [`LtcPublished`] handle shared out to readers
/// is safe to touch from other threads.
pub struct LtcInput {
    published: Arc<LtcPublished>,
    decoder: LtcDecoder,
    gain: f32,
}

impl LtcInput {
    pub fn new(sample_rate: f64) -> Self {
        Self { published: Arc::new(LtcPublished::default()), decoder: LtcDecoder::new(sample_rate), gain: 1.0 }
    }

    pub fn published(&self) -> Arc<LtcPublished> {
        self.published.clone()
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Processes one audio block from the callback thread: decodes LTC from
    /// `ltc_samples` and returns its peak level for metering. If `passthru`
    /// is configured (and isn't the LTC channel itself — the caller enforces
    /// that), also pushes its gain-multiplied samples into the shared ring;
    /// that capture's own level is metered downstream by whatever renders it.
    pub fn process_block(&mut self, ltc_samples: &[f32], passthru: Option<(&[f32], f32)>) -> f32 {
        let mut peak = 0.0f32;
        for &sample in ltc_samples {
            peak = peak.max(sample.abs());
            if let Some(frame) = self.decoder.push_sample(sample, self.gain) {
                self.published.tc.store(frame.tc, Ordering::Release);
                self.published.fps.store(frame.fps, Ordering::Release);
                self.published.last_frame_time_ms.store(now_ms(), Ordering::Release);
            }
        }

        if let Some((samples, passthru_gain)) = passthru {
            let scaled: Vec<f32> = samples.iter().map(|&s| s * passthru_gain).collect();
            self.published.ring.push(&scaled);
        }
        peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltc::encoder::LtcEncoder;

    #[test]
    fn not_receiving_before_any_frame() {
        let input = LtcInput::new(48000.0);
        assert!(!input.published().is_receiving());
    }

    #[test]
    fn decoding_publishes_and_marks_receiving() {
        let sample_rate = 48000.0;
        let fps = FrameRate::Fps25;
        let mut enc = LtcEncoder::new(sample_rate, fps);
        let mut input = LtcInput::new(sample_rate);
        let tc = Timecode::zero();
        let samples_per_frame = (sample_rate / fps.frames_per_second_real()).round() as usize;
        for _ in 0..(samples_per_frame * 8) {
            let s = enc.next_sample(tc, 1.0, 1.0);
            input.process_block(&[s], None);
        }
        assert!(input.published().is_receiving());
    }

    #[test]
    fn passthru_capture_pushes_gain_scaled_samples_into_ring() {
        let mut input = LtcInput::new(48000.0);
        let peak = input.process_block(&[0.0; 4], Some((&[0.5, -0.8, 0.1], 2.0)));
        assert_eq!(peak, 0.0);
        assert_eq!(input.published().ring().len(), 3);
    }

    #[test]
    fn process_block_reports_decode_channel_peak() {
        let mut input = LtcInput::new(48000.0);
        let peak = input.process_block(&[0.2, -0.9, 0.1], None);
        assert_eq!(peak, 0.9);
    }
}

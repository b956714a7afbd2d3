use crate::timecode::{FrameRate, Timecode};

const SYNC_WORD: u16 = 0b0011_1111_1111_1101;
const MAX_SYNC_GAP_SECS: f64 = 2.0;
const DEBOUNCE_FRAMES: u32 = 3;

fn get_bits(low: u64, start: u32, len: u32) -> u32 {
    ((low >> start) & ((1u64 << len) - 1)) as u32
}

/// Decodes the fixed-position fields of a latched 64-bit LTC frame body
/// (sync word excluded). Returns `None` if any field is out of range.
fn decode_fields(low: u64) -> Option<(Timecode, bool)> {
    let frames = get_bits(low, 8, 2) * 10 + get_bits(low, 0, 4);
    let drop_frame = get_bits(low, 10, 1) != 0;
    let seconds = get_bits(low, 24, 3) * 10 + get_bits(low, 16, 4);
    let minutes = get_bits(low, 40, 3) * 10 + get_bits(low, 32, 4);
    let hours = get_bits(low, 56, 2) * 10 + get_bits(low, 48, 4);

    if frames >= 30 || seconds >= 60 || minutes >= 60 || hours >= 24 {
        return None;
    }
    Some((Timecode::new(hours as u8, minutes as u8, seconds as u8, frames as u8), drop_frame))
}

fn classify_rate(measured_fps: f64, drop_frame: bool) -> FrameRate {
    if measured_fps < 24.5 {
        FrameRate::Fps24
    } else if measured_fps < 27.0 {
        FrameRate::Fps25
    } else if drop_frame {
        FrameRate::Fps2997
    } else {
        FrameRate::Fps30
    }
}

/// A frame the decoder has latched: the decoded timecode, the currently
/// committed frame rate (after debounce), and whether this latch started a
/// fresh debounce window (rate not yet trustworthy).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LtcFrame {
    pub tc: Timecode,
    pub fps: FrameRate,
}

/// Audio-callback-thread-only LTC biphase-mark decoder. No internal
/// synchronisation — the caller is responsible for ensuring only one thread
/// ever calls [`Self::push_sample`].
pub struct LtcDecoder {
    sample_rate: f64,
    signal_high: bool,
    samples_since_edge: i64,
    bit_period_estimate: f64,
    half_bit_pending: bool,
    shift_low: u64,
    shift_high: u16,
    samples_since_last_sync: i64,
    consecutive_good_frames: u32,
    candidate_fps: Option<FrameRate>,
    committed_fps: Option<FrameRate>,
}

impl LtcDecoder {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            signal_high: false,
            samples_since_edge: 0,
            // Midpoint between 24 and 30 fps mean transition rates minimises convergence time.
            bit_period_estimate: sample_rate / 2160.0,
            half_bit_pending: false,
            shift_low: 0,
            shift_high: 0,
            samples_since_last_sync: 0,
            consecutive_good_frames: 0,
            candidate_fps: None,
            committed_fps: None,
        }
    }

    fn push_bit(&mut self, bit: bool) -> bool {
        let carry = (self.shift_low >> 63) & 1;
        self.shift_high = (self.shift_high << 1) | carry as u16;
        self.shift_low = (self.shift_low << 1) | bit as u64;
        self.shift_high == SYNC_WORD
    }

    /// Feeds one audio sample (pre-gain, in `[-1.0, 1.0]`). Returns `Some`
    /// whenever a fresh, valid, rate-committed frame has been latched.
    pub fn push_sample(&mut self, raw_sample: f32, gain: f32) -> Option<LtcFrame> {
        self.samples_since_last_sync += 1;
        let sample = raw_sample * gain;

        let new_high = if sample > 0.05 {
            true
        } else if sample < -0.05 {
            false
        } else {
            self.signal_high
        };

        self.samples_since_edge += 1;
        if new_high == self.signal_high {
            return None;
        }

        let interval = self.samples_since_edge as f64;
        let half_bit = self.bit_period_estimate / 2.0;
        self.signal_high = new_high;
        self.samples_since_edge = 0;

        let mut latched_low: Option<u64> = None;

        if interval < 0.4 * half_bit || interval > 1.8 * self.bit_period_estimate {
            self.half_bit_pending = false;
        } else if interval < 0.75 * self.bit_period_estimate {
            if self.half_bit_pending {
                if self.push_bit(true) {
                    latched_low = Some(self.shift_low);
                }
                self.bit_period_estimate = 0.95 * self.bit_period_estimate + 0.05 * (interval * 2.0);
                self.half_bit_pending = false;
            } else {
                self.half_bit_pending = true;
            }
        } else {
            self.half_bit_pending = false;
            if self.push_bit(false) {
                latched_low = Some(self.shift_low);
            }
            self.bit_period_estimate = 0.95 * self.bit_period_estimate + 0.05 * interval;
        }

        let low = latched_low?;
        let (tc, drop_frame) = decode_fields(low)?;

        let gap_secs = self.samples_since_last_sync as f64 / self.sample_rate;
        let measured_fps = if gap_secs > 0.0 { 1.0 / gap_secs } else { 0.0 };
        self.samples_since_last_sync = 0;

        if gap_secs > MAX_SYNC_GAP_SECS {
            self.consecutive_good_frames = 0;
            self.candidate_fps = None;
        } else {
            let candidate = classify_rate(measured_fps, drop_frame);
            if self.candidate_fps == Some(candidate) {
                self.consecutive_good_frames += 1;
            } else {
                self.candidate_fps = Some(candidate);
                self.consecutive_good_frames = 1;
            }
            if self.consecutive_good_frames >= DEBOUNCE_FRAMES {
                self.committed_fps = Some(candidate);
            }
        }

        let fps = self.committed_fps?;
        Some(LtcFrame { tc, fps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltc::encoder::LtcEncoder;

    fn decode_n_frames(fps: FrameRate, sample_rate: f64, frames: u32) -> Vec<LtcFrame> {
        let mut enc = LtcEncoder::new(sample_rate, fps);
        let mut dec = LtcDecoder::new(sample_rate);
        let mut out = Vec::new();
        let mut tc = Timecode::zero();
        let samples_per_frame = (sample_rate / fps.frames_per_second_real()).round() as usize;
        for _ in 0..frames {
            for _ in 0..samples_per_frame {
                let s = enc.next_sample(tc, 1.0, 1.0);
                if let Some(f) = dec.push_sample(s, 1.0) {
                    out.push(f);
                }
            }
            tc = crate::timecode::increment_frame(tc, fps);
        }
        out
    }

    #[test]
    fn field_decoding_rejects_out_of_range_hours() {
        let mut low = 0u64;
        // hour tens = 3, hour units = 0 -> 30, out of range.
        low |= 3 << 56;
        assert!(decode_fields(low).is_none());
    }

    #[test]
    fn field_decoding_round_trips_legal_value() {
        let tc = Timecode::new(12, 34, 56, 10);
        let mut low = 0u64;
        low |= ((tc.frames % 10) as u64) << 0;
        low |= ((tc.frames / 10) as u64) << 8;
        low |= ((tc.seconds % 10) as u64) << 16;
        low |= ((tc.seconds / 10) as u64) << 24;
        low |= ((tc.minutes % 10) as u64) << 32;
        low |= ((tc.minutes / 10) as u64) << 40;
        low |= ((tc.hours % 10) as u64) << 48;
        low |= ((tc.hours / 10) as u64) << 56;
        let (decoded, _) = decode_fields(low).unwrap();
        assert_eq!(decoded, tc);
    }

    #[test]
    fn rate_classification_thresholds() {
        assert_eq!(classify_rate(24.0, false), FrameRate::Fps24);
        assert_eq!(classify_rate(25.0, false), FrameRate::Fps25);
        assert_eq!(classify_rate(29.97, true), FrameRate::Fps2997);
        assert_eq!(classify_rate(30.0, false), FrameRate::Fps30);
    }

    #[test]
    fn decodes_encoder_output_after_debounce_at_25fps() {
        let frames = decode_n_frames(FrameRate::Fps25, 48000.0, 8);
        assert!(!frames.is_empty(), "decoder never committed a rate");
        for f in &frames {
            assert_eq!(f.fps, FrameRate::Fps25);
        }
    }

    #[test]
    fn decodes_encoder_output_at_2997_with_drop_frame_flag() {
        let frames = decode_n_frames(FrameRate::Fps2997, 48000.0, 8);
        assert!(!frames.is_empty());
        for f in &frames {
            assert_eq!(f.fps, FrameRate::Fps2997);
        }
    }

    #[test]
    fn decoded_timecodes_increment_across_frames() {
        let frames = decode_n_frames(FrameRate::Fps30, 48000.0, 10);
        assert!(frames.len() >= 2);
        for pair in frames.windows(2) {
            let expected = crate::timecode::increment_frame(pair[0].tc, FrameRate::Fps30);
            assert_eq!(pair[1].tc, expected);
        }
    }
}

use std::sync::atomic::Ordering;
use std::sync::Mutex;

use crate::timecode::{AtomicFrameRate, AtomicTimecode, FrameRate, Timecode};

/// One MIDI message [`MtcOutput::tick`] wants sent. `QuarterFrame` carries
/// only the data byte; callers prepend the `0xF1` status byte themselves
/// (mirrors how the teacher's JACK MIDI ports write raw byte slices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtcMessage {
    QuarterFrame(u8),
    FullFrame([u8; 10]),
}

fn quarter_frame_byte(tc: Timecode, index: u8, fps: FrameRate) -> u8 {
    let nibble = match index {
        0 => tc.frames & 0x0F,
        1 => (tc.frames >> 4) & 0x01,
        2 => tc.seconds & 0x0F,
        3 => (tc.seconds >> 4) & 0x03,
        4 => tc.minutes & 0x0F,
        5 => (tc.minutes >> 4) & 0x03,
        6 => tc.hours & 0x0F,
        _ => (fps.rate_code() << 1) | ((tc.hours >> 4) & 0x01),
    };
    (index << 4) | nibble
}

fn full_frame_message(tc: Timecode, fps: FrameRate) -> [u8; 10] {
    let hr = (fps.rate_code() << 5) | (tc.hours & 0x1F);
    [0xF0, 0x7F, 0x7F, 0x01, 0x01, hr, tc.minutes, tc.seconds, tc.frames, 0xF7]
}

struct Accumulator {
    last_send_ms: Option<f64>,
    qf_index: u8,
    cycle_tc: Timecode,
    paused: bool,
    pending_resync: Option<MtcMessage>,
}

/// Emits 4 MTC quarter frames per SMPTE frame on a drift-free fractional
/// accumulator, re-syncing receivers with a Full-Frame after every
/// pause/resume.
///
/// Holds its own atomic pending target (per §5's "each handler has its own
/// internal atomic pending-Timecode"): the orchestration thread calls
/// [`Self::set_pending`] every engine tick, and this handler's own
/// high-resolution timer thread calls [`Self::tick`], which reads whatever
/// target is current at each quarter-frame boundary.
pub struct MtcOutput {
    pending_tc: AtomicTimecode,
    pending_fps: AtomicFrameRate,
    accum: Mutex<Accumulator>,
}

impl Default for MtcOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl MtcOutput {
    pub fn new() -> Self {
        Self {
            pending_tc: AtomicTimecode::new(Timecode::zero()),
            pending_fps: AtomicFrameRate::default(),
            accum: Mutex::new(Accumulator {
                last_send_ms: None,
                qf_index: 0,
                cycle_tc: Timecode::zero(),
                paused: true,
                pending_resync: None,
            }),
        }
    }

    /// Called from the orchestration thread on every engine tick.
    pub fn set_pending(&self, tc: Timecode, fps: FrameRate) {
        self.pending_tc.store(tc, Ordering::Relaxed);
        self.pending_fps.store(fps, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.accum.lock().expect("mtc output lock poisoned").paused
    }

    pub fn pause(&self) {
        self.accum.lock().expect("mtc output lock poisoned").paused = true;
    }

    /// Zeros the QF index, restarts the accumulator from `now_ms`, and queues
    /// a Full-Frame resync message for the next [`Self::tick`] to emit (the
    /// handler's own timer thread is what actually writes to the MIDI port,
    /// not the orchestration thread calling `resume`).
    pub fn resume(&self, now_ms: f64) -> MtcMessage {
        let tc = self.pending_tc.load(Ordering::Relaxed);
        let fps = self.pending_fps.load(Ordering::Relaxed);
        let msg = MtcMessage::FullFrame(full_frame_message(tc, fps));
        let mut accum = self.accum.lock().expect("mtc output lock poisoned");
        accum.paused = false;
        accum.qf_index = 0;
        accum.last_send_ms = Some(now_ms);
        accum.pending_resync = Some(msg);
        msg
    }

    /// Advances the accumulator to `now_ms`, returning zero or more messages
    /// to send in order. At most two quarter frames are emitted per call
    /// (catch-up burst cap) even if more are notionally due. Any resync
    /// Full-Frame queued by [`Self::resume`] is always emitted first.
    pub fn tick(&self, now_ms: f64) -> Vec<MtcMessage> {
        let mut accum = self.accum.lock().expect("mtc output lock poisoned");
        if accum.paused {
            return Vec::new();
        }
        let mut resync = Vec::new();
        if let Some(msg) = accum.pending_resync.take() {
            resync.push(msg);
        }
        let last = match accum.last_send_ms {
            Some(t) => t,
            None => {
                accum.last_send_ms = Some(now_ms);
                now_ms
            }
        };
        if now_ms - last > 50.0 {
            accum.last_send_ms = Some(now_ms);
            return resync;
        }

        let fps = self.pending_fps.load(Ordering::Relaxed);
        let ideal_interval = 1000.0 / (fps.frames_per_second_real() * 4.0);
        // A resync Full-Frame counts against the same per-tick burst budget as
        // quarter frames, so a `resume` mid-catch-up never exceeds the cap.
        let burst_cap = 2usize.saturating_sub(resync.len());
        let mut out = resync;
        let mut last_send = last;
        let mut sent = 0;
        while now_ms - last_send >= ideal_interval && sent < burst_cap {
            if accum.qf_index == 0 {
                accum.cycle_tc = self.pending_tc.load(Ordering::Relaxed);
            }
            out.push(MtcMessage::QuarterFrame(quarter_frame_byte(accum.cycle_tc, accum.qf_index, fps)));
            last_send += ideal_interval;
            accum.qf_index = (accum.qf_index + 1) % 8;
            sent += 1;
        }
        accum.last_send_ms = Some(last_send);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtc::input::MtcInput;

    #[test]
    fn resume_emits_full_frame_and_unpauses() {
        let out = MtcOutput::new();
        let tc = Timecode::new(1, 2, 3, 4);
        out.set_pending(tc, FrameRate::Fps25);
        let msg = out.resume(0.0);
        assert_eq!(msg, MtcMessage::FullFrame(full_frame_message(tc, FrameRate::Fps25)));
        assert!(!out.is_paused());
    }

    #[test]
    fn paused_output_emits_nothing() {
        let out = MtcOutput::new();
        assert!(out.tick(1000.0).is_empty());
    }

    #[test]
    fn ticks_accumulate_fractional_interval_without_drift() {
        let fps = FrameRate::Fps2997;
        let out = MtcOutput::new();
        out.set_pending(Timecode::zero(), fps);
        out.resume(0.0);
        let ideal = 1000.0 / (fps.frames_per_second_real() * 4.0);

        // Drive with lots of small ticks; the accumulator must never lose or
        // gain a quarter frame relative to a single big tick over the same span.
        let mut total_sent = 0usize;
        let mut t = 0.0;
        while t < ideal * 80.0 {
            t += 1.0;
            total_sent += out.tick(t).len();
        }
        let expected = ((ideal * 80.0) / ideal).floor() as usize;
        assert!((total_sent as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn catch_up_burst_is_capped_at_two_per_tick() {
        let fps = FrameRate::Fps30;
        let out = MtcOutput::new();
        out.set_pending(Timecode::zero(), fps);
        out.resume(0.0);
        // Jump far enough that many QFs are nominally due, but stay under the
        // 50ms suspension-recovery threshold.
        let msgs = out.tick(40.0);
        assert!(msgs.len() <= 2);
    }

    #[test]
    fn long_gap_resets_without_burst() {
        let fps = FrameRate::Fps25;
        let out = MtcOutput::new();
        out.set_pending(Timecode::zero(), fps);
        out.resume(0.0);
        let msgs = out.tick(500.0);
        assert!(msgs.is_empty());
    }

    #[test]
    fn cycle_coherence_all_nibbles_describe_same_frame() {
        let fps = FrameRate::Fps25;
        let out = MtcOutput::new();
        out.set_pending(Timecode::new(0, 0, 0, 0), fps);
        out.resume(0.0);
        let ideal = 1000.0 / (fps.frames_per_second_real() * 4.0);

        // Advance the pending target mid-cycle after QF index 0 has latched
        // cycle_tc; the remaining 7 QFs in this cycle must still describe frame 0.
        let decoder = MtcInput::new();
        let mut t = 0.0;
        for i in 0..8 {
            t += ideal;
            out.set_pending(Timecode::new(0, 0, 0, i), fps);
            for msg in out.tick(t) {
                if let MtcMessage::QuarterFrame(b) = msg {
                    decoder.feed_quarter_frame(b);
                }
            }
        }
        let (tc, decoded_fps) = decoder.current_timecode().unwrap();
        assert_eq!(decoded_fps, fps);
        // Encoded frame 0 plus the decoder's +2 compensation.
        assert_eq!(tc, Timecode::new(0, 0, 0, 2));
    }
}

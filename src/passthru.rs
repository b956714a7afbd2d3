use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::ltc::LtcPublished;

/// Passes LTC-input audio through to an independent output device, possibly
/// on a different sample rate / clock domain. Holds a non-owning reference to
/// the LTC input's published ring buffer: the producer (LTC audio-in
/// callback) outlives this consumer's view of it, and shutdown always
/// null-stores the reference before the producer is torn down.
pub struct AudioPassthru {
    source: ArcSwapOption<LtcPublished>,
}

impl Default for AudioPassthru {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPassthru {
    pub fn new() -> Self {
        Self { source: ArcSwapOption::empty() }
    }

    /// Points the consumer at a new LTC input. Discards whatever stale audio
    /// was buffered for the previous source (or for this one, if re-attaching)
    /// so playback doesn't resume mid-buffer.
    pub fn set_source(&self, source: Arc<LtcPublished>) {
        source.ring().sync_read_to_write();
        self.source.store(Some(source));
    }

    /// Shutdown step one: null-store the reference (release-ordered via
    /// `ArcSwapOption`). The caller is responsible for then removing this
    /// consumer's own audio callback, closing its device, and only after
    /// that destroying the producer.
    pub fn stop(&self) {
        self.source.store(None);
    }

    pub fn is_attached(&self) -> bool {
        self.source.load().is_some()
    }

    /// Renders one block. `channel == -1` means stereo: `primary` is filled
    /// from the ring and then duplicated into `secondary`. No-ops to silence
    /// if no source is attached (acquire-load at entry, per the pointer
    /// lifecycle contract).
    pub fn render(&self, channel: i32, gain: f32, primary: &mut [f32], secondary: Option<&mut [f32]>) {
        let guard = self.source.load();
        let Some(src) = guard.as_ref() else {
            primary.fill(0.0);
            if let Some(sec) = secondary {
                sec.fill(0.0);
            }
            return;
        };
        src.ring().pop_into(primary);
        for sample in primary.iter_mut() {
            *sample *= gain;
        }
        if channel == -1 {
            if let Some(sec) = secondary {
                sec.copy_from_slice(primary);
            }
        }
    }

    pub fn overrun_count(&self) -> Option<u64> {
        self.source.load().as_ref().map(|s| s.ring().overrun_count())
    }

    pub fn underrun_count(&self) -> Option<u64> {
        self.source.load().as_ref().map(|s| s.ring().underrun_count())
    }
}

/// Status text for a sample-rate mismatch between the LTC input device and
/// the pass-through output device; `None` if the rates match. No resampling
/// is performed — counters will simply drift.
pub fn rate_mismatch_status(in_rate: u32, out_rate: u32) -> Option<String> {
    if in_rate == out_rate {
        None
    } else {
        Some(format!("[RATE MISMATCH {in_rate} in/{out_rate} out]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltc::LtcInput;

    #[test]
    fn renders_silence_with_no_source_attached() {
        let passthru = AudioPassthru::new();
        let mut primary = [1.0f32; 4];
        passthru.render(0, 1.0, &mut primary, None);
        assert_eq!(primary, [0.0; 4]);
    }

    #[test]
    fn stereo_channel_duplicates_primary_into_secondary() {
        let passthru = AudioPassthru::new();
        let input = LtcInput::new(48000.0);
        let published = input.published();
        published.ring().push(&[0.1, 0.2, 0.3, 0.4]);
        passthru.set_source(published);

        let mut primary = [0.0f32; 4];
        let mut secondary = [0.0f32; 4];
        passthru.render(-1, 1.0, &mut primary, Some(&mut secondary));
        assert_eq!(primary, secondary);
    }

    #[test]
    fn stop_makes_subsequent_render_silent() {
        let passthru = AudioPassthru::new();
        let input = LtcInput::new(48000.0);
        passthru.set_source(input.published());
        passthru.stop();
        assert!(!passthru.is_attached());
        let mut primary = [9.0f32; 2];
        passthru.render(0, 1.0, &mut primary, None);
        assert_eq!(primary, [0.0; 2]);
    }

    #[test]
    fn rate_mismatch_reports_status_text() {
        assert_eq!(rate_mismatch_status(48000, 48000), None);
        assert_eq!(rate_mismatch_status(44100, 48000), Some("[RATE MISMATCH 44100 in/48000 out]".to_string()));
    }
}

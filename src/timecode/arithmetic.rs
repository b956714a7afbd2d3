//! Pure SMPTE timecode arithmetic: increment, offset, wall-clock conversion,
//! cross-rate conversion. All drop-frame-correct for FPS_2997.

use super::types::{FrameRate, Timecode};

const MS_PER_DAY: i64 = 86_400_000;

/// True iff `(seconds, minutes, frames)` lands on the illegal drop-frame pair:
/// frames 0 or 1 of a non-tenth minute, at second 0.
pub fn is_df_illegal(tc: Timecode, fps: FrameRate) -> bool {
    fps.is_drop_frame() && tc.seconds == 0 && tc.frames < 2 && tc.minutes % 10 != 0
}

/// Re-maps an illegal drop-frame (seconds=0, frames<2, minutes%10!=0) value to
/// frames=2. A no-op for non-DF rates or legal values.
fn apply_df_patch(mut tc: Timecode, fps: FrameRate) -> Timecode {
    if is_df_illegal(tc, fps) {
        tc.frames = 2;
    }
    tc
}

fn wrap_hours(mut tc: Timecode) -> Timecode {
    if tc.hours >= 24 {
        tc.hours %= 24;
    }
    tc
}

/// Adds one frame, carrying through seconds/minutes/hours with 24h wraparound,
/// then applies the drop-frame patch.
pub fn increment_frame(tc: Timecode, fps: FrameRate) -> Timecode {
    let mut out = tc;
    out.frames += 1;
    if out.frames >= fps.frames_per_second_int() {
        out.frames = 0;
        out.seconds += 1;
        if out.seconds >= 60 {
            out.seconds = 0;
            out.minutes += 1;
            if out.minutes >= 60 {
                out.minutes = 0;
                out.hours += 1;
            }
        }
    }
    apply_df_patch(wrap_hours(out), fps)
}

/// Linear (DF-unaware) frame count since midnight: every frame number in
/// `0..frames_per_second_int` is counted in every second. Used as the
/// intermediate representation for [`offset_timecode`].
fn to_linear_frames(tc: Timecode, fps_int: i64) -> i64 {
    (((tc.hours as i64) * 60 + tc.minutes as i64) * 60 + tc.seconds as i64) * fps_int + tc.frames as i64
}

fn from_linear_frames(mut frames: i64, fps_int: i64) -> Timecode {
    let day_frames = fps_int * 86_400;
    frames = frames.rem_euclid(day_frames);
    let f = (frames % fps_int) as u8;
    frames /= fps_int;
    let s = (frames % 60) as u8;
    frames /= 60;
    let m = (frames % 60) as u8;
    frames /= 60;
    let h = (frames % 24) as u8;
    Timecode::new(h, m, s, f)
}

/// Advances `tc` by `n` linear frames (may be negative, any magnitude),
/// wrapping at 24h, then re-applies the drop-frame patch. Used both by
/// [`offset_timecode`] (bounded to `|n| <= 30`, where the patch is exact
/// because DF skips are never closer together than 1798 frames) and by the
/// MTC/LTC interpolators, which advance by however many frames elapsed since
/// the last sync — always well under the 1798-frame skip spacing given the
/// 150ms source timeout, so the same exactness argument applies.
pub(crate) fn advance_frames(tc: Timecode, n: i64, fps: FrameRate) -> Timecode {
    let fps_int = fps.frames_per_second_int() as i64;
    let linear = to_linear_frames(tc, fps_int) + n;
    let out = from_linear_frames(linear, fps_int);
    apply_df_patch(out, fps)
}

/// Offsets `tc` by `n` frames (`|n| <= 30`), wrapping at 24h, then re-applies
/// the drop-frame patch. `n` outside `[-30, 30]` is clamped: the UI is
/// expected to constrain it, but this function must never silently
/// misbehave on a caller's bug.
pub fn offset_timecode(tc: Timecode, n: i32, fps: FrameRate) -> Timecode {
    advance_frames(tc, n.clamp(-30, 30) as i64, fps)
}

/// Converts milliseconds since midnight to a [`Timecode]` at `fps`.
/// Drop-frame-correct for FPS_2997 (standard SMPTE 10-minute-block algorithm).
pub fn wall_clock_to_timecode(ms_since_midnight: i64, fps: FrameRate) -> Timecode {
    let ms = ms_since_midnight.rem_euclid(MS_PER_DAY);

    if fps.is_drop_frame() {
        let total_frames_nominal = (ms as f64 * 30000.0 / 1001.0 / 1000.0).round() as i64;
        let d = total_frames_nominal.div_euclid(17982);
        let m = total_frames_nominal.rem_euclid(17982);
        let mut total_frames = if m > 1 {
            total_frames_nominal + 18 * d + 2 * ((m - 2).div_euclid(1798))
        } else {
            total_frames_nominal + 18 * d
        };
        total_frames = total_frames.rem_euclid(30 * 86_400);
        let f = (total_frames % 30) as u8;
        total_frames /= 30;
        let s = (total_frames % 60) as u8;
        total_frames /= 60;
        let m = (total_frames % 60) as u8;
        total_frames /= 60;
        let h = (total_frames % 24) as u8;
        return apply_df_patch(Timecode::new(h, m, s, f), fps);
    }

    let total_seconds = ms / 1000;
    let frac_ms = (ms % 1000) as f64;
    let h = ((total_seconds / 3600) % 24) as u8;
    let m = ((total_seconds / 60) % 60) as u8;
    let s = (total_seconds % 60) as u8;
    let fps_int = fps.frames_per_second_int();
    let frames = ((frac_ms / 1000.0) * fps.frames_per_second_real()).floor() as u8 % fps_int;
    Timecode::new(h, m, s, frames)
}

/// Inverse of [`wall_clock_to_timecode`].
pub fn timecode_to_ms(tc: Timecode, fps: FrameRate) -> i64 {
    if fps.is_drop_frame() {
        let total_minutes = tc.hours as i64 * 60 + tc.minutes as i64;
        let frame_count_30 = ((tc.hours as i64 * 3600 + tc.minutes as i64 * 60 + tc.seconds as i64) * 30
            + tc.frames as i64)
            - 2 * (total_minutes - total_minutes.div_euclid(10));
        return (frame_count_30 as f64 * 1000.0 * 1001.0 / 30000.0).round() as i64;
    }

    let base_ms = (tc.hours as i64 * 3600 + tc.minutes as i64 * 60 + tc.seconds as i64) * 1000;
    let frac_ms = (tc.frames as f64 * 1000.0 / fps.frames_per_second_real()).round() as i64;
    base_ms + frac_ms
}

/// Converts `tc` from one rate to another via its wall-clock time.
pub fn convert_timecode_rate(tc: Timecode, from: FrameRate, to: FrameRate) -> Timecode {
    wall_clock_to_timecode(timecode_to_ms(tc, from), to)
}

/// Shortest signed distance in frames from `a` to `b` on the 24h wheel
/// (positive if `b` is ahead of `a`). Used by the LTC encoder to decide
/// whether its auto-increment clock has drifted far enough from the target
/// to warrant a hard resync.
pub(crate) fn frame_distance(a: Timecode, b: Timecode, fps: FrameRate) -> i64 {
    let fps_int = fps.frames_per_second_int() as i64;
    let day_frames = fps_int * 86_400;
    let la = to_linear_frames(a, fps_int);
    let lb = to_linear_frames(b, fps_int);
    let mut diff = (lb - la).rem_euclid(day_frames);
    if diff > day_frames / 2 {
        diff -= day_frames;
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_RATES: [FrameRate; 5] =
        [FrameRate::Fps2398, FrameRate::Fps24, FrameRate::Fps25, FrameRate::Fps2997, FrameRate::Fps30];

    fn all_legal_timecodes(fps: FrameRate) -> impl Iterator<Item = Timecode> {
        let fps_int = fps.frames_per_second_int();
        (0..24).flat_map(move |h| {
            (0..60).flat_map(move |m| {
                (0..60).flat_map(move |s| {
                    (0..fps_int).filter_map(move |f| {
                        let tc = Timecode::new(h, m, s, f);
                        if fps.is_drop_frame() && is_df_illegal(tc, fps) {
                            None
                        } else {
                            Some(tc)
                        }
                    })
                })
            })
        })
    }

    #[test]
    fn increment_closure_stays_in_range() {
        for fps in ALL_RATES {
            // Full sweep is 2.6M timecodes per rate; sample densely instead of
            // exhaustively to keep the suite fast while covering every hour/minute boundary.
            for h in 0..24u8 {
                for m in [0, 1, 9, 10, 11, 59] {
                    for s in [0, 30, 59] {
                        for f in 0..fps.frames_per_second_int() {
                            let tc = Timecode::new(h, m, s, f);
                            if fps.is_drop_frame() && is_df_illegal(tc, fps) {
                                continue;
                            }
                            let next = increment_frame(tc, fps);
                            assert!(next.in_range(fps), "{next} out of range for {fps}");
                            assert!(!is_df_illegal(next, fps), "{next} illegal DF pair for {fps}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn df_legality_holds_for_increment_and_offset() {
        for fps in [FrameRate::Fps2997] {
            for tc in all_legal_timecodes(fps).step_by(37) {
                let next = increment_frame(tc, fps);
                if next.seconds == 0 && next.minutes % 10 != 0 {
                    assert!(next.frames >= 2);
                }
                let offs = offset_timecode(tc, 5, fps);
                if offs.seconds == 0 && offs.minutes % 10 != 0 {
                    assert!(offs.frames >= 2);
                }
            }
        }
    }

    #[test]
    fn round_trip_wall_clock_conversion() {
        for fps in ALL_RATES {
            let tolerance_ms = (1000.0 / fps.frames_per_second_real()).ceil() as i64;
            for ms in (0..MS_PER_DAY).step_by(997) {
                let tc = wall_clock_to_timecode(ms, fps);
                let back = timecode_to_ms(tc, fps);
                assert!(
                    (back - ms).abs() <= tolerance_ms,
                    "fps={fps} ms={ms} back={back} tolerance={tolerance_ms}"
                );
            }
        }
    }

    #[test]
    fn cross_rate_identity() {
        for fps in ALL_RATES {
            for tc in all_legal_timecodes(fps).step_by(53) {
                assert_eq!(convert_timecode_rate(tc, fps, fps), tc);
            }
        }
    }

    #[test]
    fn offset_symmetry() {
        for fps in ALL_RATES {
            for n in [1, 7, 15, 30, -1, -7, -15, -30] {
                for tc in all_legal_timecodes(fps).step_by(61) {
                    let there = offset_timecode(tc, n, fps);
                    let back = offset_timecode(there, -n, fps);
                    assert_eq!(back, tc, "fps={fps} n={n} tc={tc}");
                }
            }
        }
    }

    #[test]
    fn drop_frame_cadence_is_17982_per_10_minutes() {
        let fps = FrameRate::Fps2997;
        let mut tc = Timecode::zero();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..17982 {
            seen.insert(tc);
            tc = increment_frame(tc, fps);
        }
        assert_eq!(seen.len(), 17982);
        assert_eq!(tc, Timecode::new(0, 10, 0, 0));
    }

    #[test]
    fn scenario_a_2997_minute_boundary_on_tenth() {
        let tc = Timecode::new(0, 9, 59, 29);
        assert_eq!(increment_frame(tc, FrameRate::Fps2997), Timecode::new(0, 10, 0, 0));
    }

    #[test]
    fn scenario_b_2997_minute_boundary_drops_frames() {
        let tc = Timecode::new(0, 0, 59, 29);
        assert_eq!(increment_frame(tc, FrameRate::Fps2997), Timecode::new(0, 1, 0, 2));
    }

    #[test]
    fn scenario_c_offset_negative_one_wraps_hour() {
        let tc = Timecode::new(1, 0, 0, 0);
        assert_eq!(offset_timecode(tc, -1, FrameRate::Fps30), Timecode::new(0, 59, 59, 29));
    }

    #[test]
    fn scenario_d_wall_clock_25fps() {
        assert_eq!(wall_clock_to_timecode(3_661_000, FrameRate::Fps25), Timecode::new(1, 1, 1, 0));
    }

    #[test]
    fn scenario_g_2997_encoder_wraps_at_24h() {
        let mut tc = Timecode::new(23, 59, 59, 29);
        tc = increment_frame(tc, FrameRate::Fps30);
        assert_eq!(tc, Timecode::new(0, 0, 0, 0));
    }

    #[test]
    fn frame_distance_is_signed_and_shortest_path() {
        let fps = FrameRate::Fps25;
        let a = Timecode::new(12, 0, 0, 0);
        let b = increment_frame(a, fps);
        assert_eq!(frame_distance(a, b, fps), 1);
        assert_eq!(frame_distance(b, a, fps), -1);
        // Crossing midnight should still report the short way around.
        let near_midnight = Timecode::new(23, 59, 59, 24);
        let just_after = Timecode::new(0, 0, 0, 0);
        assert_eq!(frame_distance(near_midnight, just_after, fps), 1);
    }

    #[test]
    fn offset_rejects_out_of_bounds_n_by_clamping() {
        let tc = Timecode::new(1, 0, 0, 0);
        assert_eq!(offset_timecode(tc, 1000, FrameRate::Fps30), offset_timecode(tc, 30, FrameRate::Fps30));
        assert_eq!(offset_timecode(tc, -1000, FrameRate::Fps30), offset_timecode(tc, -30, FrameRate::Fps30));
    }
}

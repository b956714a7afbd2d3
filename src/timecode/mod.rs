pub mod arithmetic;
pub mod types;

pub use arithmetic::{convert_timecode_rate, increment_frame, offset_timecode, timecode_to_ms, wall_clock_to_timecode};
pub use types::{AtomicFrameRate, AtomicTimecode, FrameRate, Timecode};

/// A source is no longer considered live once this many milliseconds have
/// passed without a new packet/sync point. Compile-time constant, not config
/// — see the design notes' "no singletons" rule.
pub const SOURCE_TIMEOUT_MS: u64 = 150;

/// Hard cap on the number of engines an [`crate::supervisor::EngineSupervisor`] may hold.
pub const MAX_ENGINES: usize = 8;

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// One SMPTE frame address on the 24h wheel. Canonical representation
/// throughout the crate; see [`Timecode::to_packed`] for the wire/atomic form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

impl Timecode {
    pub const fn new(hours: u8, minutes: u8, seconds: u8, frames: u8) -> Self {
        Self { hours, minutes, seconds, frames }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// One byte per field, bijective for in-range values: `hh << 24 | mm << 16 | ss << 8 | ff`.
    pub fn to_packed(self) -> u32 {
        (self.hours as u32) << 24
            | (self.minutes as u32) << 16
            | (self.seconds as u32) << 8
            | self.frames as u32
    }

    pub fn from_packed(packed: u32) -> Self {
        Self {
            hours: (packed >> 24) as u8,
            minutes: (packed >> 16) as u8,
            seconds: (packed >> 8) as u8,
            frames: packed as u8,
        }
    }

    /// Range-legal for `fps`, ignoring the drop-frame illegal-pair rule (see
    /// [`super::arithmetic::is_df_illegal`] for that).
    pub fn in_range(self, fps: FrameRate) -> bool {
        self.hours < 24
            && self.minutes < 60
            && self.seconds < 60
            && self.frames < fps.frames_per_second_int()
    }
}

impl Display for Timecode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds, self.frames)
    }
}

/// An atomically-published [`Timecode`], packed into a single `u32` so that
/// cross-thread reads never observe a torn field.
#[derive(Debug, Default)]
pub struct AtomicTimecode(AtomicU32);

impl AtomicTimecode {
    pub fn new(tc: Timecode) -> Self {
        Self(AtomicU32::new(tc.to_packed()))
    }

    pub fn load(&self, order: Ordering) -> Timecode {
        Timecode::from_packed(self.0.load(order))
    }

    pub fn store(&self, tc: Timecode, order: Ordering) {
        self.0.store(tc.to_packed(), order);
    }
}

/// The five frame rates this system understands. `FPS_2398` and `FPS_24` share
/// MTC/Art-Net rate code 0 — see the Open Question in the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FrameRate {
    Fps2398,
    Fps24,
    Fps25,
    Fps2997,
    Fps30,
}

impl FrameRate {
    pub const ALL: [FrameRate; 5] =
        [FrameRate::Fps2398, FrameRate::Fps24, FrameRate::Fps25, FrameRate::Fps2997, FrameRate::Fps30];

    /// Integer frames/second used for carry arithmetic (30 for FPS_2997).
    pub const fn frames_per_second_int(self) -> u8 {
        match self {
            FrameRate::Fps2398 | FrameRate::Fps24 => 24,
            FrameRate::Fps25 => 25,
            FrameRate::Fps2997 | FrameRate::Fps30 => 30,
        }
    }

    /// Exact real-valued frame rate in Hz.
    pub const fn frames_per_second_real(self) -> f64 {
        match self {
            FrameRate::Fps2398 => 24000.0 / 1001.0,
            FrameRate::Fps24 => 24.0,
            FrameRate::Fps25 => 25.0,
            FrameRate::Fps2997 => 30000.0 / 1001.0,
            FrameRate::Fps30 => 30.0,
        }
    }

    pub const fn is_drop_frame(self) -> bool {
        matches!(self, FrameRate::Fps2997)
    }

    /// MTC/Art-Net 2-bit rate code: 0=24(.98) 1=25 2=29.97df 3=30.
    pub const fn rate_code(self) -> u8 {
        match self {
            FrameRate::Fps2398 | FrameRate::Fps24 => 0,
            FrameRate::Fps25 => 1,
            FrameRate::Fps2997 => 2,
            FrameRate::Fps30 => 3,
        }
    }

    /// Inverse of [`Self::rate_code`]. FPS_2398 is never recovered this way
    /// (it is indistinguishable on the wire from FPS_24); callers that need
    /// FPS_2398 must apply a user override on top of this.
    pub const fn from_rate_code(code: u8) -> Option<FrameRate> {
        match code & 0x03 {
            0 => Some(FrameRate::Fps24),
            1 => Some(FrameRate::Fps25),
            2 => Some(FrameRate::Fps2997),
            3 => Some(FrameRate::Fps30),
            _ => None,
        }
    }

    const fn tag(self) -> u8 {
        match self {
            FrameRate::Fps2398 => 0,
            FrameRate::Fps24 => 1,
            FrameRate::Fps25 => 2,
            FrameRate::Fps2997 => 3,
            FrameRate::Fps30 => 4,
        }
    }

    const fn from_tag(tag: u8) -> FrameRate {
        match tag {
            0 => FrameRate::Fps2398,
            1 => FrameRate::Fps24,
            2 => FrameRate::Fps25,
            3 => FrameRate::Fps2997,
            _ => FrameRate::Fps30,
        }
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            FrameRate::Fps2398 => "23.976",
            FrameRate::Fps24 => "24",
            FrameRate::Fps25 => "25",
            FrameRate::Fps2997 => "29.97df",
            FrameRate::Fps30 => "30",
        };
        write!(f, "{s}")
    }
}

/// Lock-free cross-thread publication of a [`FrameRate`], backed by a single
/// atomic byte.
#[derive(Debug)]
pub struct AtomicFrameRate(AtomicU8);

impl Default for AtomicFrameRate {
    fn default() -> Self {
        Self::new(FrameRate::Fps25)
    }
}

impl AtomicFrameRate {
    pub fn new(fps: FrameRate) -> Self {
        Self(AtomicU8::new(fps.tag()))
    }

    pub fn load(&self, order: Ordering) -> FrameRate {
        FrameRate::from_tag(self.0.load(order))
    }

    pub fn store(&self, fps: FrameRate, order: Ordering) {
        self.0.store(fps.tag(), order);
    }
}

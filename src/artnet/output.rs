use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::timecode::{AtomicFrameRate, AtomicTimecode, FrameRate, Timecode};

use super::packet::{build_packet, ARTNET_PORT};

/// Where an [`ArtnetOutput`] broadcasts to: a specific interface's directed
/// broadcast address, or the universal `255.255.255.255`.
#[derive(Debug, Clone, Copy)]
pub enum ArtnetBroadcast {
    Directed(Ipv4Addr),
    All,
}

impl ArtnetBroadcast {
    fn addr(self) -> Ipv4Addr {
        match self {
            ArtnetBroadcast::Directed(ip) => ip,
            ArtnetBroadcast::All => Ipv4Addr::BROADCAST,
        }
    }
}

/// Drift-free frame-rate timer that builds Art-Net Timecode packets. Holds
/// its own atomic pending target, same shape as [`crate::mtc::MtcOutput`]:
/// the orchestration thread calls [`Self::set_pending`], and this handler's
/// own transmit timer calls [`Self::tick`].
pub struct ArtnetOutput {
    pending_tc: AtomicTimecode,
    pending_fps: AtomicFrameRate,
    last_send_ms: Mutex<Option<f64>>,
    paused: AtomicBool,
}

impl Default for ArtnetOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtnetOutput {
    pub fn new() -> Self {
        Self {
            pending_tc: AtomicTimecode::new(Timecode::zero()),
            pending_fps: AtomicFrameRate::default(),
            last_send_ms: Mutex::new(None),
            paused: AtomicBool::new(true),
        }
    }

    pub fn set_pending(&self, tc: Timecode, fps: FrameRate) {
        self.pending_tc.store(tc, Ordering::Relaxed);
        self.pending_fps.store(fps, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self, now_ms: f64) {
        self.paused.store(false, Ordering::Relaxed);
        *self.last_send_ms.lock().expect("artnet output lock poisoned") = Some(now_ms);
    }

    /// Advances to `now_ms`; returns the packet to send, if a frame period
    /// has elapsed since the last send.
    pub fn tick(&self, now_ms: f64) -> Option<[u8; 19]> {
        if self.paused.load(Ordering::Relaxed) {
            return None;
        }
        let fps = self.pending_fps.load(Ordering::Relaxed);
        let mut last_send_ms = self.last_send_ms.lock().expect("artnet output lock poisoned");
        let last = *last_send_ms.get_or_insert(now_ms);
        let interval = 1000.0 / fps.frames_per_second_real();
        if now_ms - last >= interval {
            *last_send_ms = Some(last + interval);
            let tc = self.pending_tc.load(Ordering::Relaxed);
            return Some(build_packet(tc, fps));
        }
        None
    }

    /// Sends `packet` to the configured broadcast destination.
    pub fn send(socket: &UdpSocket, broadcast: ArtnetBroadcast, packet: &[u8; 19]) -> std::io::Result<usize> {
        socket.send_to(packet, SocketAddrV4::new(broadcast.addr(), ARTNET_PORT))
    }
}

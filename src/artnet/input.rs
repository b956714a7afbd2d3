use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::logger::{log, LogContext, LogKind};
use crate::timecode::{now_ms, AtomicFrameRate, AtomicTimecode, FrameRate, Timecode, SOURCE_TIMEOUT_MS};

use super::packet::{has_reserved_bits_set, parse_packet, ARTNET_PORT};

const RECV_TIMEOUT_MS: u64 = 100;

/// UDP listener for Art-Net Timecode packets. Owns no thread itself: callers
/// bind a socket with [`ArtnetInput::bind`] and drive [`ArtnetInput::run`] on
/// whatever thread they please (per the one-receive-thread-per-input model).
pub struct ArtnetInput {
    tc: AtomicTimecode,
    fps: AtomicFrameRate,
    last_packet_ms: AtomicU64,
    /// Raised if binding to the requested interface failed and the listener
    /// fell back to `0.0.0.0`.
    interface_bind_failed: AtomicBool,
}

impl Default for ArtnetInput {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtnetInput {
    pub fn new() -> Self {
        Self {
            tc: AtomicTimecode::new(Timecode::zero()),
            fps: AtomicFrameRate::default(),
            last_packet_ms: AtomicU64::new(0),
            interface_bind_failed: AtomicBool::new(false),
        }
    }

    /// Binds to `interface_ip:6454`, falling back to `0.0.0.0:6454` (and
    /// raising [`Self::interface_bind_failed`]) if that fails.
    pub fn bind(&self, interface_ip: Option<Ipv4Addr>) -> std::io::Result<UdpSocket> {
        if let Some(ip) = interface_ip {
            match UdpSocket::bind(SocketAddrV4::new(ip, ARTNET_PORT)) {
                Ok(socket) => return Ok(socket),
                Err(err) => {
                    self.interface_bind_failed.store(true, Ordering::Relaxed);
                    log(
                        format!("interface bind to {ip} failed ({err}), falling back to 0.0.0.0"),
                        LogContext::Artnet,
                        LogKind::Error,
                    );
                }
            }
        }
        UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, ARTNET_PORT))
    }

    pub fn interface_bind_failed(&self) -> bool {
        self.interface_bind_failed.load(Ordering::Relaxed)
    }

    /// Parses and, if valid, publishes `buf` as the new sync point. Returns
    /// `true` on a successful publish.
    pub fn ingest(&self, buf: &[u8]) -> bool {
        if has_reserved_bits_set(buf) {
            log("reserved bits set in type byte".to_string(), LogContext::Artnet, LogKind::Debug);
        }
        let Some((tc, fps)) = parse_packet(buf) else {
            return false;
        };
        self.tc.store(tc, Ordering::Release);
        self.fps.store(fps, Ordering::Release);
        self.last_packet_ms.store(now_ms(), Ordering::Release);
        true
    }

    pub fn is_receiving(&self) -> bool {
        let last = self.last_packet_ms.load(Ordering::Acquire);
        last != 0 && now_ms().saturating_sub(last) < SOURCE_TIMEOUT_MS
    }

    pub fn current(&self) -> (Timecode, FrameRate) {
        (self.tc.load(Ordering::Acquire), self.fps.load(Ordering::Acquire))
    }

    /// Blocking receive loop: reads with a 100ms timeout so `shutdown` can be
    /// observed promptly, and ingests every datagram that arrives.
    pub fn run(&self, socket: &UdpSocket, shutdown: &AtomicBool) {
        let _ = socket.set_read_timeout(Some(Duration::from_millis(RECV_TIMEOUT_MS)));
        let mut buf = [0u8; 512];
        while !shutdown.load(Ordering::Acquire) {
            match socket.recv_from(&mut buf) {
                Ok((amt, _src)) => {
                    self.ingest(&buf[..amt]);
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut => {}
                Err(err) => {
                    log(format!("recv error: {err}"), LogContext::Artnet, LogKind::Error);
                }
            }
        }
    }
}

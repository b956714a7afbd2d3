use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Single-producer/single-consumer lock-free ring buffer of `f32` samples.
/// One slot is always kept empty so `writePos == readPos` unambiguously means
/// empty (full is `(writePos + 1) & mask == readPos`); size must be a power
/// of two so indexing is `pos & mask` instead of `pos % capacity`.
///
/// Safety: exactly one thread may call the push methods and exactly one
/// (possibly different) thread may call the pop methods. The struct itself
/// does not enforce this split — see the audio passthru wiring, which hands
/// out a single `Arc<RingBuffer>` to exactly one producer callback and one
/// consumer callback.
pub struct RingBuffer {
    data: Box<[UnsafeCell<f32>]>,
    mask: u32,
    write_pos: AtomicU32,
    read_pos: AtomicU32,
    overruns: AtomicU64,
    underruns: AtomicU64,
}

unsafe impl Sync for RingBuffer {}

pub const RING_CAPACITY: u32 = 32768;

impl RingBuffer {
    pub fn new(capacity: u32) -> Self {
        assert!(capacity.is_power_of_two(), "ring buffer capacity must be a power of two");
        let data = (0..capacity).map(|_| UnsafeCell::new(0.0f32)).collect::<Vec<_>>().into_boxed_slice();
        Self {
            data,
            mask: capacity - 1,
            write_pos: AtomicU32::new(0),
            read_pos: AtomicU32::new(0),
            overruns: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    fn capacity(&self) -> u32 {
        self.mask + 1
    }

    /// Samples currently buffered and unread.
    pub fn len(&self) -> u32 {
        let w = self.write_pos.load(Ordering::Acquire);
        let r = self.read_pos.load(Ordering::Acquire);
        w.wrapping_sub(r) & self.mask_for_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // capacity-1 positions are usable (one sentinel slot), so the length
    // computation needs the same mask used for indexing.
    fn mask_for_len(&self) -> u32 {
        self.mask
    }

    /// Producer side: pushes as many samples as fit. Surplus is dropped (not
    /// overwriting unread data) and the overrun counter incremented.
    pub fn push(&self, samples: &[f32]) {
        let w = self.write_pos.load(Ordering::Relaxed);
        let r = self.read_pos.load(Ordering::Acquire);
        let used = w.wrapping_sub(r) & self.mask;
        let free = self.capacity() - 1 - used;

        let to_write = samples.len().min(free as usize);
        if to_write < samples.len() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }

        let mut pos = w;
        for &sample in &samples[..to_write] {
            let idx = (pos & self.mask) as usize;
            unsafe { *self.data[idx].get() = sample };
            pos = pos.wrapping_add(1);
        }
        self.write_pos.store(pos, Ordering::Release);
    }

    /// Consumer side: fills `out` fully. If fewer samples are buffered than
    /// `out.len()`, the remainder is zero-filled and the underrun counter is
    /// incremented — the ring never emits stale data.
    pub fn pop_into(&self, out: &mut [f32]) {
        let w = self.write_pos.load(Ordering::Acquire);
        let r = self.read_pos.load(Ordering::Relaxed);
        let available = w.wrapping_sub(r) & self.mask;

        let to_read = out.len().min(available as usize);
        if to_read < out.len() {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }

        let mut pos = r;
        for slot in out.iter_mut().take(to_read) {
            let idx = (pos & self.mask) as usize;
            *slot = unsafe { *self.data[idx].get() };
            pos = pos.wrapping_add(1);
        }
        for slot in out.iter_mut().skip(to_read) {
            *slot = 0.0;
        }
        self.read_pos.store(pos, Ordering::Release);
    }

    /// Discards buffered audio by snapping the read pointer to the current
    /// write pointer. Call before (re-)starting the consumer.
    pub fn sync_read_to_write(&self) {
        let w = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(w, Ordering::Release);
    }

    pub fn overrun_count(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_round_trips() {
        let ring = RingBuffer::new(8);
        ring.push(&[1.0, 2.0, 3.0]);
        let mut out = [0.0; 3];
        ring.pop_into(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(ring.overrun_count(), 0);
        assert_eq!(ring.underrun_count(), 0);
    }

    #[test]
    fn underrun_zero_fills_and_counts() {
        let ring = RingBuffer::new(8);
        ring.push(&[1.0, 2.0]);
        let mut out = [0.0; 4];
        ring.pop_into(&mut out);
        assert_eq!(out, [1.0, 2.0, 0.0, 0.0]);
        assert_eq!(ring.underrun_count(), 1);
    }

    #[test]
    fn overrun_drops_surplus_without_overwriting_unread() {
        let ring = RingBuffer::new(4); // 3 usable slots
        ring.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ring.overrun_count(), 1);
        let mut out = [0.0; 3];
        ring.pop_into(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn sync_read_to_write_discards_buffered_audio() {
        let ring = RingBuffer::new(8);
        ring.push(&[1.0, 2.0, 3.0]);
        ring.sync_read_to_write();
        assert_eq!(ring.len(), 0);
        let mut out = [9.0; 2];
        ring.pop_into(&mut out);
        assert_eq!(out, [0.0, 0.0]);
        assert_eq!(ring.underrun_count(), 1);
    }

    #[test]
    fn wraps_around_buffer_boundary() {
        let ring = RingBuffer::new(4); // 3 usable slots
        ring.push(&[1.0, 2.0]);
        let mut out = [0.0; 2];
        ring.pop_into(&mut out);
        ring.push(&[3.0, 4.0, 5.0]);
        let mut out2 = [0.0; 3];
        ring.pop_into(&mut out2);
        assert_eq!(out2, [3.0, 4.0, 5.0]);
    }
}

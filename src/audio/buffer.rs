//! Fixed-capacity circular buffer and the rolling pre-wake buffer built on it.
//!
//! When the buffer is full, new samples **overwrite** the oldest data so that
//! the most-recent `capacity` samples are always available.
//!
//! # Example
//!
//! ```rust
//! use voice_trigger::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // 5 items → capacity 4 → oldest dropped
//! assert_eq!(buf.snapshot(), vec![2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.len(), 4); // snapshot does not consume
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
///
/// ## Overflow behaviour
///
/// When [`push_slice`](Self::push_slice) would exceed `capacity`, the oldest
/// samples are silently overwritten.  The buffer never allocates beyond its
/// initial capacity.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest samples past `capacity`.
    pub fn push_slice(&mut self, data: &[T]) {
        // Only the newest `capacity` items can survive.
        let data = if data.len() > self.capacity {
            &data[data.len() - self.capacity..]
        } else {
            data
        };
        for &item in data {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
    }

    /// Copy the stored samples in chronological order without consuming them.
    pub fn snapshot(&self) -> Vec<T> {
        self.tail(self.len)
    }

    /// Copy the newest `n` samples (or fewer if the buffer holds less) in
    /// chronological order.
    pub fn tail(&self, n: usize) -> Vec<T> {
        let n = n.min(self.len);
        // Oldest valid sample sits `len` slots behind the write position.
        let start = (self.write_pos + self.capacity - n) % self.capacity;
        (0..n)
            .map(|i| self.buf[(start + i) % self.capacity])
            .collect()
    }

    /// Discard all samples and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Stored duration in seconds, assuming `sample_rate` Hz mono.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.len as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// RollingPreBuffer
// ---------------------------------------------------------------------------

/// The most recent N seconds of audio, always fed by the worker and read by
/// wake-detection tasks.
///
/// Every operation takes the lock only for the push/copy/clear itself; callers
/// get owned copies and never hold the lock across transcription.
pub struct RollingPreBuffer {
    inner: Mutex<RingBuffer<f32>>,
    sample_rate: u32,
}

impl RollingPreBuffer {
    /// Create a buffer holding `seconds × sample_rate` samples.
    pub fn new(seconds: f32, sample_rate: u32) -> Self {
        let capacity = crate::config::settings::secs_to_samples(seconds, sample_rate).max(1);
        Self {
            inner: Mutex::new(RingBuffer::new(capacity)),
            sample_rate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingBuffer<f32>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, samples: &[f32]) {
        self.lock().push_slice(samples);
    }

    pub fn snapshot(&self) -> Vec<f32> {
        self.lock().snapshot()
    }

    /// Copy of the newest `n` samples (fewer if the buffer holds less).
    pub fn tail(&self, n: usize) -> Vec<f32> {
        self.lock().tail(n)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    // ---- RingBuffer --------------------------------------------------------

    #[test]
    fn push_within_capacity() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_full());
        assert_eq!(buf.snapshot(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn overflow_by_one_drops_oldest() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.snapshot(), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn oversized_push_keeps_newest() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(buf.snapshot(), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn overflow_across_separate_calls() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);
        buf.push_slice(&[4.0, 5.0]);
        assert_eq!(buf.snapshot(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn tail_returns_newest_in_order() {
        let mut buf = RingBuffer::new(5);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buf.tail(2), vec![5.0, 6.0]);
        assert_eq!(buf.tail(10), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(buf.tail(0).is_empty());
    }

    #[test]
    fn snapshot_does_not_consume() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0]);
        let _ = buf.snapshot();
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn clear_resets_state() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);
        buf.clear();
        assert!(buf.is_empty());

        buf.push_slice(&[9.0_f32]);
        assert_eq!(buf.snapshot(), vec![9.0]);
    }

    #[test]
    fn duration_secs_calculation() {
        let mut buf = RingBuffer::new(16_000);
        buf.push_slice(&vec![0.0_f32; 8_000]);
        assert!((buf.duration_secs(16_000) - 0.5).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<f32> = RingBuffer::new(0);
    }

    // ---- RollingPreBuffer --------------------------------------------------

    #[test]
    fn rolling_capacity_is_seconds_times_rate() {
        let pre = RollingPreBuffer::new(3.0, 16_000);
        assert_eq!(pre.capacity(), 48_000);
        assert_eq!(pre.sample_rate(), 16_000);
    }

    #[test]
    fn rolling_keeps_last_seconds() {
        let pre = RollingPreBuffer::new(1.0, 4);
        pre.push(&[1.0, 2.0, 3.0]);
        pre.push(&[4.0, 5.0, 6.0]);
        assert_eq!(pre.snapshot(), vec![3.0, 4.0, 5.0, 6.0]);
        pre.clear();
        assert!(pre.is_empty());
    }

    #[test]
    fn rolling_is_shared_across_threads() {
        let pre = Arc::new(RollingPreBuffer::new(1.0, 1_000));
        let writer = Arc::clone(&pre);
        std::thread::spawn(move || writer.push(&[0.5; 100]))
            .join()
            .expect("writer thread");
        assert_eq!(pre.len(), 100);
    }
}

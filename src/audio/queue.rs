//! Bounded capture → worker hand-off.
//!
//! [`FrameQueue`] sits between the real-time capture context and the
//! pipeline worker.  The producer side never blocks: when the queue is full
//! the oldest unread frame is evicted and the overrun is logged.  The
//! consumer awaits [`FrameQueue::pop`] and receives items in strict arrival
//! order, ending with [`QueueItem::Stop`] once the queue has been closed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use tokio::sync::Notify;

use super::AudioFrame;

/// An element of the queue: a frame or the shutdown sentinel.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Frame(AudioFrame),
    Stop,
}

/// Lock-free bounded FIFO with drop-oldest overflow.
pub struct FrameQueue {
    items: ArrayQueue<QueueItem>,
    notify: Notify,
    closed: AtomicBool,
    overruns: AtomicU64,
}

impl FrameQueue {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FrameQueue capacity must be > 0");
        Self {
            items: ArrayQueue::new(capacity),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            overruns: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame without blocking.  Returns `false` when a queued frame
    /// had to be dropped to make room, or when the queue is already closed.
    pub fn push(&self, frame: AudioFrame) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let accepted = match self.items.force_push(QueueItem::Frame(frame)) {
            None => true,
            Some(QueueItem::Stop) => {
                // Never lose the sentinel to an overrun.
                let _ = self.items.force_push(QueueItem::Stop);
                false
            }
            Some(QueueItem::Frame(_)) => {
                let total = self.overruns.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("queue: overrun, dropped oldest frame ({total} dropped so far)");
                false
            }
        };
        self.notify.notify_one();
        accepted
    }

    /// Signal graceful shutdown.  Frames already queued are still delivered,
    /// followed by [`QueueItem::Stop`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.items.force_push(QueueItem::Stop);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait for the next item.
    pub async fn pop(&self) -> QueueItem {
        loop {
            if let Some(item) = self.items.pop() {
                return item;
            }
            if self.closed.load(Ordering::Acquire) {
                return QueueItem::Stop;
            }
            self.notify.notified().await;
        }
    }

    /// Drop every queued frame, keeping a pending stop sentinel.  Returns the
    /// number of frames dropped.
    pub fn clear_frames(&self) -> usize {
        let mut dropped = 0;
        let mut saw_stop = false;
        while let Some(item) = self.items.pop() {
            match item {
                QueueItem::Frame(_) => dropped += 1,
                QueueItem::Stop => saw_stop = true,
            }
        }
        if saw_stop {
            let _ = self.items.force_push(QueueItem::Stop);
            self.notify.notify_one();
        }
        dropped
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Total frames dropped because the consumer fell behind.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    fn frame(value: f32) -> AudioFrame {
        AudioFrame::new(vec![value; 4], 16_000, Instant::now())
    }

    fn value_of(item: QueueItem) -> Option<f32> {
        match item {
            QueueItem::Frame(f) => Some(f.samples()[0]),
            QueueItem::Stop => None,
        }
    }

    #[tokio::test]
    async fn delivers_in_arrival_order() {
        let q = FrameQueue::new(4);
        assert!(q.push(frame(1.0)));
        assert!(q.push(frame(2.0)));
        assert!(q.push(frame(3.0)));

        assert_eq!(value_of(q.pop().await), Some(1.0));
        assert_eq!(value_of(q.pop().await), Some(2.0));
        assert_eq!(value_of(q.pop().await), Some(3.0));
    }

    #[tokio::test]
    async fn overflow_drops_oldest_frame() {
        let q = FrameQueue::new(2);
        q.push(frame(1.0));
        q.push(frame(2.0));
        assert!(!q.push(frame(3.0)));

        assert_eq!(q.overruns(), 1);
        assert_eq!(q.len(), 2);
        assert_eq!(value_of(q.pop().await), Some(2.0));
        assert_eq!(value_of(q.pop().await), Some(3.0));
    }

    #[tokio::test]
    async fn close_delivers_pending_frames_then_stop() {
        let q = FrameQueue::new(4);
        q.push(frame(1.0));
        q.close();

        assert!(q.is_closed());
        assert!(!q.push(frame(2.0)));
        assert_eq!(value_of(q.pop().await), Some(1.0));
        assert!(matches!(q.pop().await, QueueItem::Stop));
        // Stays stopped.
        assert!(matches!(q.pop().await, QueueItem::Stop));
    }

    #[tokio::test]
    async fn pop_wakes_on_push_from_another_thread() {
        let q = Arc::new(FrameQueue::new(4));
        let producer = Arc::clone(&q);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            producer.push(frame(7.0));
        });

        assert_eq!(value_of(q.pop().await), Some(7.0));
        handle.join().expect("producer thread");
    }

    #[test]
    fn clear_frames_keeps_stop() {
        let q = FrameQueue::new(4);
        q.push(frame(1.0));
        q.push(frame(2.0));
        q.close();

        assert_eq!(q.clear_frames(), 2);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn clear_frames_on_open_queue_empties_it() {
        let q = FrameQueue::new(4);
        q.push(frame(1.0));
        assert_eq!(q.clear_frames(), 1);
        assert!(q.is_empty());
    }

    #[test]
    #[should_panic(expected = "FrameQueue capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = FrameQueue::new(0);
    }
}

//! Pooled producer/consumer frame hand-off.
//!
//! [`FrameQueue`] moves frames from one producer thread to one consumer
//! thread with bounded latency and zero steady-state allocation. The pool
//! and the ready queue are lock-free ([`crossbeam_queue::ArrayQueue`]); the
//! underlying structures tolerate more callers, but the contract documented
//! and tested here is single-producer/single-consumer.
//!
//! Backpressure is drop-oldest: a full ready queue evicts its oldest frames
//! back to the pool rather than blocking the producer. The consumer side
//! mirrors this with [`try_drop_and_dequeue_last`], which discards backlog
//! and delivers only the freshest frame.
//!
//! [`try_drop_and_dequeue_last`]: FrameQueue::try_drop_and_dequeue_last

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;

use crate::buffer::BitmapBuffer;
use crate::geometry::BitmapInfo;
use crate::view::BitmapView;

/// Bounded, pooled frame hand-off between one producer and one consumer.
pub struct FrameQueue {
    info: BitmapInfo,
    capacity: usize,
    pool: ArrayQueue<BitmapBuffer>,
    ready: ArrayQueue<BitmapBuffer>,
    /// Enqueue timestamps for the rolling frame-rate window. Stats only —
    /// uncontended under the SPSC contract, so a mutex is fine here.
    stamps: Mutex<VecDeque<Instant>>,
}

impl FrameQueue {
    /// Default ready-queue capacity.
    pub const DEFAULT_CAPACITY: usize = 3;

    /// Create a queue for frames of the given geometry with the default
    /// capacity.
    pub fn new(info: BitmapInfo) -> Self {
        Self::with_capacity(info, Self::DEFAULT_CAPACITY)
    }

    /// Create a queue with an explicit ready-queue capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(info: BitmapInfo, capacity: usize) -> Self {
        assert!(capacity > 0, "frame queue capacity must be at least 1");
        Self {
            info,
            capacity,
            // One extra pool slot for the buffer in flight between pop,
            // copy, and push.
            pool: ArrayQueue::new(capacity + 1),
            ready: ArrayQueue::new(capacity),
            stamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Frame geometry this queue carries.
    #[inline]
    pub fn info(&self) -> BitmapInfo {
        self.info
    }

    /// Ready-queue capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently waiting for the consumer.
    #[inline]
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Whether no frames are waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Copy `frame` into a pooled buffer and queue it for the consumer.
    ///
    /// The producer's own buffer is never retained. When the ready queue is
    /// full, the oldest entries are evicted back to the pool first —
    /// drop-oldest backpressure, never blocking.
    ///
    /// # Panics
    ///
    /// Panics if `frame`'s geometry does not match the queue's — a caller
    /// contract violation, not a runtime condition.
    pub fn try_enqueue(&self, frame: &BitmapView<'_>) {
        assert!(
            frame.info().same_geometry(&self.info),
            "frame geometry does not match the queue"
        );
        let mut buf = self
            .pool
            .pop()
            .unwrap_or_else(|| BitmapBuffer::new(self.info));
        {
            // Strides may differ between the frame and the pooled buffer;
            // copy packed rows.
            let mut dst = buf.as_view_mut();
            for y in 0..frame.height() {
                dst.row_raw_mut(y).copy_from_slice(frame.row_raw(y));
            }
        }
        self.stamp();

        let mut pending = buf;
        loop {
            match self.ready.push(pending) {
                Ok(()) => break,
                Err(rejected) => {
                    if let Some(oldest) = self.ready.pop() {
                        log::trace!("frame queue full; evicting oldest frame");
                        let _ = self.pool.push(oldest);
                    }
                    pending = rejected;
                }
            }
        }
    }

    /// Discard all but the most recent frame, then hand that frame to
    /// `reader`. Returns `None` when no frame is waiting.
    ///
    /// Skipped frames and the delivered frame all return to the pool —
    /// bounded latency at the cost of completeness.
    pub fn try_drop_and_dequeue_last<R>(
        &self,
        reader: impl FnOnce(&BitmapView<'_>) -> R,
    ) -> Option<R> {
        let mut last = None;
        while let Some(buf) = self.ready.pop() {
            if let Some(stale) = last.replace(buf) {
                let _ = self.pool.push(stale);
            }
        }
        let buf = last?;
        let result = reader(&buf.as_view());
        let _ = self.pool.push(buf);
        Some(result)
    }

    /// Rolling count of frames enqueued within the last second.
    pub fn frame_rate(&self) -> usize {
        let mut stamps = self.stamps.lock().expect("frame-rate mutex poisoned");
        Self::prune(&mut stamps, Instant::now());
        stamps.len()
    }

    fn stamp(&self) {
        let mut stamps = self.stamps.lock().expect("frame-rate mutex poisoned");
        let now = Instant::now();
        Self::prune(&mut stamps, now);
        stamps.push_back(now);
    }

    fn prune(stamps: &mut VecDeque<Instant>, now: Instant) {
        while stamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= Duration::from_secs(1))
        {
            stamps.pop_front();
        }
    }
}

impl core::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "FrameQueue({}x{}, {:?}, {}/{} ready)",
            self.info.width(),
            self.info.height(),
            self.info.format(),
            self.ready.len(),
            self.capacity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PixelFormat;

    fn frame_info() -> BitmapInfo {
        BitmapInfo::new(8, 8, PixelFormat::Gray8)
    }

    fn frame(value: u8) -> BitmapBuffer {
        let mut buf = BitmapBuffer::new(frame_info());
        buf.as_view_mut().fill(&[value]).unwrap();
        buf
    }

    fn first_byte(view: &BitmapView<'_>) -> u8 {
        view.pixel::<u8>(0, 0).unwrap()
    }

    // --- bounds and eviction ---

    #[test]
    fn ready_length_never_exceeds_capacity() {
        let queue = FrameQueue::new(frame_info());
        for i in 0..10u8 {
            queue.try_enqueue(&frame(i).as_view());
            assert!(queue.ready_len() <= queue.capacity());
        }
        assert_eq!(queue.ready_len(), FrameQueue::DEFAULT_CAPACITY);
    }

    #[test]
    fn dequeue_last_yields_freshest_frame() {
        let queue = FrameQueue::with_capacity(frame_info(), 3);
        for i in 0..10u8 {
            queue.try_enqueue(&frame(i).as_view());
        }
        let seen = queue.try_drop_and_dequeue_last(first_byte);
        assert_eq!(seen, Some(9));
        assert!(queue.is_empty(), "backlog must be discarded");
    }

    #[test]
    fn dequeue_on_empty_queue_is_none() {
        let queue = FrameQueue::new(frame_info());
        assert_eq!(queue.try_drop_and_dequeue_last(first_byte), None);
        queue.try_enqueue(&frame(1).as_view());
        assert_eq!(queue.try_drop_and_dequeue_last(first_byte), Some(1));
        assert_eq!(queue.try_drop_and_dequeue_last(first_byte), None);
    }

    #[test]
    fn producer_buffer_is_never_retained() {
        let queue = FrameQueue::new(frame_info());
        let mut producer = frame(7);
        queue.try_enqueue(&producer.as_view());
        // Mutating the producer's buffer afterwards must not affect the
        // queued copy.
        producer.as_view_mut().fill(&[0]).unwrap();
        assert_eq!(queue.try_drop_and_dequeue_last(first_byte), Some(7));
    }

    #[test]
    fn enqueue_accepts_differing_stride() {
        let queue = FrameQueue::new(frame_info());
        let padded = BitmapInfo::with_stride(8, 8, PixelFormat::Gray8, 16).unwrap();
        let data = vec![3u8; padded.byte_size()];
        let view = BitmapView::new(&data, padded).unwrap();
        queue.try_enqueue(&view);
        assert_eq!(queue.try_drop_and_dequeue_last(first_byte), Some(3));
    }

    #[test]
    #[should_panic(expected = "geometry does not match")]
    fn mismatched_geometry_panics() {
        let queue = FrameQueue::new(frame_info());
        let other = BitmapBuffer::new(BitmapInfo::new(4, 4, PixelFormat::Gray8));
        queue.try_enqueue(&other.as_view());
    }

    // --- frame rate ---

    #[test]
    fn frame_rate_counts_recent_enqueues() {
        let queue = FrameQueue::new(frame_info());
        assert_eq!(queue.frame_rate(), 0);
        for i in 0..5u8 {
            queue.try_enqueue(&frame(i).as_view());
        }
        assert_eq!(queue.frame_rate(), 5);
    }

    // --- single producer, single consumer ---

    #[test]
    fn spsc_values_are_monotonic() {
        let queue = FrameQueue::new(frame_info());
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..200u8 {
                    queue.try_enqueue(&frame(i).as_view());
                }
            });
            // Consume concurrently until the final frame arrives. Dropping
            // backlog must never step backwards in time.
            let mut last_seen = 0u8;
            loop {
                if let Some(v) = queue.try_drop_and_dequeue_last(first_byte) {
                    assert!(
                        v >= last_seen,
                        "drop-oldest must never deliver an older frame"
                    );
                    last_seen = v;
                    if v == 199 {
                        break;
                    }
                }
            }
        });
        assert!(queue.is_empty());
    }
}

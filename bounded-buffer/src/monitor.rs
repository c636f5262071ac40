use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::wait::{Deadline, lock, wait_while};
use crate::{Buffer, Error, Result, Slot};

/// A bounded buffer guarded by a single mutex.
///
/// Producers wait on `not_full`, consumers on `not_empty`, and each side wakes
/// the other after mutating the queue.
pub struct BoundedBuffer<T> {
    queue: Mutex<VecDeque<Slot<T>>>,
    // Mirrors `queue.len()`, written under the lock so `size` can skip it.
    len: AtomicUsize,
    capacity: usize,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` elements.
    ///
    /// Storage grows on demand, so any non-zero capacity is accepted.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must not be zero");
        Self {
            queue: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
            capacity,
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Like [`new`](Self::new), but reports a zero capacity as an error.
    pub fn try_new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        Ok(Self::new(capacity))
    }
}

impl<T> Buffer<T> for BoundedBuffer<T> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn size(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn push_slot(&self, slot: Slot<T>, deadline: Deadline) -> Result<(), Slot<T>> {
        let queue = lock(&self.queue);
        let Some(mut queue) = wait_while(&self.not_full, queue, deadline, "producer", |q| {
            q.len() >= self.capacity
        }) else {
            return Err(slot);
        };

        if slot.is_end_of_stream() {
            tracing::debug!(len = queue.len(), "enqueued end-of-stream");
        }
        queue.push_back(slot);
        self.len.store(queue.len(), Ordering::Relaxed);
        drop(queue);

        self.not_empty.notify_all();
        Ok(())
    }

    fn pop_slot(&self, deadline: Deadline) -> Option<Slot<T>> {
        let queue = lock(&self.queue);
        let mut queue = wait_while(&self.not_empty, queue, deadline, "consumer", |q| {
            q.is_empty()
        })?;

        let slot = queue.pop_front().expect("invalid buffer state");
        self.len.store(queue.len(), Ordering::Relaxed);
        drop(queue);

        if slot.is_end_of_stream() {
            tracing::debug!("dequeued end-of-stream");
        }
        self.not_full.notify_all();
        Some(slot)
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_queue() {
        let buf = BoundedBuffer::new(3);
        buf.push('a');
        buf.push_end_of_stream();
        assert_eq!(buf.size(), 2);
        assert_eq!(buf.pop(), Slot::Item('a'));
        assert_eq!(buf.size(), 1);
        assert_eq!(buf.pop(), Slot::EndOfStream);
        assert_eq!(buf.size(), 0);
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let buf = BoundedBuffer::try_new(usize::MAX).unwrap();
        assert_eq!(buf.capacity(), usize::MAX);
        buf.push(7u8);
        assert_eq!(buf.try_push(8), Ok(()));
        assert_eq!(buf.pop(), Slot::Item(7));
        assert_eq!(buf.pop(), Slot::Item(8));
    }

    #[test]
    fn debug_hides_contents() {
        let buf = BoundedBuffer::new(4);
        buf.push(1u8);
        assert_eq!(
            format!("{buf:?}"),
            "BoundedBuffer { capacity: 4, size: 1, .. }"
        );
    }
}

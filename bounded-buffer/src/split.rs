mod ring;

use std::fmt;
use std::sync::{Condvar, Mutex};

use self::ring::Ring;
use crate::wait::{Deadline, lock, wait_while};
use crate::{Buffer, Result, Slot};

/// A bounded buffer with separate producer and consumer locks.
///
/// Producers serialize on `push_lock` and consumers on `pop_lock`, so at most
/// one thread appends and at most one removes at any time. The two sides meet
/// in a single-producer single-consumer [`Ring`] and never hold each other's
/// lock while touching it.
///
/// A push briefly takes `pop_lock` before notifying `not_empty` (and a pop
/// takes `push_lock` before notifying `not_full`). A waiter checks its
/// condition and parks while holding its own lock, so the notification
/// cannot slip in between the two.
pub struct SplitBuffer<T> {
    ring: Ring<T>,
    push_lock: Mutex<()>,
    pop_lock: Mutex<()>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> SplitBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or its slots cannot be allocated.
    pub fn new(capacity: usize) -> Self {
        Self::try_new(capacity).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Like [`new`](Self::new), but reports a bad capacity as an error.
    ///
    /// All slots are allocated up front, so capacities the allocator cannot
    /// satisfy fail with [`Error::CapacityOverflow`](crate::Error::CapacityOverflow).
    pub fn try_new(capacity: usize) -> Result<Self> {
        Ok(Self {
            ring: Ring::new(capacity)?,
            push_lock: Mutex::new(()),
            pop_lock: Mutex::new(()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }
}

impl<T> Buffer<T> for SplitBuffer<T> {
    fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    fn size(&self) -> usize {
        self.ring.len()
    }

    fn push_slot(&self, slot: Slot<T>, deadline: Deadline) -> Result<(), Slot<T>> {
        let guard = lock(&self.push_lock);
        let Some(guard) = wait_while(&self.not_full, guard, deadline, "producer", |_| {
            self.ring.is_full()
        }) else {
            return Err(slot);
        };

        if slot.is_end_of_stream() {
            tracing::debug!(len = self.ring.len(), "enqueued end-of-stream");
        }
        // SAFETY: `push_lock` is held, so this is the only enqueuing thread.
        let pushed = unsafe { self.ring.enqueue(slot) };
        assert!(pushed.is_ok(), "invalid buffer state");
        drop(guard);

        let _guard = lock(&self.pop_lock);
        self.not_empty.notify_all();
        Ok(())
    }

    fn pop_slot(&self, deadline: Deadline) -> Option<Slot<T>> {
        let guard = lock(&self.pop_lock);
        let guard = wait_while(&self.not_empty, guard, deadline, "consumer", |_| {
            self.ring.is_empty()
        })?;

        // SAFETY: `pop_lock` is held, so this is the only dequeuing thread.
        let slot = unsafe { self.ring.dequeue() }.expect("invalid buffer state");
        drop(guard);

        if slot.is_end_of_stream() {
            tracing::debug!("dequeued end-of-stream");
        }
        let _guard = lock(&self.push_lock);
        self.not_full.notify_all();
        Some(slot)
    }
}

impl<T> fmt::Debug for SplitBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitBuffer")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::time::Duration;

    // A producer refilling the ring must wake a consumer that parked on the
    // empty ring, even though they never share a lock while the ring changes.
    #[test]
    fn cross_notification_wakes_other_side() {
        let buf = SplitBuffer::new(1);
        std::thread::scope(|cx| {
            let consumer = cx.spawn(|| {
                (0..200)
                    .map(|_| buf.pop().into_item().expect("unexpected end-of-stream"))
                    .collect::<Vec<_>>()
            });
            for i in 0..200 {
                buf.push(i);
                if i % 50 == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
            assert_eq!(consumer.join().unwrap(), (0..200).collect::<Vec<_>>());
        });
        assert_eq!(buf.size(), 0);
    }

    #[test]
    fn oversized_capacity_rejected() {
        assert_eq!(
            SplitBuffer::<u8>::try_new(usize::MAX).err(),
            Some(Error::CapacityOverflow)
        );
        assert_eq!(
            SplitBuffer::<u64>::try_new(usize::MAX / 2).err(),
            Some(Error::CapacityOverflow)
        );
    }

    #[test]
    #[should_panic(expected = "too large to allocate")]
    fn oversized_capacity_panics() {
        _ = SplitBuffer::<u8>::new(usize::MAX);
    }
}

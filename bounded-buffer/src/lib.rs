//! Fixed-capacity blocking FIFO buffers shared by any number of producer and
//! consumer threads.
//!
//! Producers block while the buffer is full and consumers block while it is
//! empty. Besides payloads, a buffer carries in-band End-of-Stream markers
//! (see [`Slot`]): each marker stops exactly one consumer, so the caller
//! enqueues one marker per consumer it wants to stop.
//!
//! Two implementations of [`Buffer`] are provided:
//!
//! * [`BoundedBuffer`] guards its sequence with one mutex and two condition
//!   variables. Prefer this one.
//! * [`SplitBuffer`] serializes producers and consumers on separate locks with
//!   a lock-free ring in between, trading simplicity for less contention
//!   between the two sides.
//!
//! ```
//! use bounded_buffer::{BoundedBuffer, Buffer, Slot};
//!
//! let buf = BoundedBuffer::new(2);
//! std::thread::scope(|cx| {
//!     let consumer = cx.spawn(|| {
//!         let mut sum = 0;
//!         while let Slot::Item(i) = buf.pop() {
//!             sum += i;
//!         }
//!         sum
//!     });
//!     for i in 1..=10 {
//!         buf.push(i);
//!     }
//!     buf.push_end_of_stream();
//!     assert_eq!(consumer.join().unwrap(), 55);
//! });
//! ```
//!
//! # Caller discipline
//!
//! The buffer cannot tell who a marker is meant for. Pushing payloads after
//! every consumer has stopped strands them, and a consumer that keeps popping
//! after its own marker may swallow a payload or marker meant for someone
//! else. Both are bookkeeping errors on the caller's side.

mod error;
mod monitor;
mod slot;
mod split;
mod wait;


use std::time::Duration;

pub use self::error::{Error, PopError, PushError, Result};
pub use self::monitor::BoundedBuffer;
pub use self::slot::Slot;
pub use self::split::SplitBuffer;
pub use self::wait::Deadline;

/// A bounded, blocking, thread-safe FIFO of [`Slot`]s.
///
/// Implementors provide [`push_slot`](Self::push_slot) and
/// [`pop_slot`](Self::pop_slot); every other operation is derived from them.
pub trait Buffer<T> {
    /// Maximum number of resident elements, End-of-Stream markers included.
    fn capacity(&self) -> usize;

    /// Current occupancy.
    ///
    /// This is a snapshot taken without the exclusion lock. It may already be
    /// stale when it returns and must only be used for diagnostics.
    fn size(&self) -> usize;

    /// Appends `slot` once the buffer has room, or hands it back if `deadline`
    /// passes first. Wakes every parked consumer on success.
    fn push_slot(&self, slot: Slot<T>, deadline: Deadline) -> Result<(), Slot<T>>;

    /// Removes the head once the buffer is non-empty, or returns `None` if
    /// `deadline` passes first. Wakes every parked producer on success.
    fn pop_slot(&self, deadline: Deadline) -> Option<Slot<T>>;

    /// Appends a payload, blocking while the buffer is full.
    fn push(&self, val: T) {
        let pushed = self.push_slot(Slot::Item(val), Deadline::Never);
        assert!(pushed.is_ok(), "invalid buffer state");
    }

    /// Appends an End-of-Stream marker, blocking while the buffer is full.
    fn push_end_of_stream(&self) {
        let pushed = self.push_slot(Slot::EndOfStream, Deadline::Never);
        assert!(pushed.is_ok(), "invalid buffer state");
    }

    /// Removes the head, blocking while the buffer is empty.
    fn pop(&self) -> Slot<T> {
        self.pop_slot(Deadline::Never)
            .expect("invalid buffer state")
    }

    fn try_push(&self, val: T) -> Result<(), PushError<T>> {
        self.push_slot(Slot::Item(val), Deadline::Immediate)
            .map_err(|slot| PushError::Full(into_payload(slot)))
    }

    fn try_push_end_of_stream(&self) -> Result<(), PushError<()>> {
        self.push_slot(Slot::EndOfStream, Deadline::Immediate)
            .map_err(|_| PushError::Full(()))
    }

    fn try_pop(&self) -> Result<Slot<T>, PopError> {
        self.pop_slot(Deadline::Immediate).ok_or(PopError::Empty)
    }

    /// Like [`push`](Self::push), but gives up after `timeout`.
    fn push_timeout(&self, val: T, timeout: Duration) -> Result<(), PushError<T>> {
        self.push_slot(Slot::Item(val), Deadline::after(timeout))
            .map_err(|slot| PushError::Timeout(into_payload(slot)))
    }

    fn push_end_of_stream_timeout(&self, timeout: Duration) -> Result<(), PushError<()>> {
        self.push_slot(Slot::EndOfStream, Deadline::after(timeout))
            .map_err(|_| PushError::Timeout(()))
    }

    /// Like [`pop`](Self::pop), but gives up after `timeout`.
    fn pop_timeout(&self, timeout: Duration) -> Result<Slot<T>, PopError> {
        self.pop_slot(Deadline::after(timeout))
            .ok_or(PopError::Timeout)
    }
}

// A rejected push hands back exactly the slot it was given.
fn into_payload<T>(slot: Slot<T>) -> T {
    slot.into_item().expect("invalid buffer state")
}

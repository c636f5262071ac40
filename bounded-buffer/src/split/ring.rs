use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{Error, Result, Slot};

/// A fixed-size single-producer single-consumer ring.
///
/// `head` and `tail` run over `0..2 * capacity`, which tells a full ring
/// (`tail - head == capacity`) apart from an empty one (`tail == head`)
/// without wasting a slot, for any capacity.
pub(super) struct Ring<T> {
    buf: Box<[UnsafeCell<MaybeUninit<Slot<T>>>]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: A slot is only written by the enqueuing thread before `tail` is
// released past it, and only read by the dequeuing thread after `tail` is
// acquired past it, so no slot is ever accessed from two threads at once.
// Callers of `enqueue`/`dequeue` guarantee one thread per side.
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Allocates a ring of `capacity` slots.
    ///
    /// Fails if `head`/`tail` cannot address `2 * capacity` positions or the
    /// slots cannot be allocated.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if capacity > usize::MAX / 2 {
            return Err(Error::CapacityOverflow);
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| Error::CapacityOverflow)?;
        buf.extend(
            std::iter::repeat_with(|| UnsafeCell::new(MaybeUninit::uninit())).take(capacity),
        );
        Ok(Self {
            buf: buf.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of resident slots, clamped to the capacity since `head` and
    /// `tail` are loaded one after the other.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        self.distance(head, tail).min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        self.distance(head, tail) == self.capacity()
    }

    /// # Safety
    ///
    /// No other thread may call `enqueue` concurrently.
    pub unsafe fn enqueue(&self, val: Slot<T>) -> Result<(), Slot<T>> {
        let tail = self.tail.load(Ordering::Relaxed);
        if self.distance(self.head.load(Ordering::Acquire), tail) == self.capacity() {
            return Err(val);
        }

        // SAFETY: The slot at `tail` is vacant since the ring is not full, and
        // the consumer will not read it until the `Release` store below.
        unsafe { (*self.buf[self.index(tail)].get()).write(val) };
        self.tail.store(self.advance(tail), Ordering::Release);

        Ok(())
    }

    /// # Safety
    ///
    /// No other thread may call `dequeue` concurrently.
    pub unsafe fn dequeue(&self) -> Option<Slot<T>> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `head != tail` and the `Acquire` load above synchronizes with
        // the producer's write, so the slot at `head` is initialized. Advancing
        // `head` afterwards hands it back as vacant.
        let val = unsafe { (*self.buf[self.index(head)].get()).assume_init_read() };
        self.head.store(self.advance(head), Ordering::Release);

        Some(val)
    }

    fn index(&self, pos: usize) -> usize {
        let cap = self.capacity();
        if pos >= cap { pos - cap } else { pos }
    }

    fn advance(&self, pos: usize) -> usize {
        let next = pos + 1;
        if next == 2 * self.capacity() { 0 } else { next }
    }

    fn distance(&self, head: usize, tail: usize) -> usize {
        if tail >= head {
            tail - head
        } else {
            tail + 2 * self.capacity() - head
        }
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            let i = self.index(head);
            // SAFETY: Every slot in `head..tail` holds a value not yet dequeued.
            unsafe { self.buf[i].get_mut().assume_init_drop() };
            head = self.advance(head);
        }
    }
}

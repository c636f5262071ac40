use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long a push or pop may wait for the buffer to become ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deadline {
    /// Wait until ready, however long it takes.
    Never,
    /// Do not wait at all.
    Immediate,
    /// Wait until ready or until this instant has passed.
    At(Instant),
}

impl Deadline {
    /// A deadline `timeout` from now. Saturates to [`Deadline::Never`] if the
    /// instant is not representable.
    pub fn after(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or(Self::Never, Self::At)
    }
}

// Every mutation under a buffer lock is a single push or pop, so a panicking
// holder cannot leave the protected state half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parks on `cv` while `blocked` holds.
///
/// Returns the guard once `blocked` is false, or `None` if `deadline` passes
/// first. The condition is always re-checked after waking, so spurious
/// wake-ups and lost races against other waiters are harmless.
pub(crate) fn wait_while<'a, T>(
    cv: &Condvar,
    mut guard: MutexGuard<'a, T>,
    deadline: Deadline,
    side: &'static str,
    mut blocked: impl FnMut(&mut T) -> bool,
) -> Option<MutexGuard<'a, T>> {
    let mut parked = false;
    loop {
        if !blocked(&mut guard) {
            return Some(guard);
        }
        let timeout = match deadline {
            Deadline::Never => None,
            Deadline::Immediate => return None,
            Deadline::At(at) => {
                let now = Instant::now();
                if now >= at {
                    if parked {
                        tracing::trace!(side, "gave up waiting on buffer");
                    }
                    return None;
                }
                Some(at - now)
            },
        };
        if !parked {
            tracing::trace!(side, ?deadline, "parked on buffer");
            parked = true;
        }
        guard = match timeout {
            None => cv.wait(guard).unwrap_or_else(PoisonError::into_inner),
            Some(timeout) => {
                cv.wait_timeout(guard, timeout)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[test]
    fn immediate_never_parks() {
        let (mutex, cv) = (Mutex::new(0), Condvar::new());
        assert!(wait_while(&cv, lock(&mutex), Deadline::Immediate, "test", |n| *n == 0).is_none());
        assert!(wait_while(&cv, lock(&mutex), Deadline::Immediate, "test", |n| *n != 0).is_some());
    }

    #[test]
    fn expired_deadline_rechecks() {
        let (mutex, cv) = (Mutex::new(1), Condvar::new());
        let past = Deadline::At(Instant::now());
        assert!(wait_while(&cv, lock(&mutex), past, "test", |n| *n == 0).is_some());
        assert!(wait_while(&cv, lock(&mutex), past, "test", |n| *n == 1).is_none());
    }

    #[test]
    fn woken_by_notifier() {
        let (mutex, cv) = (Mutex::new(false), Condvar::new());
        std::thread::scope(|cx| {
            cx.spawn(|| {
                std::thread::sleep(Duration::from_millis(10));
                *lock(&mutex) = true;
                cv.notify_all();
            });
            let guard = wait_while(&cv, lock(&mutex), Deadline::Never, "test", |ready| !*ready);
            assert!(guard.is_some_and(|ready| *ready));
        });
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            lock(&self.0).extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn traced(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer({
                let captured = captured.clone();
                move || captured.clone()
            })
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        String::from_utf8_lossy(&lock(&captured.0)).into_owned()
    }

    #[test]
    fn only_real_waits_are_traced() {
        let (mutex, cv) = (Mutex::new(0), Condvar::new());

        let logs = traced(|| {
            assert!(wait_while(&cv, lock(&mutex), Deadline::Immediate, "test", |n| *n == 0).is_none());
            let past = Deadline::At(Instant::now());
            assert!(wait_while(&cv, lock(&mutex), past, "test", |n| *n == 0).is_none());
        });
        assert!(!logs.contains("parked on buffer"), "{logs}");
        assert!(!logs.contains("gave up"), "{logs}");

        let logs = traced(|| {
            let soon = Deadline::after(Duration::from_millis(5));
            assert!(wait_while(&cv, lock(&mutex), soon, "test", |n| *n == 0).is_none());
        });
        assert!(logs.contains("parked on buffer"), "{logs}");
        assert!(logs.contains("gave up waiting on buffer"), "{logs}");
    }

    #[test]
    fn huge_timeout_saturates() {
        assert_eq!(Deadline::after(Duration::MAX), Deadline::Never);
    }
}

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while constructing a buffer.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Error {
    #[error("buffer capacity must not be zero")]
    ZeroCapacity,
    #[error("buffer capacity is too large to allocate")]
    CapacityOverflow,
}

/// Error returned by the non-blocking and deadline-bounded pushes.
///
/// Both variants hand the rejected value back so the caller can retry or
/// dispose of it.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PushError<T> {
    #[error("push failed, buffer is full")]
    Full(T),
    #[error("push timed out, buffer is still full")]
    Timeout(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(val) | Self::Timeout(val) => val,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PushError<U> {
        match self {
            Self::Full(val) => PushError::Full(f(val)),
            Self::Timeout(val) => PushError::Timeout(f(val)),
        }
    }
}

/// Error returned by the non-blocking and deadline-bounded pops.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PopError {
    #[error("pop failed, buffer is empty")]
    Empty,
    #[error("pop timed out, buffer is still empty")]
    Timeout,
}

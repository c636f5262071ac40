/// An element resident in a buffer: either a payload or an End-of-Stream
/// marker.
///
/// A consumer keeps popping while it receives [`Slot::Item`] and stops at the
/// first [`Slot::EndOfStream`]. Each marker is delivered to exactly one
/// [`pop`](crate::Buffer::pop), so stopping `N` consumers takes `N` markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot<T> {
    Item(T),
    EndOfStream,
}

impl<T> Slot<T> {
    pub fn is_item(&self) -> bool {
        matches!(self, Self::Item(_))
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Returns the payload, or `None` for an End-of-Stream marker.
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(val) => Some(val),
            Self::EndOfStream => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Slot<U> {
        match self {
            Self::Item(val) => Slot::Item(f(val)),
            Self::EndOfStream => Slot::EndOfStream,
        }
    }
}

impl<T> From<T> for Slot<T> {
    fn from(val: T) -> Self {
        Self::Item(val)
    }
}

impl<T> From<Option<T>> for Slot<T> {
    fn from(val: Option<T>) -> Self {
        val.map_or(Self::EndOfStream, Self::Item)
    }
}

impl<T> From<Slot<T>> for Option<T> {
    fn from(slot: Slot<T>) -> Self {
        slot.into_item()
    }
}

//! Atomic counters and identifier newtypes.
use std::sync::atomic::{AtomicU64, Ordering};

/// An incrementing counter for generating unique ids.
///
/// Starts at 1 so that zero is never handed out.
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter.
    pub const fn new() -> Counter {
        Counter(AtomicU64::new(1))
    }

    /// Return the next value.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Counter::new()
    }
}

/// Defines an identifier newtype over `u64`, with its own counter.
///
/// ```
/// aura_common::define_id! {
///     /// Request identifier.
///     pub struct RequestId;
/// }
///
/// let a = RequestId::next();
/// assert!(a < RequestId::next());
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Hash, PartialEq, Eq, Ord, PartialOrd)]
        #[repr(transparent)]
        $vis struct $name(u64);

        impl $name {
            /// Allocates a new, never used identifier.
            $vis fn next() -> $name {
                static COUNTER: $crate::counter::Counter = $crate::counter::Counter::new();
                $name(COUNTER.next())
            }

            /// Wraps an identifier value that was allocated elsewhere.
            $vis const fn from_raw(raw: u64) -> $name {
                $name(raw)
            }

            $vis fn to_u64(self) -> u64 {
                self.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}({:08X})", stringify!($name), self.0)
            }
        }
    };
}

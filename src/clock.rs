//! Global revision clock.
//!
//! A [`RevisionClock`] is a monotonically advancing counter that snapshots the
//! state of every tracked value. Renderers capture [`Revision`]s after each
//! transaction and later ask the clock whether anything changed since then.
//!
//! Every thread has one global clock, returned by [`RevisionClock::global`]
//! and by `Default`. Independent clocks from [`RevisionClock::new`] are for
//! isolating renderers that must not observe each other's writes.
//!
//! The clock is a cheap handle: clones share the same counter. Writers advance
//! it through [`RevisionClock::advance`] or, more commonly, through a
//! [`Tracked`] cell which only advances when the stored value actually changes.
//!
//! ```ignore
//! let clock = RevisionClock::global();
//! let count = Tracked::new(&clock, 0);
//! let seen = clock.current();
//!
//! count.set(0); // unchanged, no advance
//! assert!(clock.is_valid_since(seen));
//!
//! count.set(1);
//! assert!(!clock.is_valid_since(seen));
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A snapshot of the revision clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(pub u64);

impl Revision {
    /// Revision recorded before anything was ever committed.
    pub const NEVER: Revision = Revision(0);
    /// Revision a fresh clock starts at.
    pub const INITIAL: Revision = Revision(1);
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Shared handle to a monotonically increasing revision counter.
#[derive(Clone)]
pub struct RevisionClock {
    current: Rc<Cell<u64>>,
}

thread_local! {
    static GLOBAL_CLOCK: RevisionClock = RevisionClock::new();
}

impl RevisionClock {
    /// A handle to this thread's global clock.
    pub fn global() -> Self {
        GLOBAL_CLOCK.with(RevisionClock::clone)
    }

    /// A fresh clock, independent of the global one.
    pub fn new() -> Self {
        Self::starting_at(Revision::INITIAL)
    }

    /// Create a clock whose current revision is `revision`.
    pub fn starting_at(revision: Revision) -> Self {
        Self {
            current: Rc::new(Cell::new(revision.0)),
        }
    }

    pub fn current(&self) -> Revision {
        Revision(self.current.get())
    }

    /// True iff no tracked state changed since `revision` was captured.
    pub fn is_valid_since(&self, revision: Revision) -> bool {
        self.current.get() <= revision.0
    }

    /// Record a change to tracked state, returning the new revision.
    pub fn advance(&self) -> Revision {
        let next = self.current.get() + 1;
        self.current.set(next);
        Revision(next)
    }

    /// Whether two handles share the same counter.
    pub fn same_clock(&self, other: &RevisionClock) -> bool {
        Rc::ptr_eq(&self.current, &other.current)
    }
}

impl Default for RevisionClock {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for RevisionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionClock")
            .field("current", &self.current())
            .finish()
    }
}

/// A value whose writes advance a [`RevisionClock`].
pub struct Tracked<T> {
    value: RefCell<T>,
    clock: RevisionClock,
}

impl<T> Tracked<T> {
    pub fn new(clock: &RevisionClock, value: T) -> Self {
        Self {
            value: RefCell::new(value),
            clock: clock.clone(),
        }
    }

    /// Borrow the value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    pub fn clock(&self) -> &RevisionClock {
        &self.clock
    }
}

impl<T: Clone> Tracked<T> {
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T: PartialEq> Tracked<T> {
    /// Store `value`, advancing the clock only if it differs from the current one.
    pub fn set(&self, value: T) {
        let mut guard = self.value.borrow_mut();
        if *guard != value {
            *guard = value;
            drop(guard);
            self.clock.advance();
        }
    }
}

impl<T: PartialEq + Clone> Tracked<T> {
    /// Mutate the value in place, advancing the clock only if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut guard = self.value.borrow_mut();
        let old_value = guard.clone();
        f(&mut guard);
        if *guard != old_value {
            drop(guard);
            self.clock.advance();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("value", &self.value.borrow())
            .field("clock", &self.clock)
            .finish()
    }
}

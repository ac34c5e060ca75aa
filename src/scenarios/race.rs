//! Store buffering.
//!
//! ```text
//! left:  x = 1; l = y;
//! right: y = 1; r = x;
//! ```
//!
//! Under sequential consistency one of the two stores comes first in a single
//! global order, so at least one load sees a 1. The only forbidden outcome is
//! `l == 0 && r == 0`, where both loads overtook the other thread's store.
//! CPUs with store buffers (x86 included) produce exactly that unless told not
//! to.

use std::fmt;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::{Acquire, Release, SeqCst};

use crate::cell::{Observed, UnsyncCell};
use crate::harness::Scenario;

/// The values the two loads returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    pub l: i32,
    pub r: i32,
}

impl Pair {
    pub fn is_sequentially_consistent(self) -> bool {
        matches!((self.l, self.r), (0, 1) | (1, 0) | (1, 1))
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l == {} && r == {}", self.l, self.r)
    }
}

/// Plain integers, no synchronization: a data race, so undefined behavior.
pub struct RaceBroken {
    x: UnsyncCell<i32>,
    y: UnsyncCell<i32>,
    l: Observed,
    r: Observed,
}

impl RaceBroken {
    pub fn new() -> Self {
        Self {
            x: UnsyncCell::new(0),
            y: UnsyncCell::new(0),
            l: Observed::new(),
            r: Observed::new(),
        }
    }
}

impl Scenario for RaceBroken {
    type Outcome = Pair;
    const NAME: &'static str = "race-broken";

    fn left(&self) {
        // Safety: none, this data race is the point of the scenario.
        unsafe {
            self.x.store(1);
            self.l.set(self.y.load());
        }
    }

    fn right(&self) {
        // Safety: none, this data race is the point of the scenario.
        unsafe {
            self.y.store(1);
            self.r.set(self.x.load());
        }
    }

    fn outcome(&self) -> Pair {
        Pair {
            l: self.l.get(),
            r: self.r.get(),
        }
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_sequentially_consistent()
    }
}

/// Atomics with `SeqCst`. All four operations take part in one total order
/// that agrees with program order, which rules out `(0, 0)`.
#[derive(Default)]
pub struct RaceAtomic {
    x: AtomicI32,
    y: AtomicI32,
    l: Observed,
    r: Observed,
}

impl RaceAtomic {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scenario for RaceAtomic {
    type Outcome = Pair;
    const NAME: &'static str = "race-atomic";

    fn left(&self) {
        self.x.store(1, SeqCst);
        self.l.set(self.y.load(SeqCst));
    }

    fn right(&self) {
        self.y.store(1, SeqCst);
        self.r.set(self.x.load(SeqCst));
    }

    fn outcome(&self) -> Pair {
        Pair {
            l: self.l.get(),
            r: self.r.get(),
        }
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_sequentially_consistent()
    }
}

/// Atomics with `Release` stores and `Acquire` loads.
///
/// No data race any more, but still broken. Release only orders what comes
/// before the store and Acquire only what comes after the load; a store
/// followed by a load of another variable may still be reordered. Nothing
/// here synchronizes with anything either, since neither load reads from
/// the other thread's store in the `(0, 0)` case. On x86 the store buffer
/// produces it regularly.
#[derive(Default)]
pub struct RaceAcquireRelease {
    x: AtomicI32,
    y: AtomicI32,
    l: Observed,
    r: Observed,
}

impl RaceAcquireRelease {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scenario for RaceAcquireRelease {
    type Outcome = Pair;
    const NAME: &'static str = "race-acquire-release";

    fn left(&self) {
        self.x.store(1, Release);
        self.l.set(self.y.load(Acquire));
    }

    fn right(&self) {
        self.y.store(1, Release);
        self.r.set(self.x.load(Acquire));
    }

    fn outcome(&self) -> Pair {
        Pair {
            l: self.l.get(),
            r: self.r.get(),
        }
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_sequentially_consistent()
    }
}

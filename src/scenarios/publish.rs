//! Message passing.
//!
//! ```text
//! left:  payload = 42; ready = true;
//! right: if ready { seen = payload }
//! ```
//!
//! The reader checks the flag once and does not wait for it. Seeing the flag
//! without the payload is the one invalid outcome.

use std::fmt;
use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::AtomicPtr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::cell::Observed;
use crate::harness::Scenario;

/// The value the writer publishes.
pub const PAYLOAD: i32 = 42;

/// What the reader saw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Read {
    NotReady,
    Ready(i32),
}

impl Read {
    fn from_observed(ready: &Observed, payload: &Observed) -> Read {
        if ready.get() == 1 {
            Read::Ready(payload.get())
        } else {
            Read::NotReady
        }
    }

    pub fn is_consistent(self) -> bool {
        match self {
            Read::NotReady => true,
            Read::Ready(payload) => payload == PAYLOAD,
        }
    }
}

impl fmt::Display for Read {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Read::NotReady => write!(f, "ready == false"),
            Read::Ready(payload) => write!(f, "ready == true && payload == {payload}"),
        }
    }
}

/// Everything `Relaxed`. The flag and the payload are each atomic, but
/// nothing says the payload store becomes visible before the flag store.
/// Strongly ordered CPUs (x86) happen to keep the order anyway, weakly
/// ordered ones (ARM) don't have to.
#[derive(Default)]
pub struct PublishBroken {
    payload: AtomicI32,
    ready: AtomicBool,
    ready_seen: Observed,
    payload_seen: Observed,
}

impl PublishBroken {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scenario for PublishBroken {
    type Outcome = Read;
    const NAME: &'static str = "publish-broken";

    fn left(&self) {
        self.payload.store(PAYLOAD, Relaxed);
        self.ready.store(true, Relaxed);
    }

    fn right(&self) {
        if self.ready.load(Relaxed) {
            self.ready_seen.set(1);
            self.payload_seen.set(self.payload.load(Relaxed));
        }
    }

    fn outcome(&self) -> Read {
        Read::from_observed(&self.ready_seen, &self.payload_seen)
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_consistent()
    }
}

/// The flag stored with `Release` and loaded with `Acquire`. A load that
/// sees `true` synchronizes with the store, so the payload store before it
/// happens-before the payload load after it.
#[derive(Default)]
pub struct PublishAtomic {
    payload: AtomicI32,
    ready: AtomicBool,
    ready_seen: Observed,
    payload_seen: Observed,
}

impl PublishAtomic {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scenario for PublishAtomic {
    type Outcome = Read;
    const NAME: &'static str = "publish-atomic";

    fn left(&self) {
        // The payload itself can stay Relaxed, the flag carries the ordering.
        self.payload.store(PAYLOAD, Relaxed);
        self.ready.store(true, Release);
    }

    fn right(&self) {
        if self.ready.load(Acquire) {
            self.ready_seen.set(1);
            self.payload_seen.set(self.payload.load(Relaxed));
        }
    }

    fn outcome(&self) -> Read {
        Read::from_observed(&self.ready_seen, &self.payload_seen)
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_consistent()
    }
}

/// Publishing a heap allocation through a pointer.
///
/// The flag and the payload are one and the same here: a non-null pointer
/// means "ready". The reader dereferences it, which is only sound because
/// the `Acquire` load synchronizes with the `Release` store that made the
/// pointer visible, and with it the write of the boxed value.
pub struct PublishBox {
    ptr: AtomicPtr<i32>,
    ready_seen: Observed,
    payload_seen: Observed,
}

impl PublishBox {
    pub fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            ready_seen: Observed::new(),
            payload_seen: Observed::new(),
        }
    }
}

impl Default for PublishBox {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for PublishBox {
    type Outcome = Read;
    const NAME: &'static str = "publish-box";

    fn left(&self) {
        let p = Box::into_raw(Box::new(PAYLOAD));
        self.ptr.store(p, Release);
    }

    fn right(&self) {
        let p = self.ptr.load(Acquire);
        if !p.is_null() {
            self.ready_seen.set(1);
            // Safety: p came from Box::into_raw and is freed only in drop.
            self.payload_seen.set(unsafe { *p });
        }
    }

    fn outcome(&self) -> Read {
        Read::from_observed(&self.ready_seen, &self.payload_seen)
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_consistent()
    }
}

impl Drop for PublishBox {
    fn drop(&mut self) {
        let p = *self.ptr.get_mut();
        if !p.is_null() {
            // Safety: exclusive access and p came from Box::into_raw.
            drop(unsafe { Box::from_raw(p) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::run_trials;

    #[test]
    fn classifies_every_read() {
        assert!(Read::NotReady.is_consistent());
        assert!(Read::Ready(PAYLOAD).is_consistent());
        assert!(!Read::Ready(0).is_consistent());
        assert!(!Read::Ready(-1).is_consistent());
    }

    #[test]
    fn display() {
        assert_eq!(Read::NotReady.to_string(), "ready == false");
        assert_eq!(Read::Ready(0).to_string(), "ready == true && payload == 0");
    }

    #[test]
    fn reader_first_sees_nothing() {
        let publish = PublishAtomic::new();
        publish.right();
        publish.left();
        assert_eq!(publish.outcome(), Read::NotReady);
        assert!(publish.is_valid());
    }

    #[test]
    fn writer_first_is_seen() {
        let publish = PublishBox::new();
        publish.left();
        publish.right();
        assert_eq!(publish.outcome(), Read::Ready(PAYLOAD));
    }

    #[test]
    fn acquire_release_never_sees_a_stale_payload() {
        let report = run_trials(PublishAtomic::new, 5_000).unwrap();
        assert_eq!(report.counts(), (0, 5_000));
    }

    #[test]
    fn boxed_payload_is_always_complete() {
        let report = run_trials(PublishBox::new, 5_000).unwrap();
        assert_eq!(report.counts(), (0, 5_000));
    }

    #[test]
    fn broken_terminates() {
        let report = run_trials(PublishBroken::new, 5_000).unwrap();
        assert_eq!(report.total(), 5_000);
        assert!(report.invalid() <= report.total());
        // Relaxed still can't invent values: the payload is 0 or PAYLOAD.
        assert!(report.outcomes().all(|(read, _)| matches!(read, Read::NotReady | Read::Ready(0 | PAYLOAD))));
    }
}

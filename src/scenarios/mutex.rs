//! Lost updates.
//!
//! Both sides run the same critical section `INCREMENTS` times: read the
//! counter, then write back one more. Two threads interleaving between the
//! read and the write both write the same value and one increment is lost.
//! The run is valid only if the counter ends at `2 * INCREMENTS`.

use std::fmt;

use crate::cell::UnsyncCell;
use crate::harness::Scenario;
use crate::sync::Mutex;

/// Critical sections per side and trial.
pub const INCREMENTS: u32 = 1_000;

/// The final value of the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Count(pub u32);

impl Count {
    pub fn is_complete(self) -> bool {
        self.0 == 2 * INCREMENTS
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "counter == {} (expected {})", self.0, 2 * INCREMENTS)
    }
}

/// The critical section with no lock around it.
pub struct MutexBroken {
    counter: UnsyncCell<u32>,
}

impl MutexBroken {
    pub fn new() -> Self {
        Self {
            counter: UnsyncCell::new(0),
        }
    }

    fn increment_all(&self) {
        for _ in 0..INCREMENTS {
            // Safety: none, the other side does the same at the same time.
            unsafe {
                let seen = self.counter.load();
                self.counter.store(seen + 1);
            }
        }
    }
}

impl Scenario for MutexBroken {
    type Outcome = Count;
    const NAME: &'static str = "mutex-broken";

    fn left(&self) {
        self.increment_all();
    }

    fn right(&self) {
        self.increment_all();
    }

    fn outcome(&self) -> Count {
        // Safety: only called after both workers were joined.
        Count(unsafe { self.counter.load() })
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_complete()
    }
}

/// The same critical section, inside the lock.
pub struct MutexAtomic {
    counter: Mutex<u32>,
}

impl MutexAtomic {
    pub fn new() -> Self {
        Self {
            counter: Mutex::new(0),
        }
    }

    fn increment_all(&self) {
        for _ in 0..INCREMENTS {
            let mut guard = self.counter.lock();
            let seen = *guard;
            *guard = seen + 1;
        }
    }
}

impl Scenario for MutexAtomic {
    type Outcome = Count;
    const NAME: &'static str = "mutex-atomic";

    fn left(&self) {
        self.increment_all();
    }

    fn right(&self) {
        self.increment_all();
    }

    fn outcome(&self) -> Count {
        Count(*self.counter.lock())
    }

    fn is_valid(&self) -> bool {
        self.outcome().is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::run_trials;

    #[test]
    fn only_the_full_count_is_valid() {
        for n in 0..=2 * INCREMENTS + 1 {
            assert_eq!(Count(n).is_complete(), n == 2 * INCREMENTS, "{}", Count(n));
        }
    }

    #[test]
    fn display() {
        assert_eq!(Count(1_999).to_string(), "counter == 1999 (expected 2000)");
    }

    #[test]
    fn single_side_is_not_enough() {
        let scenario = MutexAtomic::new();
        scenario.left();
        assert_eq!(scenario.outcome(), Count(INCREMENTS));
        assert!(!scenario.is_valid());
        scenario.right();
        assert!(scenario.is_valid());
    }

    #[test]
    fn locked_never_loses_an_update() {
        let report = run_trials(MutexAtomic::new, 2_000).unwrap();
        assert_eq!(report.counts(), (0, 2_000));
        assert_eq!(report.outcomes().count(), 1);
    }

    #[test]
    fn broken_terminates() {
        let report = run_trials(MutexBroken::new, 2_000).unwrap();
        assert_eq!(report.total(), 2_000);
        assert!(report.invalid() <= report.total());
        // Lost updates only ever make the count smaller.
        assert!(report.outcomes().all(|(count, _)| count.0 <= 2 * INCREMENTS));
    }
}

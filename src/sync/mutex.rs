use atomic_wait::{wait, wake_one};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

// How long a waiter spins before going to the futex.
const SPIN_LIMIT: u32 = 100;

/// Futex based mutex guarding the critical section of the fixed
/// mutex scenario.
///
/// Locking is an `Acquire` compare-exchange and unlocking is a `Release`
/// swap, so everything done inside one critical section happens-before
/// everything done inside the next one. That is the whole fix compared to
/// the broken scenario, which runs the very same read-then-write without it.
pub struct Mutex<T> {
    /// UNLOCKED, LOCKED (nobody waiting) or CONTENDED (someone may sleep).
    state: AtomicU32,
    value: UnsafeCell<T>,
}

unsafe impl<T> Sync for Mutex<T> where T: Send {}

pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

unsafe impl<T> Sync for MutexGuard<'_, T> where T: Sync {}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the guard exists only while the lock is held.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard exists only while the lock is held.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
            value: UnsafeCell::new(value),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed)
            .is_err()
        {
            lock_contended(&self.state);
        }
        MutexGuard { mutex: self }
    }

    // Taking self by value means no guard can be alive.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

#[cold]
fn lock_contended(state: &AtomicU32) {
    let mut spin_count = 0;

    // Plain loads while the holder is busy, they don't take the cache line
    // away from it. Only spin when nobody is asleep yet.
    while state.load(Relaxed) == LOCKED && spin_count < SPIN_LIMIT {
        spin_count += 1;
        std::hint::spin_loop();
    }

    if state
        .compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed)
        .is_ok()
    {
        return;
    }

    // From here on we can't know whether somebody else sleeps too,
    // so the lock is taken as CONTENDED and unlock has to wake.
    while state.swap(CONTENDED, Acquire) != UNLOCKED {
        wait(state, CONTENDED);
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if self.mutex.state.swap(UNLOCKED, Release) == CONTENDED {
            wake_one(&self.mutex.state);
        }
    }
}

#[test]
fn lock_uncontended() {
    let m = Mutex::new(0);
    std::hint::black_box(&m);
    for _ in 0..1_000 {
        *m.lock() += 1;
    }
    assert_eq!(m.into_inner(), 1_000);
}

#[test]
fn lock_contended_counts_every_increment() {
    use std::thread;

    let m = Mutex::new(0u32);
    std::hint::black_box(&m);
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50_000 {
                    // Read and write in separate steps, the lock
                    // is what keeps them together.
                    let mut guard = m.lock();
                    let seen = *guard;
                    *guard = seen + 1;
                }
            });
        }
    });
    assert_eq!(m.into_inner(), 4 * 50_000);
}

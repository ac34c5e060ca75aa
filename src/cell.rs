use std::cell::UnsafeCell;
use std::ptr::{read_volatile, write_volatile};
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering::Relaxed;

/// Value an `Observed` slot holds until a worker writes to it.
pub const UNOBSERVED: i32 = -1;

/// A slot where one worker records the value it saw.
///
/// Only one worker ever writes to a given slot and the harness reads it
/// after joining that worker. The join is what makes the write visible,
/// so every access here is `Relaxed`.
#[derive(Debug)]
pub struct Observed(AtomicI32);

impl Observed {
    pub const fn new() -> Self {
        Self(AtomicI32::new(UNOBSERVED))
    }

    pub fn set(&self, value: i32) {
        self.0.store(value, Relaxed);
    }

    pub fn get(&self) -> i32 {
        self.0.load(Relaxed)
    }
}

impl Default for Observed {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared cell with no synchronization at all.
///
/// This is what the broken scenarios are made of. Concurrent access from two
/// threads where at least one writes is a data race, which is undefined
/// behavior. The accesses are volatile so the compiler keeps every load and
/// store where the source puts them, but that does not make them atomic or
/// ordered.
pub struct UnsyncCell<T> {
    value: UnsafeCell<T>,
}

// Lying to the compiler on purpose: nothing here makes sharing safe.
unsafe impl<T> Sync for UnsyncCell<T> where T: Send {}

impl<T: Copy> UnsyncCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    /// Safety: the caller must make sure no other thread writes
    /// to the cell at the same time. The broken scenarios don't.
    pub unsafe fn load(&self) -> T {
        read_volatile(self.value.get())
    }

    /// Safety: the caller must make sure no other thread accesses
    /// the cell at the same time. The broken scenarios don't.
    pub unsafe fn store(&self, value: T) {
        write_volatile(self.value.get(), value)
    }

    // Exclusive access, so this one is fine.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

#[test]
fn observed_starts_unobserved() {
    let slot = Observed::new();
    assert_eq!(slot.get(), UNOBSERVED);
    slot.set(1);
    assert_eq!(slot.get(), 1);
}

#[test]
fn observed_is_visible_after_join() {
    use std::thread;

    let slot = Observed::default();
    thread::scope(|s| {
        s.spawn(|| slot.set(7));
    });
    assert_eq!(slot.get(), 7);
}

#[test]
fn unsync_cell_single_thread() {
    let cell = UnsyncCell::new(0u32);
    // Safety: only this thread touches the cell.
    unsafe {
        cell.store(cell.load() + 5);
        assert_eq!(cell.load(), 5);
    }
    assert_eq!(cell.into_inner(), 5);
}

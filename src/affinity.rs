//! Pinning the two workers of a trial to two different CPUs.
//!
//! A race between `left` and `right` can only show up when they really run
//! at the same time. Left to the scheduler, both workers of a short trial
//! often end up on the same core one after the other.

use std::io;

/// Two CPUs the current process may run on, one per worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuPair {
    pub left: usize,
    pub right: usize,
}

impl CpuPair {
    /// Picks the first two CPUs from the affinity mask of the calling thread.
    ///
    /// Returns `None` when fewer than two are available, in which case the
    /// broken scenarios will hardly ever misbehave.
    pub fn detect() -> Option<CpuPair> {
        let cpus = allowed_cpus();
        match cpus.as_slice() {
            [left, right, ..] => Some(CpuPair {
                left: *left,
                right: *right,
            }),
            _ => None,
        }
    }
}

#[cfg(target_os = "linux")]
fn allowed_cpus() -> Vec<usize> {
    // Safety: cpu_set_t is plain data and zero is a valid (empty) set.
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    let size = std::mem::size_of::<libc::cpu_set_t>();

    // Pid 0 is the calling thread.
    if unsafe { libc::sched_getaffinity(0, size, &mut set) } != 0 {
        tracing::debug!(error = %io::Error::last_os_error(), "sched_getaffinity failed");
        return Vec::new();
    }

    (0..libc::CPU_SETSIZE as usize)
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn allowed_cpus() -> Vec<usize> {
    // We can't pin here, so report nothing to pin to.
    Vec::new()
}

/// Restricts the calling thread to a single CPU.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> io::Result<()> {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_cpu: usize) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread pinning is only implemented on linux",
    ))
}

#[cfg(target_os = "linux")]
#[test]
fn pin_to_detected_cpu() {
    use std::thread;

    // Single core machines have nothing to detect.
    let Some(pair) = CpuPair::detect() else {
        return;
    };
    assert_ne!(pair.left, pair.right);

    // In a thread of its own so the test runner thread keeps its mask.
    thread::spawn(move || {
        pin_current_thread(pair.right).unwrap();
        assert_eq!(allowed_cpus(), vec![pair.right]);
    })
    .join()
    .unwrap();
}

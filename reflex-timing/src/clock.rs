use std::time::{Duration, Instant};

/// Monotonic time source for reaction measurements
pub trait Clock: Clone + Send + Sync {
    /// Nanoseconds since the clock's origin. Never goes backward.
    fn now(&self) -> u64;

    fn elapsed(&self, since: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since))
    }
}

/// Platform high-resolution monotonic clock
///
/// Reads `CLOCK_MONOTONIC` directly on Linux; elsewhere falls back to
/// [`Instant`], which is monotonic on every supported platform.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
    #[cfg(target_os = "linux")]
    origin_ns: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            #[cfg(target_os = "linux")]
            origin_ns: linux_monotonic_ns().unwrap_or(0),
        }
    }

    #[cfg(target_os = "linux")]
    fn read(&self) -> u64 {
        match linux_monotonic_ns() {
            Some(ns) if self.origin_ns != 0 => ns.saturating_sub(self.origin_ns),
            _ => self.start.elapsed().as_nanos() as u64,
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn read(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        self.read()
    }
}

#[cfg(target_os = "linux")]
fn linux_monotonic_ns() -> Option<u64> {
    use libc::{CLOCK_MONOTONIC, clock_gettime, timespec};

    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { clock_gettime(CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return None;
    }
    Some(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}

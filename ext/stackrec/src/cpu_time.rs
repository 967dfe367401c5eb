//! Per-thread CPU clocks, used by samplers to fill the `cpu-time` value.

use std::mem::MaybeUninit;
use std::time::Duration;

/// A POSIX clock measuring CPU time consumed by one thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuClock {
    clock_id: libc::clockid_t,
}

impl CpuClock {
    /// The CPU clock of the calling thread.
    pub fn current_thread() -> Self {
        CpuClock {
            clock_id: libc::CLOCK_THREAD_CPUTIME_ID,
        }
    }

    /// The CPU clock of another thread. `None` if the thread has exited.
    #[cfg(target_os = "linux")]
    pub fn for_pthread(thread: libc::pthread_t) -> Option<Self> {
        let mut clock_id = MaybeUninit::<libc::clockid_t>::uninit();
        let err = unsafe { libc::pthread_getcpuclockid(thread, clock_id.as_mut_ptr()) };
        if err != 0 {
            log::trace!("pthread_getcpuclockid failed: {}", err);
            return None;
        }
        Some(CpuClock {
            clock_id: unsafe { clock_id.assume_init() },
        })
    }

    pub fn now(&self) -> Option<Duration> {
        let mut ts = MaybeUninit::<libc::timespec>::uninit();
        if unsafe { libc::clock_gettime(self.clock_id, ts.as_mut_ptr()) } != 0 {
            return None;
        }
        let ts = unsafe { ts.assume_init() };
        Some(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
    }
}

/// Turns successive clock readings into per-sample deltas.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuTimeTracker {
    last: Option<Duration>,
}

impl CpuTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nanoseconds since the previous observation. The first observation and
    /// a clock going backwards both yield 0.
    pub fn observe(&mut self, now: Duration) -> u64 {
        let elapsed = match self.last {
            Some(last) => now.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burn_cpu() -> u64 {
        let mut x = 0u64;
        for i in 0..2_000_000u64 {
            x = std::hint::black_box(x.wrapping_add(i ^ (x >> 3)));
        }
        x
    }

    #[test]
    fn test_current_thread_clock_advances() {
        let clock = CpuClock::current_thread();
        let before = clock.now().unwrap();
        burn_cpu();
        let after = clock.now().unwrap();
        assert!(after >= before);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_for_pthread_self() {
        let clock = CpuClock::for_pthread(unsafe { libc::pthread_self() }).unwrap();
        assert!(clock.now().is_some());
    }

    #[test]
    fn test_tracker() {
        let mut tracker = CpuTimeTracker::new();
        assert_eq!(tracker.observe(Duration::from_millis(10)), 0);
        assert_eq!(tracker.observe(Duration::from_millis(15)), 5_000_000);
        assert_eq!(tracker.observe(Duration::from_millis(15)), 0);
        // Backwards.
        assert_eq!(tracker.observe(Duration::from_millis(12)), 0);
        assert_eq!(tracker.observe(Duration::from_millis(13)), 1_000_000);
    }
}

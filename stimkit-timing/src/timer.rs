use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic nanosecond clock shared by frame stamping and input stamping.
pub trait Timer: Clone + Send + Sync {
    /// Nanoseconds since the clock's epoch.
    fn now(&self) -> u64;

    fn elapsed(&self, since_ns: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since_ns))
    }

    fn sleep(&self, d: Duration);
}

/// Wall clock backed by [`Instant`], with a precise sleep where the platform
/// offers one.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Converts an `Instant` taken elsewhere (e.g. an input event) into this
    /// clock's nanosecond timeline.
    pub fn stamp(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.start).as_nanos() as u64
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` is a valid timespec and the remainder pointer may be null.
        let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut()) };
        if rc != 0 {
            tracing::debug!(rc, "clock_nanosleep interrupted, falling back to thread::sleep");
            std::thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }

    pub fn advance(&self, d: Duration) -> u64 {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst)
            + d.as_nanos() as u64
    }

    pub fn advance_ms(&self, ms: u64) -> u64 {
        self.advance(Duration::from_millis(ms))
    }
}

impl Timer for ManualClock {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        assert_eq!(clock.advance_ms(16), 16_000_000);
        other.sleep(Duration::from_millis(4));
        assert_eq!(clock.now(), 20_000_000);
        assert_eq!(clock.elapsed(5_000_000), Duration::from_millis(15));
    }

    #[test]
    fn high_precision_timer_is_monotonic() {
        let timer = HighPrecisionTimer::new();
        let a = timer.now();
        timer.sleep(Duration::from_millis(1));
        let b = timer.now();
        assert!(b > a);
        assert!(timer.elapsed(a) >= Duration::from_millis(1));
    }
}

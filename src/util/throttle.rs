use std::{sync::atomic::{AtomicBool, AtomicU64, Ordering}, time::{Duration, Instant}};

/// Lets an event through at most once per period, from any number of threads
pub(crate) struct Throttle {
    period: Duration,
    origin: Instant,
    /// Nanoseconds since `origin` of the last accepted event, plus one (zero = never)
    last: AtomicU64,
}

impl Throttle {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            origin: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    fn now(&self) -> u64 {
        (self.origin.elapsed().as_nanos() as u64).saturating_add(1)
    }

    /// Should the event happening now be let through?
    pub(crate) fn ready(&self) -> bool {
        let now = self.now();
        let last = self.last.load(Ordering::Acquire);
        if last != 0 && now.saturating_sub(last) < self.period.as_nanos() as u64 {
            return false;
        }
        // Only one racing caller wins
        self.last.compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed).is_ok()
    }
}

/// Lets exactly one event through
#[derive(Default)]
pub(crate) struct Once(AtomicBool);

impl Once {
    pub(crate) fn first(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

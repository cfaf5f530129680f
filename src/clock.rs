//! Time and identity collaborators.
//!
//! The core never reads `Instant::now()` or generates a uuid directly; every
//! place that needs either goes through a `Clock`/`IdGen` obtained from
//! [`crate::subsystem::SubsystemOptions`]. Tests inject fakes to make
//! schedules and identities deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// A monotonic instant, opaque outside this crate's comparisons/arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }

    pub fn checked_add(&self, dur: Duration) -> Option<MonotonicInstant> {
        self.0.checked_add(dur).map(MonotonicInstant)
    }
}

/// Source of monotonic time, injectable so scheduling and PKR expiry are
/// deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> MonotonicInstant;
}

/// Wall-clock backed default, suitable for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> MonotonicInstant {
        MonotonicInstant(Instant::now())
    }
}

/// Source of uuid v4 identities, injectable for reproducible traces in tests.
pub trait IdGen: Send + Sync {
    fn new_uuid_v4(&self) -> Uuid;
}

/// `uuid` crate v4 generator, suitable for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGen;

impl IdGen for RandomIdGen {
    fn new_uuid_v4(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// A `Clock` whose time advances only when told to. Exported (not
/// test-gated) so integration tests outside this crate can force expiry and
/// timeout paths without depending on real elapsed wall time.
pub struct FixedClock {
    base: Instant,
    offset_ms: AtomicU64,
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> MonotonicInstant {
        let off = self.offset_ms.load(Ordering::SeqCst);
        MonotonicInstant(self.base + Duration::from_millis(off))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_monotonically() {
        let clock = FixedClock::new();
        let t0 = clock.now();
        clock.advance(10);
        let t1 = clock.now();
        assert!(t1.duration_since(t0) >= Duration::from_millis(10));
    }

    #[test]
    fn random_id_gen_produces_v4() {
        let gen = RandomIdGen;
        let id = gen.new_uuid_v4();
        assert_eq!(id.get_version_num(), 4);
    }
}

//! Virtual clock for simulated delays.

use crate::timing::Delay;
use std::sync::atomic::{AtomicU64, Ordering};

/// Delays advance a counter instead of sleeping.
#[derive(Debug, Default)]
pub struct SimClock {
    elapsed_us: AtomicU64,
}

impl SimClock {
    /// Virtual microseconds spent in delays.
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us.load(Ordering::Relaxed)
    }

    /// Zero the counter.
    pub fn reset(&self) {
        self.elapsed_us.store(0, Ordering::Relaxed);
    }
}

impl Delay for SimClock {
    fn delay_ms(&self, ms: u32) {
        self.elapsed_us
            .fetch_add(u64::from(ms) * 1000, Ordering::Relaxed);
    }

    fn delay_us(&self, us: u32) {
        self.elapsed_us.fetch_add(u64::from(us), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_accumulate() {
        let clock = SimClock::default();
        clock.delay_ms(3);
        clock.delay_us(7);
        assert_eq!(clock.elapsed_us(), 3007);
        clock.reset();
        assert_eq!(clock.elapsed_us(), 0);
    }
}

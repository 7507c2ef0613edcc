//! Delay primitives used by bring-up and polling loops.
//!
//! Every wait in this crate is a bounded loop of register reads separated by
//! a fixed delay. The delays go through [`Delay`] so the simulated engine can
//! run the same loops on a virtual clock.

use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Millisecond sleep and microsecond busy-wait.
pub trait Delay: Debug + Send + Sync {
    /// Sleep for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);

    /// Busy-wait for `us` microseconds.
    fn delay_us(&self, us: u32);
}

/// Wall-clock delays: `thread::sleep` for milliseconds, spin for microseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }

    fn delay_us(&self, us: u32) {
        let deadline = Instant::now() + Duration::from_micros(u64::from(us));
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_delay_waits_at_least_requested() {
        let start = Instant::now();
        StdDelay.delay_us(200);
        assert!(start.elapsed() >= Duration::from_micros(200));

        let start = Instant::now();
        StdDelay.delay_ms(2);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}

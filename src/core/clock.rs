//! Time sources for the framing engine
//!
//! The engine measures idle time in ticks read from a [`Clock`]. What a
//! tick means is up to the clock:
//!
//! - [`TickClock`] counts poll calls and assumes a nominal poll rate, so
//!   the effective timeout scales with the host's real tick rate.
//! - [`WallClock`] counts milliseconds of monotonic time, so the timeout
//!   holds regardless of how often the host polls.

use chrono::{Local, NaiveTime};
use std::time::{Duration, Instant};

/// Poll rate the default idle timeout is calibrated against
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Tick source consulted once per poll
pub trait Clock: Send {
    /// Advance to the current instant and return the tick count
    fn advance(&mut self) -> u64;

    /// Restart counting from zero
    fn reset(&mut self);

    /// Number of ticks spanning `duration`
    fn ticks_for(&self, duration: Duration) -> u64;

    /// Local wall time used for receive timestamps
    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

impl std::fmt::Debug for dyn Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Clock")
    }
}

/// One tick per poll call at a nominal rate
#[derive(Debug, Clone)]
pub struct TickClock {
    ticks: u64,
    rate_hz: u32,
}

impl TickClock {
    /// Create a tick clock for a host polling at `rate_hz`
    pub fn new(rate_hz: u32) -> Self {
        Self {
            ticks: 0,
            rate_hz: rate_hz.max(1),
        }
    }

    /// Nominal poll rate
    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE_HZ)
    }
}

impl Clock for TickClock {
    fn advance(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    fn reset(&mut self) {
        self.ticks = 0;
    }

    fn ticks_for(&self, duration: Duration) -> u64 {
        // round up so a nonzero timeout never collapses to zero ticks
        let scaled = duration.as_millis() * u128::from(self.rate_hz);
        u64::try_from(scaled.div_ceil(1000)).unwrap_or(u64::MAX)
    }
}

/// Millisecond ticks from a monotonic clock
#[derive(Debug, Clone)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    /// Start counting from now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn advance(&mut self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn reset(&mut self) {
        self.origin = Instant::now();
    }

    fn ticks_for(&self, duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_six_ticks() {
        let clock = TickClock::default();
        assert_eq!(clock.ticks_for(Duration::from_millis(100)), 6);
    }

    #[test]
    fn test_ticks_round_up() {
        let clock = TickClock::new(60);
        assert_eq!(clock.ticks_for(Duration::from_millis(10)), 1);
        assert_eq!(clock.ticks_for(Duration::ZERO), 0);

        let slow = TickClock::new(10);
        assert_eq!(slow.ticks_for(Duration::from_millis(100)), 1);
        assert_eq!(slow.ticks_for(Duration::from_millis(250)), 3);
    }

    #[test]
    fn test_advance_and_reset() {
        let mut clock = TickClock::new(60);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        clock.reset();
        assert_eq!(clock.advance(), 1);
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        assert_eq!(TickClock::new(0).rate_hz(), 1);
    }

    #[test]
    fn test_wall_clock_is_monotonic() {
        let mut clock = WallClock::new();
        let first = clock.advance();
        let second = clock.advance();
        assert!(second >= first);
        assert_eq!(clock.ticks_for(Duration::from_millis(100)), 100);
    }
}

//! Virtual clock for discrete-event simulation.
//!
//! The [`SimClock`] tracks simulation time independently of wall-clock time,
//! advancing only when events are processed. This keeps runs deterministic
//! and repeatable regardless of host machine speed.

use serde::{Deserialize, Serialize};

/// Virtual simulation clock.
///
/// Time is a plain `f64` in seconds; arrival processes and service
/// durations are continuous, so there is no integer tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    current: f64,
}

impl SimClock {
    /// Create a new clock starting at time zero.
    pub fn new() -> Self {
        Self { current: 0.0 }
    }

    /// Create a clock starting at a specific time.
    pub fn starting_at(time: f64) -> Self {
        Self { current: time }
    }

    /// Current simulation time.
    pub fn now(&self) -> f64 {
        self.current
    }

    /// Advance the clock to a specific time.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `time` is in the past.
    pub fn advance_to(&mut self, time: f64) {
        debug_assert!(
            time >= self.current,
            "Cannot move clock backwards: current={}, target={}",
            self.current,
            time,
        );
        self.current = time;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_starts_at_zero() {
        let clock = SimClock::new();
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_starting_at() {
        let clock = SimClock::starting_at(12.5);
        assert_eq!(clock.now(), 12.5);
    }

    #[test]
    fn test_advance_to() {
        let mut clock = SimClock::new();
        clock.advance_to(3.25);
        assert_eq!(clock.now(), 3.25);
        clock.advance_to(3.25);
        assert_eq!(clock.now(), 3.25);
    }

    #[test]
    #[should_panic(expected = "Cannot move clock backwards")]
    fn test_cannot_go_backwards() {
        let mut clock = SimClock::new();
        clock.advance_to(10.0);
        clock.advance_to(5.0);
    }
}

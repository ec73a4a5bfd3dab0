use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::control::SessionControl;

/// Session time source. Everything the engine waits on goes through here.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Let `dur` pass, returning early if `control` is stopped.
    fn sleep(&self, dur: Duration, control: &SessionControl);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, dur: Duration, control: &SessionControl) {
        control.sleep(dur);
    }
}

/// A clock that only moves when slept on. Sleeping returns immediately, so
/// a whole session runs in microseconds while timestamps stay realistic.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now: Arc<Mutex<Duration>>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, dur: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += dur;
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, dur: Duration, control: &SessionControl) {
        if !control.is_stopped() {
            self.advance(dur);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_time_moves_only_on_sleep() {
        let clock = SimulatedClock::new();
        let control = SessionControl::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.sleep(Duration::from_millis(1500), &control);
        assert_eq!(clock.now(), Duration::from_millis(1500));

        let shared = clock.clone();
        shared.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_secs(2));

        control.stop();
        clock.sleep(Duration::from_secs(60), &control);
        assert_eq!(clock.now(), Duration::from_secs(2));
    }
}

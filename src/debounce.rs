//! Trailing-edge debouncing driven by the UI frame loop.

use std::time::{Duration, Instant};

/// Coalesces bursts of events into one, fired after a quiet period following the last event.
#[derive(Clone, Debug)]
pub struct Debouncer {
    delay: Duration,
    last_event: Option<Instant>,
}

impl Debouncer {
    /// Creates a debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_event: None,
        }
    }

    /// Records an event at `now`, restarting the quiet period.
    pub fn trigger(&mut self, now: Instant) {
        self.last_event = Some(now);
    }

    /// Whether an event is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.last_event.is_some()
    }

    /// When the pending event will fire, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_event.map(|t| t + self.delay)
    }

    /// Returns `true` exactly once per burst, as soon as `now` is past the quiet period.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }

    /// Drops any pending event.
    pub fn cancel(&mut self) {
        self.last_event = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(200);

    #[test]
    fn idle_never_fires() {
        let mut debouncer = Debouncer::new(DELAY);
        assert!(!debouncer.poll(Instant::now() + Duration::from_secs(10)));
    }

    #[test]
    fn burst_fires_once_after_last_event() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);

        for ms in [0, 50, 120, 190] {
            let t = start + Duration::from_millis(ms);
            debouncer.trigger(t);
            assert!(!debouncer.poll(t));
        }
        let last = start + Duration::from_millis(190);

        // Still quiet-period relative to the last event, not the first.
        assert!(!debouncer.poll(start + Duration::from_millis(250)));
        assert_eq!(debouncer.deadline(), Some(last + DELAY));
        assert!(debouncer.poll(last + DELAY));
        assert!(!debouncer.poll(last + DELAY * 2));
    }

    #[test]
    fn cancel_drops_pending_event() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.trigger(start);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert!(!debouncer.poll(start + DELAY));
    }
}

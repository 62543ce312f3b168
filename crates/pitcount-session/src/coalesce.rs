//! Collapse bursts of updates into the most recent one.
//!
//! A slider dragged across its range produces many intermediate values;
//! only the last one matters once the user pauses. Time is passed in, so
//! the caller decides where instants come from.

use std::time::Duration;

use web_time::Instant;

/// Holds the latest requested value until the input goes quiet.
#[derive(Debug, Clone)]
pub struct UpdateCoalescer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> UpdateCoalescer<T> {
    /// Quiescence interval used by [`Default`].
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(20);

    /// A coalescer releasing values `delay` after the last request.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// The quiescence interval.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Record `value`, replacing anything pending and restarting the
    /// window at `now`.
    pub fn request(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Whether a value is waiting to be released.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value becomes due, if there is one.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.delay)
    }

    /// Release the pending value if the window has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self
            .deadline()
            .is_some_and(|deadline| now >= deadline);
        if due { self.flush() } else { None }
    }

    /// Release the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

impl<T> Default for UpdateCoalescer<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn nothing_pending_polls_none() {
        let mut c: UpdateCoalescer<u32> = UpdateCoalescer::default();
        assert!(!c.is_pending());
        assert_eq!(c.poll(Instant::now()), None);
    }

    #[test]
    fn burst_yields_last_value_once() {
        let t0 = Instant::now();
        let mut c = UpdateCoalescer::default();
        for i in 0..10_u64 {
            c.request(i, t0 + ms(i));
        }
        // Last request at 9 ms; due at 29 ms.
        assert_eq!(c.poll(t0 + ms(28)), None);
        assert_eq!(c.poll(t0 + ms(29)), Some(9));
        assert_eq!(c.poll(t0 + ms(100)), None);
    }

    #[test]
    fn request_restarts_window() {
        let t0 = Instant::now();
        let mut c = UpdateCoalescer::new(ms(20));
        c.request("a", t0);
        c.request("b", t0 + ms(15));
        assert_eq!(c.poll(t0 + ms(25)), None);
        assert_eq!(c.deadline(), Some(t0 + ms(35)));
        assert_eq!(c.poll(t0 + ms(35)), Some("b"));
    }

    #[test]
    fn flush_releases_immediately() {
        let t0 = Instant::now();
        let mut c = UpdateCoalescer::default();
        c.request(7, t0);
        assert_eq!(c.flush(), Some(7));
        assert!(!c.is_pending());
        assert_eq!(c.flush(), None);
    }
}

use std::time::Duration;

use foundation::time::Time;

/// Time-gated event throttle.
///
/// At most one value is accepted per `interval`. A value offered inside the
/// window is not queued: it replaces the single trailing slot, so when the
/// window reopens only the most recent value is delivered (see `poll`).
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval_s: f64,
    last_accepted: Option<Time>,
    trailing: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_s: interval.as_secs_f64(),
            last_accepted: None,
            trailing: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_s)
    }

    fn window_open(&self, now: Time) -> bool {
        match self.last_accepted {
            None => true,
            Some(last) => now.since(last) >= self.interval_s,
        }
    }

    /// Offers a value at `now`.
    ///
    /// Returns it back if accepted immediately; otherwise it becomes the
    /// pending trailing value (dropping whatever was pending before).
    pub fn offer(&mut self, now: Time, value: T) -> Option<T> {
        if self.window_open(now) {
            self.last_accepted = Some(now);
            self.trailing = None;
            return Some(value);
        }
        self.trailing = Some(value);
        None
    }

    /// Releases the pending trailing value once the window has reopened.
    pub fn poll(&mut self, now: Time) -> Option<T> {
        if self.trailing.is_none() || !self.window_open(now) {
            return None;
        }
        self.last_accepted = Some(now);
        self.trailing.take()
    }

    pub fn has_pending(&self) -> bool {
        self.trailing.is_some()
    }

    /// Drops the pending value and forgets the window.
    pub fn cancel(&mut self) {
        self.trailing = None;
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::Throttle;
    use foundation::time::Time;
    use std::time::Duration;

    #[test]
    fn drops_events_inside_window() {
        let mut t = Throttle::new(Duration::from_millis(50));
        assert_eq!(t.offer(Time(0.0), 1), Some(1));
        assert_eq!(t.offer(Time(0.01), 2), None);
        assert_eq!(t.offer(Time(0.02), 3), None);
        assert_eq!(t.offer(Time(0.05), 4), Some(4));
        assert!(!t.has_pending());
    }

    #[test]
    fn trailing_slot_keeps_only_latest() {
        let mut t = Throttle::new(Duration::from_millis(50));
        t.offer(Time(0.0), 1);
        t.offer(Time(0.01), 2);
        t.offer(Time(0.02), 3);
        assert_eq!(t.poll(Time(0.03)), None);
        assert_eq!(t.poll(Time(0.06)), Some(3));
        assert_eq!(t.poll(Time(0.2)), None);
    }

    #[test]
    fn cancel_discards_pending() {
        let mut t = Throttle::new(Duration::from_millis(16));
        t.offer(Time(0.0), "a");
        t.offer(Time(0.001), "b");
        t.cancel();
        assert_eq!(t.poll(Time(1.0)), None);
        assert_eq!(t.offer(Time(1.0), "c"), Some("c"));
    }
}

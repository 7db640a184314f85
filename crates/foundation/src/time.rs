use std::time::Duration;

/// Host-supplied monotonic timestamp (seconds).
///
/// Nothing in the workspace reads a wall clock; the host passes `Time` into
/// every call that needs it so runs can be replayed exactly.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Self(ms / 1000.0)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// The instant `d` after `self`.
    pub fn after(self, d: Duration) -> Self {
        Self(self.0 + d.as_secs_f64())
    }

    /// Seconds elapsed since `earlier` (negative if `earlier` is in the future).
    pub fn since(self, earlier: Time) -> f64 {
        self.0 - earlier.0
    }
}

#[cfg(test)]
mod tests {
    use super::Time;
    use std::time::Duration;

    #[test]
    fn after_and_since_agree() {
        let t0 = Time::from_millis(1500.0);
        let t1 = t0.after(Duration::from_millis(250));
        assert!((t1.since(t0) - 0.25).abs() < 1e-12);
        assert!(t1 > t0);
    }
}

use std::time::Duration;

use foundation::time::Time;
use runtime::{TimerId, TimerQueue};
use tracing::debug;

use crate::engine::RenderSession;
use crate::viewer::TimerKind;

/// Periodic cache trimming for constrained devices.
///
/// Inactive when the profile has no cleanup interval. Each tick asks the
/// renderer to drop refetchable caches and redraw, then re-arms itself.
#[derive(Debug)]
pub struct CleanupScheduler {
    interval: Option<Duration>,
    timer: Option<TimerId>,
    runs: u32,
}

impl CleanupScheduler {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            timer: None,
            runs: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Arms the timer if enabled and not already armed.
    pub fn start(&mut self, now: Time, timers: &mut TimerQueue<TimerKind>) {
        if let Some(interval) = self.interval
            && self.timer.is_none()
        {
            self.timer = Some(timers.schedule(now.after(interval), TimerKind::CacheTrim));
        }
    }

    pub fn on_timer<S: RenderSession>(
        &mut self,
        id: TimerId,
        now: Time,
        timers: &mut TimerQueue<TimerKind>,
        session: Option<&mut S>,
    ) {
        if self.timer != Some(id) {
            return;
        }
        self.timer = None;
        let Some(session) = session else {
            return;
        };
        session.trim_caches();
        session.request_render();
        self.runs += 1;
        debug!(runs = self.runs, "renderer caches trimmed");
        self.start(now, timers);
    }

    pub fn stop(&mut self, timers: &mut TimerQueue<TimerKind>) {
        if let Some(id) = self.timer.take() {
            timers.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CleanupScheduler;
    use crate::headless::HeadlessSession;
    use crate::viewer::TimerKind;
    use foundation::time::Time;
    use runtime::TimerQueue;
    use std::time::Duration;

    #[test]
    fn disabled_scheduler_never_arms() {
        let mut c = CleanupScheduler::new(None);
        let mut timers: TimerQueue<TimerKind> = TimerQueue::new();
        c.start(Time::ZERO, &mut timers);
        assert!(!c.is_armed());
        assert!(timers.is_empty());
    }

    #[test]
    fn rearms_and_stops() {
        let mut c = CleanupScheduler::new(Some(Duration::from_secs(60)));
        let mut timers = TimerQueue::new();
        c.start(Time::ZERO, &mut timers);
        c.start(Time::ZERO, &mut timers);
        assert_eq!(timers.len(), 1);

        let (id, kind) = timers.pop_due(Time(60.0)).unwrap();
        assert_eq!(kind, TimerKind::CacheTrim);
        // No session: the tick is dropped and the timer is not re-armed.
        c.on_timer::<HeadlessSession>(id, Time(60.0), &mut timers, None);
        assert!(!c.is_armed());

        c.start(Time(60.0), &mut timers);
        c.stop(&mut timers);
        assert!(timers.is_empty());
    }
}

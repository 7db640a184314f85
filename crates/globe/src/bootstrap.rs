use std::fmt;
use std::time::Duration;

use foundation::time::Time;
use runtime::{EventBus, TimerId, TimerQueue};
use scene::camera::Viewport;
use tracing::{debug, error, info, warn};

use crate::config::{GlobeConfig, InitialView};
use crate::engine::{
    CapabilityError, NoLabels, RenderBackend, RenderSession, SessionError, SessionSettings,
};
use crate::profile::ProfileSettings;
use crate::viewer::TimerKind;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    CheckingCapability,
    Initializing,
    Ready,
    Failed,
    Destroyed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::CheckingCapability => "checking_capability",
            SessionStatus::Initializing => "initializing",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed => "failed",
            SessionStatus::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the host should offer the user after a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Nothing in-process can help; the page or app must be reloaded.
    Reload,
    /// `RendererBootstrap::retry` may succeed.
    Retry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapFailure {
    CapabilityUnavailable(CapabilityError),
    ConstructionExhausted {
        attempts: u32,
        last_error: SessionError,
    },
}

impl BootstrapFailure {
    pub fn recovery(&self) -> RecoveryAction {
        match self {
            BootstrapFailure::CapabilityUnavailable(_) => RecoveryAction::Reload,
            BootstrapFailure::ConstructionExhausted { .. } => RecoveryAction::Retry,
        }
    }

    /// Message suitable for an error overlay.
    pub fn user_message(&self) -> String {
        match self {
            BootstrapFailure::CapabilityUnavailable(_) => {
                "3D rendering is not supported or enabled on this device. \
                 Please enable hardware acceleration or try a different browser."
                    .to_string()
            }
            BootstrapFailure::ConstructionExhausted { .. } => {
                "Failed to initialize the globe. Please try again or refresh the page."
                    .to_string()
            }
        }
    }
}

impl fmt::Display for BootstrapFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapFailure::CapabilityUnavailable(e) => write!(f, "capability check failed: {e}"),
            BootstrapFailure::ConstructionExhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} attempts: {last_error}"),
        }
    }
}

impl std::error::Error for BootstrapFailure {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RetryError {
    NotFailed,
    /// Capability failures cannot be retried in-process.
    ReloadRequired,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::NotFailed => f.write_str("renderer is not in a failed state"),
            RetryError::ReloadRequired => f.write_str("renderer unavailable; reload required"),
        }
    }
}

impl std::error::Error for RetryError {}

/// Brings a renderer session up and keeps exactly one alive.
///
/// Status flow:
/// `Uninitialized -> CheckingCapability -> Initializing -> Ready`, with
/// `Failed` reachable from the two middle states and `Destroyed` from all.
///
/// Failed construction attempts are retried on a timer until
/// `max_attempts` constructions have been tried. Retry timers live in the
/// caller's queue so teardown can cancel them with everything else.
pub struct RendererBootstrap<B: RenderBackend> {
    backend: B,
    profile: ProfileSettings,
    tile_url: String,
    access_token: Option<String>,
    initial_view: InitialView,
    max_attempts: u32,
    retry_delay: Duration,

    status: SessionStatus,
    session: Option<B::Session>,
    viewport: Option<Viewport>,
    attempts: u32,
    retry_count: u32,
    retry_timer: Option<TimerId>,
    failure: Option<BootstrapFailure>,
    alive: bool,
    events: EventBus,
}

impl<B: RenderBackend> RendererBootstrap<B> {
    pub fn new(backend: B, config: &GlobeConfig, profile: ProfileSettings) -> Self {
        Self {
            backend,
            profile,
            tile_url: config.tile_url.clone(),
            access_token: config.access_token.clone(),
            initial_view: config.initial_view,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            status: SessionStatus::Uninitialized,
            session: None,
            viewport: None,
            attempts: 0,
            retry_count: 0,
            retry_timer: None,
            failure: None,
            alive: true,
            events: EventBus::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    /// Retries scheduled since the last reset.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn failure(&self) -> Option<&BootstrapFailure> {
        self.failure.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn profile(&self) -> &ProfileSettings {
        &self.profile
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry_timer.is_some()
    }

    /// The live session; only handed out once `Ready`.
    pub fn session(&self) -> Option<&B::Session> {
        if self.status == SessionStatus::Ready {
            self.session.as_ref()
        } else {
            None
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut B::Session> {
        if self.status == SessionStatus::Ready {
            self.session.as_mut()
        } else {
            None
        }
    }

    /// Host container was laid out or resized.
    ///
    /// The first usable size starts the bootstrap; later sizes are forwarded
    /// to the live session.
    pub fn on_container_resize(
        &mut self,
        viewport: Viewport,
        now: Time,
        timers: &mut TimerQueue<TimerKind>,
    ) -> SessionStatus {
        if !self.alive {
            return self.status;
        }
        self.viewport = Some(viewport);
        match self.status {
            SessionStatus::Uninitialized if viewport.is_usable() => self.begin(now, timers),
            SessionStatus::Ready => {
                if let Some(session) = self.session.as_mut() {
                    session.resize(viewport);
                    session.request_render();
                }
            }
            _ => {}
        }
        self.status
    }

    fn begin(&mut self, now: Time, timers: &mut TimerQueue<TimerKind>) {
        if !self.transition(SessionStatus::CheckingCapability, now) {
            return;
        }
        if let Err(e) = self.backend.probe_capability() {
            self.fail(BootstrapFailure::CapabilityUnavailable(e), now);
            return;
        }
        if self.transition(SessionStatus::Initializing, now) {
            self.attempt(now, timers);
        }
    }

    fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            viewport: self.viewport.unwrap_or(Viewport::new(0.0, 0.0)),
            tile_url: self.tile_url.clone(),
            access_token: self.access_token.clone(),
            initial_view: self.initial_view,
            tile_resolution_scale: self.profile.tile_resolution_scale,
            msaa_samples: self.profile.msaa_samples,
            camera_damping: self.profile.camera_damping,
            target_frame_rate: self.profile.target_frame_rate,
        }
    }

    fn attempt(&mut self, now: Time, timers: &mut TimerQueue<TimerKind>) {
        if !self.alive || self.status != SessionStatus::Initializing {
            return;
        }
        self.attempts += 1;
        debug!(attempt = self.attempts, max = self.max_attempts, "constructing renderer");

        let settings = self.session_settings();
        let result = self.backend.create_session(&settings).and_then(|mut session| {
            match session.render(&NoLabels) {
                Ok(()) => Ok(session),
                Err(e) => {
                    if let Err(destroy_err) = session.destroy() {
                        warn!(error = %destroy_err, "failed to release half-built renderer");
                    }
                    Err(e)
                }
            }
        });

        match result {
            Ok(mut session) => {
                if !self.transition(SessionStatus::Ready, now) {
                    // Torn down while constructing.
                    if let Err(e) = session.destroy() {
                        error!(error = %e, "failed to release renderer after teardown");
                    }
                    return;
                }
                self.session = Some(session);
                self.failure = None;
                info!(attempts = self.attempts, "renderer ready");
            }
            Err(e) => self.on_attempt_failed(e, now, timers),
        }
    }

    fn on_attempt_failed(
        &mut self,
        err: SessionError,
        now: Time,
        timers: &mut TimerQueue<TimerKind>,
    ) {
        warn!(
            attempt = self.attempts,
            max = self.max_attempts,
            error = %err,
            "renderer construction failed"
        );
        self.events.emit(
            now,
            "attempt_failed",
            format!("attempt {}/{}: {err}", self.attempts, self.max_attempts),
        );

        if self.attempts >= self.max_attempts {
            self.fail(
                BootstrapFailure::ConstructionExhausted {
                    attempts: self.attempts,
                    last_error: err,
                },
                now,
            );
            return;
        }

        self.retry_count += 1;
        let due = now.after(self.retry_delay);
        self.retry_timer = Some(timers.schedule(due, TimerKind::RetryInit));
        info!(
            retry = self.retry_count,
            delay_ms = self.retry_delay.as_millis() as u64,
            "scheduling renderer retry"
        );
        self.events.emit(
            now,
            "retry",
            format!(
                "retry {} of {} in {} ms",
                self.retry_count,
                self.max_attempts - 1,
                self.retry_delay.as_millis()
            ),
        );
    }

    /// A retry timer fired. Stale or cancelled ids are ignored.
    pub fn on_retry_timer(&mut self, id: TimerId, now: Time, timers: &mut TimerQueue<TimerKind>) {
        if self.retry_timer != Some(id) {
            return;
        }
        self.retry_timer = None;
        self.attempt(now, timers);
    }

    /// Manual retry after construction gave up. Resets the attempt counter.
    pub fn retry(
        &mut self,
        now: Time,
        timers: &mut TimerQueue<TimerKind>,
    ) -> Result<SessionStatus, RetryError> {
        match &self.failure {
            Some(f) if self.status == SessionStatus::Failed => {
                if f.recovery() == RecoveryAction::Reload {
                    return Err(RetryError::ReloadRequired);
                }
            }
            _ => return Err(RetryError::NotFailed),
        }
        self.attempts = 0;
        self.retry_count = 0;
        self.failure = None;
        if self.transition(SessionStatus::Initializing, now) {
            self.attempt(now, timers);
        }
        Ok(self.status)
    }

    fn fail(&mut self, failure: BootstrapFailure, now: Time) {
        error!(error = %failure, "renderer unavailable");
        self.events.emit(now, "failed", failure.to_string());
        self.failure = Some(failure);
        self.transition(SessionStatus::Failed, now);
    }

    fn transition(&mut self, to: SessionStatus, now: Time) -> bool {
        if !self.alive {
            return false;
        }
        info!(from = %self.status, to = %to, "renderer status");
        self.events
            .emit(now, "status", format!("{} -> {}", self.status, to));
        self.status = to;
        true
    }

    /// Cancels pending retries and destroys the session. Safe to call twice.
    ///
    /// Destroy errors are logged, never returned: teardown must complete.
    pub fn teardown(&mut self, now: Time, timers: &mut TimerQueue<TimerKind>) {
        if !self.alive {
            return;
        }
        self.alive = false;
        if let Some(id) = self.retry_timer.take() {
            timers.cancel(id);
        }
        if let Some(mut session) = self.session.take()
            && let Err(e) = session.destroy()
        {
            error!(error = %e, "renderer destroy failed during teardown");
            self.events.emit(now, "teardown_error", e.to_string());
        }
        self.events
            .emit(now, "status", format!("{} -> {}", self.status, SessionStatus::Destroyed));
        self.status = SessionStatus::Destroyed;
        info!("renderer torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::{RecoveryAction, RendererBootstrap, RetryError, SessionStatus};
    use crate::config::GlobeConfig;
    use crate::headless::HeadlessBackend;
    use crate::profile::ProfileSettings;
    use crate::viewer::TimerKind;
    use foundation::time::Time;
    use runtime::TimerQueue;
    use scene::camera::Viewport;

    fn bootstrap(backend: HeadlessBackend) -> RendererBootstrap<HeadlessBackend> {
        let cfg = GlobeConfig::default();
        RendererBootstrap::new(backend, &cfg, ProfileSettings::resolve(&cfg))
    }

    /// Fires due timers in order, each at its own due time.
    fn drive(
        b: &mut RendererBootstrap<HeadlessBackend>,
        timers: &mut TimerQueue<TimerKind>,
        until: Time,
    ) {
        while let Some(due) = timers.next_due() {
            if due > until {
                break;
            }
            if let Some((id, _)) = timers.pop_due(due) {
                b.on_retry_timer(id, due, timers);
            }
        }
    }

    #[test]
    fn zero_size_container_waits() {
        let mut b = bootstrap(HeadlessBackend::new());
        let mut timers = TimerQueue::new();
        let s = b.on_container_resize(Viewport::new(0.0, 0.0), Time::ZERO, &mut timers);
        assert_eq!(s, SessionStatus::Uninitialized);
        assert_eq!(b.backend().construction_attempts(), 0);

        let s = b.on_container_resize(Viewport::new(800.0, 600.0), Time::ZERO, &mut timers);
        assert_eq!(s, SessionStatus::Ready);
        assert!(b.session().is_some());
    }

    #[test]
    fn missing_capability_fails_without_construction() {
        let mut b = bootstrap(HeadlessBackend::new().without_capability());
        let mut timers = TimerQueue::new();
        b.on_container_resize(Viewport::new(800.0, 600.0), Time::ZERO, &mut timers);
        assert_eq!(b.status(), SessionStatus::Failed);
        assert_eq!(b.backend().construction_attempts(), 0);
        assert_eq!(b.failure().unwrap().recovery(), RecoveryAction::Reload);
        assert_eq!(
            b.retry(Time::ZERO, &mut timers),
            Err(RetryError::ReloadRequired)
        );
    }

    #[test]
    fn retries_until_success() {
        let mut b = bootstrap(HeadlessBackend::new().failing_first(2));
        let mut timers = TimerQueue::new();
        b.on_container_resize(Viewport::new(800.0, 600.0), Time::ZERO, &mut timers);
        assert_eq!(b.status(), SessionStatus::Initializing);
        assert!(b.has_pending_retry());

        // Retry delay has not elapsed yet.
        drive(&mut b, &mut timers, Time(1.0));
        assert_eq!(b.backend().construction_attempts(), 1);

        drive(&mut b, &mut timers, Time(10.0));
        assert_eq!(b.status(), SessionStatus::Ready);
        assert_eq!(b.retry_count(), 2);
        assert_eq!(b.events().count("retry"), 2);
    }

    #[test]
    fn gives_up_after_max_attempts_and_allows_manual_retry() {
        let mut b = bootstrap(HeadlessBackend::new().failing_first(3));
        let mut timers = TimerQueue::new();
        b.on_container_resize(Viewport::new(800.0, 600.0), Time::ZERO, &mut timers);
        drive(&mut b, &mut timers, Time(100.0));

        assert_eq!(b.status(), SessionStatus::Failed);
        assert_eq!(b.backend().construction_attempts(), 3);
        assert!(timers.is_empty());
        assert_eq!(b.failure().unwrap().recovery(), RecoveryAction::Retry);

        assert_eq!(b.retry(Time(101.0), &mut timers), Ok(SessionStatus::Ready));
        assert_eq!(b.retry_count(), 0);
        assert_eq!(b.retry(Time(102.0), &mut timers), Err(RetryError::NotFailed));
    }

    #[test]
    fn teardown_cancels_retry_and_is_idempotent() {
        let mut b = bootstrap(HeadlessBackend::new().failing_first(1));
        let mut timers = TimerQueue::new();
        b.on_container_resize(Viewport::new(800.0, 600.0), Time::ZERO, &mut timers);
        assert_eq!(timers.len(), 1);

        b.teardown(Time(0.5), &mut timers);
        b.teardown(Time(0.6), &mut timers);
        assert_eq!(b.status(), SessionStatus::Destroyed);
        assert!(timers.is_empty());

        drive(&mut b, &mut timers, Time(10.0));
        assert_eq!(b.backend().construction_attempts(), 1);
        assert_eq!(b.status(), SessionStatus::Destroyed);
    }

    #[test]
    fn teardown_swallows_destroy_errors() {
        let mut b = bootstrap(HeadlessBackend::new().failing_destroy());
        let mut timers = TimerQueue::new();
        b.on_container_resize(Viewport::new(800.0, 600.0), Time::ZERO, &mut timers);
        assert!(b.is_ready());
        b.teardown(Time(1.0), &mut timers);
        assert_eq!(b.status(), SessionStatus::Destroyed);
        assert!(b.session().is_none());
        assert_eq!(b.events().count("teardown_error"), 1);
        assert_eq!(b.backend().live_sessions(), 0);

        b.teardown(Time(2.0), &mut timers);
        assert_eq!(b.events().count("teardown_error"), 1);
    }
}

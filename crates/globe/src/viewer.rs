use foundation::math::Vec2;
use foundation::time::Time;
use runtime::{EventBus, Frame, TimerQueue};
use scene::camera::Viewport;
use scene::cluster::resolve_display_points;
use scene::hover::HoverState;
use scene::points::{PointId, PointRecord};
use tracing::{info, warn};

use crate::bootstrap::{BootstrapFailure, RendererBootstrap, RetryError, SessionStatus};
use crate::cleanup::CleanupScheduler;
use crate::config::{ConfigError, GlobeConfig};
use crate::engine::{LabelSource, RenderBackend, RenderSession};
use crate::entities::{BatchStep, EntityManager};
use crate::interaction::{ClickOutcome, InteractionController, SelectionCallback};
use crate::profile::ProfileSettings;

/// Payload of the viewer's timer queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerKind {
    RetryInit,
    CacheTrim,
}

/// Labels for hovered markers inside their distance band.
struct HoverLabels<'a> {
    hover: &'a HoverState,
    entities: &'a EntityManager,
}

impl LabelSource for HoverLabels<'_> {
    fn label_for(&self, id: &PointId, camera_distance: f64) -> Option<String> {
        if !self.hover.is_hovered(id) {
            return None;
        }
        let label = self.entities.label(id)?;
        label.band.contains(camera_distance).then(|| label.text())
    }
}

/// Interactive globe bound to one host container.
///
/// The host drives everything: container sizes, animation frames, pointer
/// events and a monotonic clock. Dropping the viewer tears it down.
pub struct GlobeViewer<B: RenderBackend> {
    config: GlobeConfig,
    bootstrap: RendererBootstrap<B>,
    entities: EntityManager,
    interaction: InteractionController,
    cleanup: CleanupScheduler,
    timers: TimerQueue<TimerKind>,
    frame: Option<Frame>,
    torn_down: bool,
}

impl<B: RenderBackend> GlobeViewer<B> {
    pub fn new(backend: B, config: GlobeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let profile = ProfileSettings::resolve(&config);
        info!(
            profile = %profile.profile,
            throttle_ms = profile.pointer_throttle.as_millis() as u64,
            "globe viewer created"
        );
        Ok(Self {
            bootstrap: RendererBootstrap::new(backend, &config, profile),
            entities: EntityManager::new(config.batch_size, config.grid_size_deg),
            interaction: InteractionController::new(
                config.hover_threshold_px,
                profile.pointer_throttle,
            ),
            cleanup: CleanupScheduler::new(profile.cleanup_interval),
            timers: TimerQueue::new(),
            frame: None,
            torn_down: false,
            config,
        })
    }

    pub fn config(&self) -> &GlobeConfig {
        &self.config
    }

    pub fn profile(&self) -> &ProfileSettings {
        self.bootstrap.profile()
    }

    pub fn status(&self) -> SessionStatus {
        self.bootstrap.status()
    }

    pub fn failure(&self) -> Option<&BootstrapFailure> {
        self.bootstrap.failure()
    }

    pub fn retry_count(&self) -> u32 {
        self.bootstrap.retry_count()
    }

    pub fn events(&self) -> &EventBus {
        self.bootstrap.events()
    }

    pub fn backend(&self) -> &B {
        self.bootstrap.backend()
    }

    pub fn session(&self) -> Option<&B::Session> {
        self.bootstrap.session()
    }

    pub fn session_mut(&mut self) -> Option<&mut B::Session> {
        self.bootstrap.session_mut()
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn cleanup(&self) -> &CleanupScheduler {
        &self.cleanup
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn frame(&self) -> Option<Frame> {
        self.frame
    }

    pub fn is_hovered(&self, id: &PointId) -> bool {
        self.interaction.is_hovered(id)
    }

    pub fn selected(&self) -> Option<&PointId> {
        self.interaction.selected()
    }

    /// Full label text for a hovered marker.
    pub fn hover_label(&self, id: &PointId) -> Option<String> {
        if !self.interaction.is_hovered(id) {
            return None;
        }
        self.entities.label(id).map(|l| l.text())
    }

    pub fn set_selection_callback(&mut self, callback: Option<SelectionCallback>) {
        self.interaction.set_selection_callback(callback);
    }

    pub fn on_container_resize(&mut self, width: f64, height: f64, now: Time) -> SessionStatus {
        let before = self.bootstrap.status();
        self.bootstrap
            .on_container_resize(Viewport::new(width, height), now, &mut self.timers);
        self.sync_status(before, now);
        self.bootstrap.status()
    }

    /// Replaces the point set: clusters, clears hover, then rebuilds markers.
    pub fn set_points(&mut self, records: &[PointRecord]) {
        let resolved = resolve_display_points(records, self.config.cluster_base_radius_deg);
        let located = records.iter().filter(|r| r.is_located()).count();
        if resolved.len() < located {
            warn!(
                dropped = located - resolved.len(),
                "records with duplicate ids dropped"
            );
        }
        info!(
            records = records.len(),
            resolved = resolved.len(),
            "point set replaced"
        );
        self.interaction.clear_hover();
        self.entities
            .replace_points(resolved, self.bootstrap.session_mut());
    }

    /// One host animation frame: fire due timers, create the next marker
    /// batch, flush a held-back pointer event and draw.
    pub fn on_frame(&mut self, now: Time) -> Option<BatchStep> {
        self.frame = Some(match self.frame {
            Some(f) => f.next(now),
            None => Frame::first(now),
        });
        self.advance_timers(now);

        let session = self.bootstrap.session_mut()?;
        let step = self.entities.step(session);
        self.interaction.poll(now, session, &self.entities);

        let labels = HoverLabels {
            hover: self.interaction.hover(),
            entities: &self.entities,
        };
        if let Err(e) = session.render(&labels) {
            warn!(error = %e, "frame render failed");
        }
        Some(step)
    }

    /// Fires every timer due at or before `now`.
    pub fn advance_timers(&mut self, now: Time) {
        while let Some((id, kind)) = self.timers.pop_due(now) {
            match kind {
                TimerKind::RetryInit => {
                    let before = self.bootstrap.status();
                    self.bootstrap.on_retry_timer(id, now, &mut self.timers);
                    self.sync_status(before, now);
                }
                TimerKind::CacheTrim => {
                    self.cleanup
                        .on_timer(id, now, &mut self.timers, self.bootstrap.session_mut());
                }
            }
        }
    }

    fn sync_status(&mut self, before: SessionStatus, now: Time) {
        let after = self.bootstrap.status();
        if before == after {
            return;
        }
        match after {
            SessionStatus::Ready => {
                if let Some(session) = self.bootstrap.session_mut() {
                    self.entities.on_session_ready(session);
                }
                self.cleanup.start(now, &mut self.timers);
            }
            SessionStatus::Failed => {
                self.interaction.cancel();
                self.entities.on_session_lost();
                self.cleanup.stop(&mut self.timers);
            }
            _ => {}
        }
    }

    pub fn on_pointer_move(&mut self, x: f64, y: f64, now: Time) -> bool {
        match self.bootstrap.session_mut() {
            Some(session) => {
                self.interaction
                    .on_pointer_move(now, Vec2::new(x, y), session, &self.entities)
            }
            None => false,
        }
    }

    pub fn on_click(&mut self, x: f64, y: f64) -> ClickOutcome {
        match self.bootstrap.session() {
            Some(session) => self
                .interaction
                .on_click(Vec2::new(x, y), session, &self.entities),
            None => ClickOutcome::Miss,
        }
    }

    /// The host's detail overlay opened or closed.
    pub fn set_overlay_open(&mut self, open: bool) {
        if self.interaction.set_overlay_open(open)
            && let Some(session) = self.bootstrap.session_mut()
        {
            session.request_render();
        }
    }

    pub fn clear_selection(&mut self) {
        self.interaction.clear_selection();
    }

    /// User-initiated retry after construction gave up.
    pub fn retry(&mut self, now: Time) -> Result<SessionStatus, RetryError> {
        let before = self.bootstrap.status();
        let status = self.bootstrap.retry(now, &mut self.timers)?;
        self.sync_status(before, now);
        Ok(status)
    }

    /// Cancels timers and queued work, then destroys the renderer.
    /// Idempotent.
    pub fn teardown(&mut self, now: Time) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.interaction.cancel();
        self.entities.cancel_pending();
        self.cleanup.stop(&mut self.timers);
        self.bootstrap.teardown(now, &mut self.timers);
        self.entities.on_session_lost();
        self.timers.clear();
    }
}

impl<B: RenderBackend> Drop for GlobeViewer<B> {
    fn drop(&mut self) {
        let now = self.frame.map(|f| f.time).unwrap_or(Time::ZERO);
        self.teardown(now);
    }
}

//! In-memory renderer.
//!
//! Implements the engine traits against the analytic camera and ellipsoid in
//! `scene`, so picking and projection behave like a real globe without a GPU.
//! Fault injection covers the failure paths of the bootstrap.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::math::{LatLng, Vec2, Vec3};
use scene::camera::{Camera, Viewport};
use scene::markers::MarkerSpec;
use scene::picking::{globe_occludes, pick_nearest, ray_globe_latlng};
use scene::points::PointId;

use crate::engine::{
    CapabilityError, LabelSource, RenderBackend, RenderSession, SessionError, SessionSettings,
};

/// Screen radius within which a click lands on a marker icon.
pub const DEFAULT_PICK_RADIUS_PX: f64 = 16.0;

/// Session bookkeeping shared between a backend and the sessions it built.
#[derive(Debug, Default)]
struct Liveness {
    live: Cell<u32>,
    peak: Cell<u32>,
    destroyed: Cell<u32>,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    capable: bool,
    failures_remaining: u32,
    fail_destroy: bool,
    attempts: u32,
    pick_radius_px: f64,
    liveness: Rc<Liveness>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            capable: true,
            failures_remaining: 0,
            fail_destroy: false,
            attempts: 0,
            pick_radius_px: DEFAULT_PICK_RADIUS_PX,
            liveness: Rc::new(Liveness::default()),
        }
    }

    pub fn without_capability(mut self) -> Self {
        self.capable = false;
        self
    }

    /// The next `n` constructions fail.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.failures_remaining = n;
        self
    }

    /// Sessions report an error from `destroy` (after releasing everything).
    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    pub fn with_pick_radius(mut self, px: f64) -> Self {
        self.pick_radius_px = px;
        self
    }

    pub fn construction_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn live_sessions(&self) -> u32 {
        self.liveness.live.get()
    }

    /// Most sessions ever alive at once.
    pub fn peak_live_sessions(&self) -> u32 {
        self.liveness.peak.get()
    }

    pub fn destroyed_sessions(&self) -> u32 {
        self.liveness.destroyed.get()
    }
}

impl RenderBackend for HeadlessBackend {
    type Session = HeadlessSession;

    fn probe_capability(&mut self) -> Result<(), CapabilityError> {
        if self.capable {
            Ok(())
        } else {
            Err(CapabilityError::NoRenderingContext)
        }
    }

    fn create_session(&mut self, settings: &SessionSettings) -> Result<HeadlessSession, SessionError> {
        self.attempts += 1;
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(SessionError::Construction(format!(
                "simulated failure on attempt {}",
                self.attempts
            )));
        }
        if !settings.viewport.is_usable() {
            return Err(SessionError::Construction("container has no size".to_string()));
        }

        let live = self.liveness.live.get() + 1;
        self.liveness.live.set(live);
        self.liveness.peak.set(self.liveness.peak.get().max(live));

        Ok(HeadlessSession {
            camera: Camera::overhead(
                settings.initial_target(),
                settings.initial_view.height_m,
                settings.viewport,
            ),
            settings: settings.clone(),
            markers: BTreeMap::new(),
            pick_radius_px: self.pick_radius_px,
            fail_destroy: self.fail_destroy,
            destroyed: false,
            frames_requested: 0,
            renders_requested: 0,
            frames_rendered: 0,
            cache_trims: 0,
            cached_tiles: 0,
            drawn_markers: Vec::new(),
            visible_labels: Vec::new(),
            liveness: Rc::clone(&self.liveness),
        })
    }
}

#[derive(Debug)]
pub struct HeadlessSession {
    settings: SessionSettings,
    camera: Camera,
    markers: BTreeMap<PointId, MarkerSpec>,
    pick_radius_px: f64,
    fail_destroy: bool,
    destroyed: bool,
    frames_requested: u32,
    renders_requested: u32,
    frames_rendered: u32,
    cache_trims: u32,
    cached_tiles: u32,
    drawn_markers: Vec<DrawnMarker>,
    visible_labels: Vec<(PointId, String)>,
    liveness: Rc<Liveness>,
}

/// A marker icon as placed by the most recent `render`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnMarker {
    pub id: PointId,
    pub screen: Vec2,
    pub scale: f64,
    pub badge: Option<String>,
}

impl HeadlessSession {
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Moves the camera straight above `over`.
    pub fn fly_to(&mut self, over: LatLng, height_m: f64) {
        self.camera = Camera::overhead(over, height_m, self.camera.viewport);
        self.renders_requested += 1;
    }

    pub fn marker(&self, id: &PointId) -> Option<&MarkerSpec> {
        self.markers.get(id)
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerSpec> {
        self.markers.values()
    }

    /// Screen position of a marker, if it is on screen.
    pub fn marker_screen_position(&self, id: &PointId) -> Option<Vec2> {
        self.markers
            .get(id)
            .and_then(|m| self.world_to_screen(m.world))
    }

    pub fn frames_requested(&self) -> u32 {
        self.frames_requested
    }

    pub fn renders_requested(&self) -> u32 {
        self.renders_requested
    }

    pub fn frames_rendered(&self) -> u32 {
        self.frames_rendered
    }

    pub fn cache_trims(&self) -> u32 {
        self.cache_trims
    }

    pub fn cached_tiles(&self) -> u32 {
        self.cached_tiles
    }

    /// Markers drawn by the most recent `render`, ascending by id.
    pub fn drawn_markers(&self) -> &[DrawnMarker] {
        &self.drawn_markers
    }

    /// Labels drawn by the most recent `render`.
    pub fn visible_labels(&self) -> &[(PointId, String)] {
        &self.visible_labels
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl RenderSession for HeadlessSession {
    fn render(&mut self, labels: &dyn LabelSource) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        self.frames_rendered += 1;
        // Stand-in for imagery tiles streamed in as the globe is drawn.
        self.cached_tiles = self.cached_tiles.saturating_add(4);

        let mut drawn = Vec::new();
        let mut visible = Vec::new();
        for m in self.markers.values() {
            let Some(screen) = self.world_to_screen(m.world) else {
                continue;
            };
            let distance = self.camera.distance_to(m.world);
            if let Some(text) = labels.label_for(&m.id, distance) {
                visible.push((m.id.clone(), text));
            }
            drawn.push(DrawnMarker {
                id: m.id.clone(),
                screen,
                scale: m.scale_at(distance),
                badge: m.cluster_badge(),
            });
        }
        self.drawn_markers = drawn;
        self.visible_labels = visible;
        Ok(())
    }

    fn request_render(&mut self) {
        self.renders_requested += 1;
    }

    fn request_frame(&mut self) {
        self.frames_requested += 1;
    }

    fn resize(&mut self, viewport: Viewport) {
        self.camera = self.camera.with_viewport(viewport);
        self.settings.viewport = viewport;
    }

    fn globe_position_at(&self, screen: Vec2) -> Option<LatLng> {
        self.camera.screen_ray(screen).and_then(ray_globe_latlng)
    }

    fn world_to_screen(&self, world: Vec3) -> Option<Vec2> {
        if globe_occludes(self.camera.eye, world) {
            return None;
        }
        let px = self.camera.project(world)?;
        let vp = self.camera.viewport;
        let on_screen = (0.0..=vp.width).contains(&px.x) && (0.0..=vp.height).contains(&px.y);
        on_screen.then_some(px)
    }

    fn pick(&self, screen: Vec2) -> Option<PointId> {
        let projected: Vec<(&PointId, Vec2)> = self
            .markers
            .iter()
            .filter_map(|(id, m)| Some((id, self.world_to_screen(m.world)?)))
            .collect();
        pick_nearest(projected, screen, self.pick_radius_px)
    }

    fn add_marker(&mut self, marker: MarkerSpec) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        if self.markers.contains_key(&marker.id) {
            return Err(SessionError::Marker {
                id: marker.id,
                reason: "already exists".to_string(),
            });
        }
        self.markers.insert(marker.id.clone(), marker);
        Ok(())
    }

    fn remove_marker(&mut self, id: &PointId) -> bool {
        self.markers.remove(id).is_some()
    }

    fn marker_count(&self) -> usize {
        self.markers.len()
    }

    fn trim_caches(&mut self) {
        self.cache_trims += 1;
        self.cached_tiles = 0;
    }

    fn destroy(&mut self) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        self.destroyed = true;
        self.markers.clear();
        self.drawn_markers.clear();
        self.visible_labels.clear();
        self.liveness
            .live
            .set(self.liveness.live.get().saturating_sub(1));
        self.liveness
            .destroyed
            .set(self.liveness.destroyed.get() + 1);
        if self.fail_destroy {
            return Err(SessionError::Render("context lost during destroy".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HeadlessBackend;
    use crate::config::InitialView;
    use crate::engine::{NoLabels, RenderBackend, RenderSession, SessionError, SessionSettings};
    use foundation::math::{LatLng, Vec2};
    use scene::camera::Viewport;
    use scene::cluster::resolve_display_points;
    use scene::markers::{CLUSTER_MARKER_SCALE, MarkerSpec};
    use scene::points::PointRecord;

    fn settings() -> SessionSettings {
        SessionSettings {
            viewport: Viewport::new(800.0, 600.0),
            tile_url: "https://a.tile.openstreetmap.org/".to_string(),
            access_token: None,
            initial_view: InitialView {
                lat: 40.5,
                lng: -75.5,
                height_m: 1.0e5,
            },
            tile_resolution_scale: 1.0,
            msaa_samples: 4,
            camera_damping: 4.0,
            target_frame_rate: 60,
        }
    }

    #[test]
    fn center_of_screen_is_the_view_target() {
        let mut backend = HeadlessBackend::new();
        let session = backend.create_session(&settings()).unwrap();
        let ll = session.globe_position_at(Vec2::new(400.0, 300.0)).unwrap();
        assert!((ll.lat - 40.5).abs() < 1e-2, "lat {}", ll.lat);
        assert!((ll.lng + 75.5).abs() < 1e-2, "lng {}", ll.lng);
    }

    #[test]
    fn sky_is_not_the_globe() {
        let mut backend = HeadlessBackend::new();
        let mut s = settings();
        s.initial_view.height_m = 2.0e7;
        let session = backend.create_session(&s).unwrap();
        assert!(session.globe_position_at(Vec2::new(2.0, 2.0)).is_none());
    }

    #[test]
    fn picks_marker_under_pointer() {
        let mut backend = HeadlessBackend::new();
        let mut session = backend.create_session(&settings()).unwrap();
        let pts = resolve_display_points(&[PointRecord::new("m1", "M", 40.5, -75.5)], 0.0001);
        session.add_marker(MarkerSpec::for_point(&pts[0])).unwrap();

        let at = session.marker_screen_position(pts[0].id()).unwrap();
        assert_eq!(session.pick(at), Some(pts[0].id().clone()));
        assert_eq!(session.pick(Vec2::new(at.x + 100.0, at.y)), None);
        assert!(session.add_marker(MarkerSpec::for_point(&pts[0])).is_err());
    }

    #[test]
    fn marker_behind_the_globe_is_neither_drawn_nor_picked() {
        let mut backend = HeadlessBackend::new();
        let mut s = settings();
        s.initial_view = InitialView {
            lat: 20.0,
            lng: 0.0,
            height_m: 2.0e7,
        };
        let mut session = backend.create_session(&s).unwrap();
        let pts = resolve_display_points(
            &[
                PointRecord::new("hidden", "H", -20.0, 180.0),
                PointRecord::new("front", "F", 20.0, 0.0),
            ],
            0.0001,
        );
        for p in &pts {
            session.add_marker(MarkerSpec::for_point(p)).unwrap();
        }

        let hidden = pts[0].id();
        assert_eq!(session.world_to_screen(pts[0].position.to_ecef(0.0).as_vec3()), None);
        assert_eq!(session.marker_screen_position(hidden), None);
        assert_eq!(session.pick(Vec2::new(400.0, 300.0)), Some(pts[1].id().clone()));

        session.remove_marker(pts[1].id());
        assert_eq!(session.pick(Vec2::new(400.0, 300.0)), None);
    }

    #[test]
    fn render_draws_scaled_and_badged_markers_on_the_near_side() {
        let mut backend = HeadlessBackend::new();
        let mut session = backend.create_session(&settings()).unwrap();
        let pts = resolve_display_points(
            &[
                PointRecord::new("a", "A", 40.5, -75.5),
                PointRecord::new("b", "B", 40.5, -75.5),
                PointRecord::new("far", "F", -40.5, 104.5),
            ],
            0.0001,
        );
        for p in &pts {
            session.add_marker(MarkerSpec::for_point(p)).unwrap();
        }
        session.render(&NoLabels).unwrap();

        let drawn = session.drawn_markers();
        let ids: Vec<_> = drawn.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        for d in drawn {
            assert_eq!(d.badge.as_deref(), Some("2"));
            assert_eq!(d.scale, CLUSTER_MARKER_SCALE);
        }
        assert_eq!(Some(drawn[0].screen), session.marker_screen_position(pts[0].id()));

        session.destroy().unwrap();
        assert!(session.drawn_markers().is_empty());
    }

    #[test]
    fn destroy_releases_and_rejects_reuse() {
        let mut backend = HeadlessBackend::new();
        let mut session = backend.create_session(&settings()).unwrap();
        assert_eq!(backend.live_sessions(), 1);
        session.destroy().unwrap();
        assert_eq!(backend.live_sessions(), 0);
        assert_eq!(session.destroy(), Err(SessionError::Destroyed));
        assert_eq!(session.render(&NoLabels), Err(SessionError::Destroyed));
    }

    #[test]
    fn trimming_drops_cached_tiles() {
        let mut backend = HeadlessBackend::new();
        let mut session = backend.create_session(&settings()).unwrap();
        session.render(&NoLabels).unwrap();
        assert!(session.cached_tiles() > 0);
        session.trim_caches();
        assert_eq!(session.cached_tiles(), 0);
        assert_eq!(session.cache_trims(), 1);
        session.fly_to(LatLng::new(0.0, 0.0), 1.0e7);
    }
}

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use foundation::math::Vec3;
use runtime::FrameBudget;
use scene::labels::MarkerLabel;
use scene::markers::MarkerSpec;
use scene::points::{DisplayPoint, PointId, PointRecord};
use scene::spatial::GridIndex;
use tracing::{debug, warn};

use crate::engine::RenderSession;

/// Outcome of one per-frame creation step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BatchStep {
    pub created: usize,
    pub remaining: usize,
}

impl BatchStep {
    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

/// Owns the display-point set and the markers materialized for it.
///
/// Markers are created a fixed number per frame so a large point set never
/// stalls a frame. A new point set (or a lost session) bumps `generation` and
/// discards whatever creation work was still queued.
#[derive(Debug)]
pub struct EntityManager {
    batch_size: u32,
    grid_size_deg: f64,
    points: Vec<DisplayPoint>,
    by_id: BTreeMap<PointId, usize>,
    labels: BTreeMap<PointId, MarkerLabel>,
    grid: GridIndex,
    live: BTreeSet<PointId>,
    pending: VecDeque<usize>,
    generation: u64,
    steps: u32,
}

impl EntityManager {
    pub fn new(batch_size: u32, grid_size_deg: f64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            grid_size_deg,
            points: Vec::new(),
            by_id: BTreeMap::new(),
            labels: BTreeMap::new(),
            grid: GridIndex::empty(grid_size_deg),
            live: BTreeSet::new(),
            pending: VecDeque::new(),
            generation: 0,
            steps: 0,
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn points(&self) -> &[DisplayPoint] {
        &self.points
    }

    pub fn point(&self, id: &PointId) -> Option<&DisplayPoint> {
        self.by_id.get(id).map(|&idx| &self.points[idx])
    }

    pub fn record(&self, id: &PointId) -> Option<&PointRecord> {
        self.point(id).map(|p| &p.record)
    }

    pub fn label(&self, id: &PointId) -> Option<&MarkerLabel> {
        self.labels.get(id)
    }

    /// Surface position (ECEF meters) of a display point.
    pub fn world_position(&self, id: &PointId) -> Option<Vec3> {
        self.point(id).map(|p| p.position.to_ecef(0.0).as_vec3())
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn is_live(&self, id: &PointId) -> bool {
        self.live.contains(id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Creation steps that did work since the last rebuild.
    pub fn build_steps(&self) -> u32 {
        self.steps
    }

    /// Replaces the point set.
    ///
    /// Every existing marker is removed before the new set is queued, so no
    /// marker from the old set survives. Without a session the set is only
    /// staged; creation starts from `on_session_ready`.
    pub fn replace_points<S: RenderSession>(
        &mut self,
        points: Vec<DisplayPoint>,
        session: Option<&mut S>,
    ) {
        match session {
            Some(session) => {
                self.destroy_all(session);
                self.stage(points);
                self.kick(session);
            }
            None => {
                self.live.clear();
                self.stage(points);
            }
        }
    }

    fn stage(&mut self, points: Vec<DisplayPoint>) {
        self.by_id = points
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.id().clone(), idx))
            .collect();
        self.labels = points
            .iter()
            .map(|p| (p.id().clone(), MarkerLabel::for_point(p)))
            .collect();
        self.grid = GridIndex::build(&points, self.grid_size_deg);
        self.points = points;
        self.requeue();
        debug!(
            points = self.points.len(),
            cells = self.grid.cell_count(),
            generation = self.generation,
            "point set staged"
        );
    }

    fn requeue(&mut self) {
        self.generation += 1;
        self.steps = 0;
        self.pending = (0..self.points.len()).collect();
    }

    fn kick<S: RenderSession>(&mut self, session: &mut S) {
        if !self.pending.is_empty() {
            session.request_frame();
        }
    }

    fn destroy_all<S: RenderSession>(&mut self, session: &mut S) {
        for id in std::mem::take(&mut self.live) {
            session.remove_marker(&id);
        }
    }

    /// A session just became ready: materialize the current set into it.
    pub fn on_session_ready<S: RenderSession>(&mut self, session: &mut S) {
        self.live.clear();
        self.requeue();
        self.kick(session);
    }

    /// The session went away; its markers went with it.
    pub fn on_session_lost(&mut self) {
        self.live.clear();
        self.pending.clear();
        self.generation += 1;
    }

    /// Creates up to one batch of markers. Schedules another frame while work
    /// remains.
    pub fn step<S: RenderSession>(&mut self, session: &mut S) -> BatchStep {
        if self.pending.is_empty() {
            return BatchStep {
                created: 0,
                remaining: 0,
            };
        }

        let mut budget = FrameBudget::new(self.batch_size);
        let mut created = 0;
        while !self.pending.is_empty() && budget.try_consume(1) {
            let Some(idx) = self.pending.pop_front() else {
                break;
            };
            let point = &self.points[idx];
            match session.add_marker(MarkerSpec::for_point(point)) {
                Ok(()) => {
                    self.live.insert(point.id().clone());
                    created += 1;
                }
                Err(e) => warn!(id = %point.id(), error = %e, "marker creation failed"),
            }
        }
        self.steps += 1;

        let remaining = self.pending.len();
        if remaining > 0 {
            session.request_frame();
        } else {
            debug!(
                live = self.live.len(),
                steps = self.steps,
                generation = self.generation,
                "marker batch complete"
            );
        }
        BatchStep { created, remaining }
    }

    /// Drops queued creation work; live markers stay.
    pub fn cancel_pending(&mut self) {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.generation += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EntityManager;
    use crate::config::InitialView;
    use crate::engine::{RenderBackend, RenderSession, SessionSettings};
    use crate::headless::{HeadlessBackend, HeadlessSession};
    use scene::camera::Viewport;
    use scene::cluster::resolve_display_points;
    use scene::points::{DisplayPoint, PointId, PointRecord};

    fn session() -> HeadlessSession {
        HeadlessBackend::new()
            .create_session(&SessionSettings {
                viewport: Viewport::new(800.0, 600.0),
                tile_url: "https://a.tile.openstreetmap.org/".to_string(),
                access_token: None,
                initial_view: InitialView::default(),
                tile_resolution_scale: 1.0,
                msaa_samples: 4,
                camera_damping: 4.0,
                target_frame_rate: 60,
            })
            .unwrap()
    }

    fn points(n: usize, prefix: &str) -> Vec<DisplayPoint> {
        let recs: Vec<PointRecord> = (0..n)
            .map(|i| {
                PointRecord::new(
                    format!("{prefix}{i}"),
                    format!("Mentor {i}"),
                    (i % 80) as f64,
                    (i / 80) as f64,
                )
            })
            .collect();
        resolve_display_points(&recs, 0.0001)
    }

    fn run_to_completion(m: &mut EntityManager, s: &mut HeadlessSession) {
        while m.pending_count() > 0 {
            m.step(s);
        }
    }

    #[test]
    fn creation_takes_ceil_n_over_b_steps() {
        for (n, b, expected) in [(100, 25, 4), (101, 25, 5), (1, 25, 1), (25, 25, 1)] {
            let mut s = session();
            let mut m = EntityManager::new(b, 2.0);
            m.replace_points(points(n, "p"), Some(&mut s));
            run_to_completion(&mut m, &mut s);
            assert_eq!(m.build_steps(), expected, "n={n} b={b}");
            assert_eq!(m.live_count(), n);
            assert_eq!(s.marker_count(), n);
            // One frame requested up front, one after each unfinished step.
            assert_eq!(s.frames_requested(), expected);
        }
    }

    #[test]
    fn rebuild_removes_every_old_marker() {
        let mut s = session();
        let mut m = EntityManager::new(10, 2.0);
        m.replace_points(points(30, "old"), Some(&mut s));
        m.step(&mut s);
        assert_eq!(s.marker_count(), 10);

        let generation = m.generation();
        m.replace_points(points(5, "new"), Some(&mut s));
        assert!(m.generation() > generation);
        assert_eq!(s.marker_count(), 0);
        run_to_completion(&mut m, &mut s);
        assert_eq!(s.marker_count(), 5);
        assert!(s.markers().all(|mk| mk.id.as_str().starts_with("new")));
        assert!(!m.is_live(&PointId::new("old0")));
    }

    #[test]
    fn staged_points_wait_for_a_session() {
        let mut m = EntityManager::new(25, 2.0);
        m.replace_points::<HeadlessSession>(points(3, "p"), None);
        assert_eq!(m.live_count(), 0);
        assert_eq!(m.grid().len(), 3);

        let mut s = session();
        m.on_session_ready(&mut s);
        m.step(&mut s);
        assert_eq!(s.marker_count(), 3);
        assert!(m.record(&PointId::new("p1")).is_some());
    }

    #[test]
    fn cancel_stops_creation() {
        let mut s = session();
        let mut m = EntityManager::new(2, 2.0);
        m.replace_points(points(10, "p"), Some(&mut s));
        m.step(&mut s);
        m.cancel_pending();
        let step = m.step(&mut s);
        assert_eq!(step.created, 0);
        assert!(step.is_done());
        assert_eq!(s.marker_count(), 2);
    }

    #[test]
    fn empty_set_requests_nothing() {
        let mut s = session();
        let mut m = EntityManager::new(25, 2.0);
        m.replace_points(Vec::new(), Some(&mut s));
        assert_eq!(s.frames_requested(), 0);
        assert_eq!(m.build_steps(), 0);
    }
}

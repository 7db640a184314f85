use std::collections::BTreeSet;
use std::time::Duration;

use foundation::math::Vec2;
use foundation::time::Time;
use runtime::Throttle;
use scene::hover::HoverState;
use scene::points::{PointId, PointRecord};
use tracing::debug;

use crate::engine::RenderSession;
use crate::entities::EntityManager;

/// Invoked with the clicked record when the host wants to handle selection.
pub type SelectionCallback = Box<dyn FnMut(&PointRecord)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing pickable under the pointer.
    Miss,
    /// Ignored while the detail overlay is open.
    Suppressed,
    /// Handed to the host's selection callback.
    Dispatched(PointId),
    /// No callback installed; kept as the local selection.
    Selected(PointId),
}

/// Pointer-driven hover and selection.
///
/// Hover resolution per accepted pointer event:
/// 1. Ray-cast the pointer onto the globe.
/// 2. Look up the grid cell under the hit.
/// 3. Project only that cell's markers and compare screen distance with the
///    threshold.
///
/// Markers outside the cell are cleared without projecting them.
pub struct InteractionController {
    hover: HoverState,
    throttle: Throttle<Vec2>,
    threshold_px: f64,
    overlay_open: bool,
    selected: Option<PointId>,
    on_select: Option<SelectionCallback>,
}

impl InteractionController {
    pub fn new(threshold_px: f64, throttle: Duration) -> Self {
        Self {
            hover: HoverState::new(),
            throttle: Throttle::new(throttle),
            threshold_px,
            overlay_open: false,
            selected: None,
            on_select: None,
        }
    }

    pub fn set_selection_callback(&mut self, callback: Option<SelectionCallback>) {
        self.on_select = callback;
    }

    pub fn hover(&self) -> &HoverState {
        &self.hover
    }

    pub fn is_hovered(&self, id: &PointId) -> bool {
        self.hover.is_hovered(id)
    }

    pub fn selected(&self) -> Option<&PointId> {
        self.selected.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn overlay_open(&self) -> bool {
        self.overlay_open
    }

    pub fn threshold_px(&self) -> f64 {
        self.threshold_px
    }

    /// Opening the overlay clears hover and drops any pending pointer event.
    /// Returns `true` if a redraw is needed.
    pub fn set_overlay_open(&mut self, open: bool) -> bool {
        self.overlay_open = open;
        if !open {
            return false;
        }
        self.throttle.cancel();
        self.hover.clear()
    }

    /// Forgets all hover flags. Returns `true` if anything was hovered.
    pub fn clear_hover(&mut self) -> bool {
        self.hover.clear()
    }

    /// Drops pending pointer work and hover state.
    pub fn cancel(&mut self) {
        self.throttle.cancel();
        self.hover.clear();
    }

    /// Pointer moved. Events inside the throttle window are held back; only
    /// the latest is processed when the window reopens (see `poll`).
    pub fn on_pointer_move<S: RenderSession>(
        &mut self,
        now: Time,
        pointer: Vec2,
        session: &mut S,
        entities: &EntityManager,
    ) -> bool {
        if self.overlay_open {
            return false;
        }
        match self.throttle.offer(now, pointer) {
            Some(p) => self.resolve_hover(p, session, entities),
            None => false,
        }
    }

    /// Processes a held-back pointer event once the window has reopened.
    pub fn poll<S: RenderSession>(
        &mut self,
        now: Time,
        session: &mut S,
        entities: &EntityManager,
    ) -> bool {
        if self.overlay_open {
            return false;
        }
        match self.throttle.poll(now) {
            Some(p) => self.resolve_hover(p, session, entities),
            None => false,
        }
    }

    /// Recomputes hover flags for `pointer`. Returns `true` if any flag
    /// changed, in which case a render has been requested.
    pub fn resolve_hover<S: RenderSession>(
        &mut self,
        pointer: Vec2,
        session: &mut S,
        entities: &EntityManager,
    ) -> bool {
        let mut changed = false;

        let mut near: BTreeSet<&PointId> = BTreeSet::new();
        if let Some(probe) = session.globe_position_at(pointer) {
            for id in entities.grid().candidates(probe) {
                if !entities.is_live(id) {
                    continue;
                }
                let hovered = entities
                    .world_position(id)
                    .and_then(|w| session.world_to_screen(w))
                    .is_some_and(|px| px.distance(pointer) <= self.threshold_px);
                changed |= self.hover.set(id, hovered);
                near.insert(id);
            }
        }

        // Previously hovered markers outside the probed cell.
        let stale: Vec<PointId> = self
            .hover
            .hovered()
            .filter(|id| !near.contains(id))
            .cloned()
            .collect();
        for id in &stale {
            changed |= self.hover.set(id, false);
        }

        if changed {
            debug!(
                x = pointer.x,
                y = pointer.y,
                hovered = self.hover.hovered_count(),
                "hover changed"
            );
            session.request_render();
        }
        changed
    }

    pub fn on_click<S: RenderSession>(
        &mut self,
        pointer: Vec2,
        session: &S,
        entities: &EntityManager,
    ) -> ClickOutcome {
        if self.overlay_open {
            return ClickOutcome::Suppressed;
        }
        let Some(id) = session.pick(pointer) else {
            return ClickOutcome::Miss;
        };
        let Some(record) = entities.record(&id) else {
            return ClickOutcome::Miss;
        };
        match self.on_select.as_mut() {
            Some(callback) => {
                callback(record);
                ClickOutcome::Dispatched(id)
            }
            None => {
                self.selected = Some(id.clone());
                ClickOutcome::Selected(id)
            }
        }
    }
}

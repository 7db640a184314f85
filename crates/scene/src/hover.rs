use std::collections::BTreeMap;

use crate::points::PointId;

/// Per-point hover flags.
///
/// Renderers never copy these flags into marker objects; they ask
/// `is_hovered` while drawing, so flipping a flag only needs a redraw.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HoverState {
    states: BTreeMap<PointId, bool>,
}

impl HoverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hovered(&self, id: &PointId) -> bool {
        self.states.get(id).copied().unwrap_or(false)
    }

    /// Sets the flag for `id`.
    ///
    /// Returns `true` if the observable state changed. Unknown ids count as
    /// not hovered, so clearing one that was never set is not a change.
    pub fn set(&mut self, id: &PointId, hovered: bool) -> bool {
        if self.is_hovered(id) == hovered {
            return false;
        }
        self.states.insert(id.clone(), hovered);
        true
    }

    /// Ids currently hovered, ascending.
    pub fn hovered(&self) -> impl Iterator<Item = &PointId> + '_ {
        self.states.iter().filter(|(_, h)| **h).map(|(id, _)| id)
    }

    pub fn hovered_count(&self) -> usize {
        self.hovered().count()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forgets every flag. Returns `true` if anything was hovered.
    pub fn clear(&mut self) -> bool {
        let had_hover = self.hovered_count() > 0;
        self.states.clear();
        had_hover
    }
}

#[cfg(test)]
mod tests {
    use super::HoverState;
    use crate::points::PointId;

    #[test]
    fn set_reports_only_real_changes() {
        let mut h = HoverState::new();
        let a = PointId::new("a");
        assert!(!h.set(&a, false));
        assert!(h.set(&a, true));
        assert!(!h.set(&a, true));
        assert!(h.is_hovered(&a));
        assert!(h.set(&a, false));
        assert!(!h.is_hovered(&a));
    }

    #[test]
    fn clear_reports_whether_anything_was_visible() {
        let mut h = HoverState::new();
        assert!(!h.clear());
        h.set(&PointId::new("b"), true);
        h.set(&PointId::new("a"), true);
        let hovered: Vec<_> = h.hovered().map(|id| id.as_str()).collect();
        assert_eq!(hovered, vec!["a", "b"]);
        assert!(h.clear());
        assert!(h.is_empty());
    }
}

use crate::points::DisplayPoint;

const RULE: &str = "──────────";
const DEFAULT_ROLE: &str = "Mentor";

/// Camera-distance range (meters) in which labels may be drawn at all.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DistanceBand {
    pub near: f64,
    pub far: f64,
}

impl DistanceBand {
    pub fn contains(&self, distance: f64) -> bool {
        distance >= self.near && distance <= self.far
    }
}

impl Default for DistanceBand {
    fn default() -> Self {
        Self {
            near: 2.0e6,
            far: 2.0e7,
        }
    }
}

/// Hover label content for one marker.
///
/// Holds the raw fields; `text` assembles the string on demand so nothing is
/// formatted for the thousands of markers that are never hovered.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerLabel {
    pub name: String,
    pub role: Option<String>,
    pub institution: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub cluster_size: usize,
    pub band: DistanceBand,
}

impl MarkerLabel {
    pub fn for_point(point: &DisplayPoint) -> Self {
        let rec = &point.record;
        Self {
            name: rec.display_name.clone(),
            role: rec.current_role.clone(),
            institution: rec.institution.clone(),
            city: rec.city.clone(),
            country: rec.country.clone(),
            cluster_size: point.cluster_size,
            band: DistanceBand::default(),
        }
    }

    fn location(&self) -> Option<String> {
        match (self.city.as_deref(), self.country.as_deref()) {
            (Some(city), Some(country)) => Some(format!("{city}, {country}")),
            (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
            (None, None) => None,
        }
    }

    pub fn text(&self) -> String {
        let mut lines: Vec<String> = vec![self.name.clone(), RULE.to_string()];
        lines.push(
            self.role
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_ROLE)
                .to_string(),
        );
        if let Some(inst) = self.institution.as_deref().filter(|s| !s.is_empty()) {
            lines.push(inst.to_string());
        }
        if let Some(loc) = self.location() {
            lines.push(loc);
        }
        if self.cluster_size > 1 {
            lines.push(RULE.to_string());
            lines.push(format!("+{} more at this location", self.cluster_size - 1));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::{DistanceBand, MarkerLabel};
    use crate::cluster::resolve_display_points;
    use crate::points::PointRecord;
    use pretty_assertions::assert_eq;

    #[test]
    fn clustered_label_mentions_neighbours() {
        let mut a = PointRecord::new("a", "Grace Hopper", 40.0, -75.0);
        a.current_role = Some("Professor".into());
        a.institution = Some("Yale".into());
        a.city = Some("New Haven".into());
        a.country = Some("USA".into());
        let b = PointRecord::new("b", "Other", 40.0, -75.0);
        let c = PointRecord::new("c", "Third", 40.0, -75.0);
        let pts = resolve_display_points(&[a, b, c], 0.0001);

        let label = MarkerLabel::for_point(&pts[0]);
        assert_eq!(
            label.text(),
            "Grace Hopper\n──────────\nProfessor\nYale\nNew Haven, USA\n──────────\n+2 more at this location"
        );
    }

    #[test]
    fn sparse_record_falls_back_to_default_role() {
        let pts = resolve_display_points(&[PointRecord::new("x", "Solo", 1.0, 2.0)], 0.0001);
        let label = MarkerLabel::for_point(&pts[0]);
        assert_eq!(label.text(), "Solo\n──────────\nMentor");
    }

    #[test]
    fn band_is_inclusive() {
        let band = DistanceBand::default();
        assert!(band.contains(2.0e6));
        assert!(band.contains(2.0e7));
        assert!(!band.contains(1.0e6));
        assert!(!band.contains(3.0e7));
    }
}

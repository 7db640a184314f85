use foundation::math::{LatLng, Vec3};

use crate::points::{DisplayPoint, PointId};

/// Base icon scale for a marker standing alone.
pub const SINGLE_MARKER_SCALE: f64 = 0.3;
/// Clustered markers are drawn smaller so the spread stays legible.
pub const CLUSTER_MARKER_SCALE: f64 = 0.2;

/// Linear interpolation of a value by camera distance, clamped at both ends.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NearFarScalar {
    pub near: f64,
    pub near_value: f64,
    pub far: f64,
    pub far_value: f64,
}

impl NearFarScalar {
    pub fn new(near: f64, near_value: f64, far: f64, far_value: f64) -> Self {
        Self {
            near,
            near_value,
            far,
            far_value,
        }
    }

    pub fn value_at(&self, distance: f64) -> f64 {
        if self.far <= self.near {
            return self.near_value;
        }
        let t = ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0);
        self.near_value + (self.far_value - self.near_value) * t
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub icon: &'static str,
    pub base_scale: f64,
    pub scale_by_distance: NearFarScalar,
}

impl MarkerStyle {
    pub fn for_cluster_size(cluster_size: usize) -> Self {
        Self {
            icon: "/gps.png",
            base_scale: if cluster_size > 1 {
                CLUSTER_MARKER_SCALE
            } else {
                SINGLE_MARKER_SCALE
            },
            scale_by_distance: NearFarScalar::new(1.5e6, 1.0, 3.0e7, 0.1),
        }
    }
}

/// Everything a renderer needs to materialize one point marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub id: PointId,
    pub position: LatLng,
    /// ECEF position on the surface (meters).
    pub world: Vec3,
    pub style: MarkerStyle,
    /// Number of records sharing this marker's raw coordinate.
    pub cluster_size: usize,
}

impl MarkerSpec {
    pub fn for_point(point: &DisplayPoint) -> Self {
        Self {
            id: point.id().clone(),
            position: point.position,
            world: point.position.to_ecef(0.0).as_vec3(),
            style: MarkerStyle::for_cluster_size(point.cluster_size),
            cluster_size: point.cluster_size,
        }
    }

    /// On-screen icon scale when viewed from `camera_distance` meters.
    pub fn scale_at(&self, camera_distance: f64) -> f64 {
        self.style.base_scale * self.style.scale_by_distance.value_at(camera_distance)
    }

    /// Cluster badge text, e.g. `"3"`, for clustered markers only.
    pub fn cluster_badge(&self) -> Option<String> {
        (self.cluster_size > 1).then(|| self.cluster_size.to_string())
    }
}

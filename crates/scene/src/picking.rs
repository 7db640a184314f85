use foundation::math::{LatLng, Vec2, Vec3, WGS84_A, WGS84_B};

use crate::points::PointId;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

/// First intersection of `ray` with the WGS84 ellipsoid (ECEF meters).
///
/// Ellipsoid equation: (x/a)^2 + (y/a)^2 + (z/b)^2 = 1. Returns `None` when
/// the ray misses or the globe lies entirely behind the origin.
pub fn ray_globe_hit(ray: Ray) -> Option<Vec3> {
    let inv_a2 = 1.0 / (WGS84_A * WGS84_A);
    let inv_b2 = 1.0 / (WGS84_B * WGS84_B);
    let (o, d) = (ray.origin, ray.dir);

    let a = d.x * d.x * inv_a2 + d.y * d.y * inv_a2 + d.z * d.z * inv_b2;
    if a.abs() < 1e-30 {
        return None;
    }
    let b = 2.0 * (o.x * d.x * inv_a2 + o.y * d.y * inv_a2 + o.z * d.z * inv_b2);
    let c = o.x * o.x * inv_a2 + o.y * o.y * inv_a2 + o.z * o.z * inv_b2 - 1.0;

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t0 = (-b - sq) / (2.0 * a);
    let t1 = (-b + sq) / (2.0 * a);
    let t = if t0 >= 0.0 {
        t0
    } else if t1 >= 0.0 {
        t1
    } else {
        return None;
    };
    Some(ray.at(t))
}

/// Slack for points lying on the surface itself, in meters.
const OCCLUSION_EPSILON_M: f64 = 1.0;

/// Whether the globe hides `world` from `eye`.
pub fn globe_occludes(eye: Vec3, world: Vec3) -> bool {
    let to = world - eye;
    let Some(dir) = to.normalized() else {
        return false;
    };
    match ray_globe_hit(Ray::new(eye, dir)) {
        Some(hit) => (hit - eye).length() < to.length() - OCCLUSION_EPSILON_M,
        None => false,
    }
}

/// Surface coordinate under `ray`, if it hits the globe.
pub fn ray_globe_latlng(ray: Ray) -> Option<LatLng> {
    ray_globe_hit(ray).map(|p| LatLng::from_ecef(foundation::math::Ecef::from_vec3(p)))
}

/// Nearest screen-space marker within `radius_px` of `pointer`.
///
/// Ordering contract:
/// - The smallest pixel distance wins; equal distances go to the smaller id.
pub fn pick_nearest<'a, I>(markers: I, pointer: Vec2, radius_px: f64) -> Option<PointId>
where
    I: IntoIterator<Item = (&'a PointId, Vec2)>,
{
    let mut best: Option<(f64, &PointId)> = None;
    for (id, screen) in markers {
        let d = screen.distance(pointer);
        if d > radius_px {
            continue;
        }
        best = match best {
            Some((bd, bid)) if bd < d || (bd == d && bid <= id) => Some((bd, bid)),
            _ => Some((d, id)),
        };
    }
    best.map(|(_, id)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::{Ray, globe_occludes, pick_nearest, ray_globe_hit, ray_globe_latlng};
    use crate::points::PointId;
    use foundation::math::{LatLng, Vec2, Vec3, WGS84_A};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn ray_towards_center_hits_near_side() {
        let ray = Ray::new(Vec3::new(3.0 * WGS84_A, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let hit = ray_globe_hit(ray).unwrap();
        assert_close(hit.x, WGS84_A, 1e-6);
        let ll = ray_globe_latlng(ray).unwrap();
        assert_close(ll.lat, 0.0, 1e-9);
        assert_close(ll.lng, 0.0, 1e-9);
    }

    #[test]
    fn ray_into_space_misses() {
        let ray = Ray::new(Vec3::new(3.0 * WGS84_A, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        assert!(ray_globe_hit(ray).is_none());
        let away = Ray::new(Vec3::new(3.0 * WGS84_A, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(ray_globe_hit(away).is_none());
    }

    #[test]
    fn surface_point_round_trips_through_a_ray() {
        let target = LatLng::new(40.0, -75.0).to_ecef(0.0).as_vec3();
        let origin = target.scale(3.0);
        let ray = Ray::new(origin, (target - origin).normalized().unwrap());
        let ll = ray_globe_latlng(ray).unwrap();
        assert_close(ll.lat, 40.0, 1e-6);
        assert_close(ll.lng, -75.0, 1e-6);
    }

    #[test]
    fn far_side_of_the_globe_is_occluded() {
        let eye = LatLng::new(20.0, 0.0).to_ecef(2.0e7).as_vec3();
        let near = LatLng::new(20.0, 0.0).to_ecef(0.0).as_vec3();
        let limb = LatLng::new(20.0, 60.0).to_ecef(0.0).as_vec3();
        let far = LatLng::new(-20.0, 180.0).to_ecef(0.0).as_vec3();
        assert!(!globe_occludes(eye, near));
        assert!(!globe_occludes(eye, limb));
        assert!(globe_occludes(eye, far));
        assert!(!globe_occludes(eye, eye));
    }

    #[test]
    fn nearest_within_radius_wins_with_id_tiebreak() {
        let a = PointId::new("a");
        let b = PointId::new("b");
        let c = PointId::new("c");
        let markers = vec![
            (&b, Vec2::new(10.0, 0.0)),
            (&a, Vec2::new(0.0, 10.0)),
            (&c, Vec2::new(50.0, 50.0)),
        ];
        let hit = pick_nearest(markers.clone(), Vec2::new(0.0, 0.0), 12.0);
        assert_eq!(hit, Some(a.clone()));
        assert_eq!(pick_nearest(markers, Vec2::new(100.0, 100.0), 12.0), None);
    }
}

use foundation::math::{LatLng, Vec2, Vec3};

use crate::picking::Ray;

/// Drawing surface size in CSS pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A host container that has been laid out.
    pub fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn aspect(&self) -> f64 {
        if self.height <= 0.0 {
            1.0
        } else {
            (self.width / self.height).max(1e-6)
        }
    }
}

/// Perspective camera in ECEF meters.
///
/// Screen convention: origin top-left, x right, y down.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f64,
    pub near: f64,
    pub viewport: Viewport,
}

/// Orthonormal camera frame: forward, right, up.
#[derive(Debug, Copy, Clone)]
struct Basis {
    f: Vec3,
    s: Vec3,
    u: Vec3,
}

impl Camera {
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y_rad: f64, viewport: Viewport) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_rad,
            near: 1.0,
            viewport,
        }
    }

    /// Straight-down view of `over` from `height_m` above the surface, north up.
    pub fn overhead(over: LatLng, height_m: f64, viewport: Viewport) -> Self {
        let eye = over.to_ecef(height_m).as_vec3();
        Self::look_at(
            eye,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 1.0),
            60f64.to_radians(),
            viewport,
        )
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn distance_to(&self, world: Vec3) -> f64 {
        (world - self.eye).length()
    }

    fn basis(&self) -> Option<Basis> {
        let f = (self.target - self.eye).normalized()?;
        // Near the poles the configured up can be parallel to forward.
        let s = f
            .cross(self.up)
            .normalized()
            .or_else(|| f.cross(Vec3::new(1.0, 0.0, 0.0)).normalized())?;
        let u = s.cross(f);
        Some(Basis { f, s, u })
    }

    /// World-to-screen projection; `None` for points behind the near plane.
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let b = self.basis()?;
        let d = world - self.eye;
        let z = d.dot(b.f);
        if z <= self.near {
            return None;
        }
        let tan = (0.5 * self.fov_y_rad).tan();
        let ndc_x = d.dot(b.s) / (z * tan * self.viewport.aspect());
        let ndc_y = d.dot(b.u) / (z * tan);
        Some(Vec2::new(
            (ndc_x * 0.5 + 0.5) * self.viewport.width,
            (1.0 - (ndc_y * 0.5 + 0.5)) * self.viewport.height,
        ))
    }

    /// Ray from the eye through a screen position.
    pub fn screen_ray(&self, px: Vec2) -> Option<Ray> {
        if !self.viewport.is_usable() {
            return None;
        }
        let b = self.basis()?;
        let tan = (0.5 * self.fov_y_rad).tan();
        let ndc_x = (2.0 * (px.x / self.viewport.width) - 1.0) * self.viewport.aspect();
        let ndc_y = 1.0 - 2.0 * (px.y / self.viewport.height);
        let dir = b.f + b.s.scale(ndc_x * tan) + b.u.scale(ndc_y * tan);
        Some(Ray::new(self.eye, dir.normalized()?))
    }
}

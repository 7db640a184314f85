//! Seam between the viewer and the 3D rendering engine.
//!
//! The viewer never names a concrete renderer. A backend probes the host for
//! hardware rendering support and constructs sessions; a session is one live
//! renderer bound to the host container.

use std::fmt;

use foundation::math::{LatLng, Vec2, Vec3};
use scene::camera::Viewport;
use scene::markers::MarkerSpec;
use scene::points::PointId;

use crate::config::InitialView;

#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// No hardware rendering context could be obtained.
    NoRenderingContext,
    Unsupported(String),
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::NoRenderingContext => {
                f.write_str("hardware rendering is not supported or enabled on this device")
            }
            CapabilityError::Unsupported(msg) => write!(f, "rendering unsupported: {msg}"),
        }
    }
}

impl std::error::Error for CapabilityError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Construction(String),
    Render(String),
    Marker { id: PointId, reason: String },
    Destroyed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Construction(msg) => write!(f, "failed to construct renderer: {msg}"),
            SessionError::Render(msg) => write!(f, "render failed: {msg}"),
            SessionError::Marker { id, reason } => write!(f, "marker {id}: {reason}"),
            SessionError::Destroyed => f.write_str("renderer session already destroyed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Construction parameters handed to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub viewport: Viewport,
    pub tile_url: String,
    pub access_token: Option<String>,
    pub initial_view: InitialView,
    pub tile_resolution_scale: f64,
    pub msaa_samples: u32,
    pub camera_damping: f64,
    pub target_frame_rate: u32,
}

impl SessionSettings {
    pub fn initial_target(&self) -> LatLng {
        LatLng::new(self.initial_view.lat, self.initial_view.lng)
    }
}

/// Label text a renderer asks for while drawing a frame.
///
/// Called per marker per frame, so implementations must answer `None`
/// cheaply for markers that are not hovered.
pub trait LabelSource {
    fn label_for(&self, id: &PointId, camera_distance: f64) -> Option<String>;
}

/// Answers `None` for every marker.
pub struct NoLabels;

impl LabelSource for NoLabels {
    fn label_for(&self, _id: &PointId, _camera_distance: f64) -> Option<String> {
        None
    }
}

pub trait RenderSession {
    /// Draws one frame, pulling hover labels from `labels`.
    fn render(&mut self, labels: &dyn LabelSource) -> Result<(), SessionError>;
    /// Marks the scene dirty so the next frame is drawn.
    fn request_render(&mut self);
    /// Asks the host to call back on its next animation frame.
    fn request_frame(&mut self);
    fn resize(&mut self, viewport: Viewport);

    /// Surface coordinate under a screen position, `None` when off-globe.
    fn globe_position_at(&self, screen: Vec2) -> Option<LatLng>;
    /// Screen position of a world point, `None` when not on screen.
    fn world_to_screen(&self, world: Vec3) -> Option<Vec2>;
    /// Marker drawn under a screen position.
    fn pick(&self, screen: Vec2) -> Option<PointId>;

    fn add_marker(&mut self, marker: MarkerSpec) -> Result<(), SessionError>;
    fn remove_marker(&mut self, id: &PointId) -> bool;
    fn marker_count(&self) -> usize;

    /// Releases cached tile and geometry data the renderer can refetch.
    fn trim_caches(&mut self);
    fn destroy(&mut self) -> Result<(), SessionError>;
}

pub trait RenderBackend {
    type Session: RenderSession;

    fn probe_capability(&mut self) -> Result<(), CapabilityError>;
    fn create_session(&mut self, settings: &SessionSettings) -> Result<Self::Session, SessionError>;
}

//! Interactive mentor-location globe.
//!
//! `GlobeViewer` is the host-facing entry point. It owns the renderer
//! bootstrap, the marker lifecycle, pointer interaction and the periodic
//! cache cleanup, and talks to the actual renderer only through the traits in
//! [`engine`]. [`headless`] provides an in-memory renderer for tests and tools.

pub mod bootstrap;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod entities;
pub mod headless;
pub mod interaction;
pub mod profile;
pub mod viewer;

pub use bootstrap::{BootstrapFailure, RecoveryAction, RendererBootstrap, SessionStatus};
pub use config::{ConfigError, GlobeConfig, InitialView};
pub use engine::{CapabilityError, LabelSource, RenderBackend, RenderSession, SessionError};
pub use profile::{DeviceProfile, ProfileSettings};
pub use viewer::GlobeViewer;

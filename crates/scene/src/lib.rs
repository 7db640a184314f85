pub mod camera;
pub mod cluster;
pub mod hover;
pub mod labels;
pub mod markers;
pub mod picking;
pub mod points;
pub mod spatial;

pub use points::*;

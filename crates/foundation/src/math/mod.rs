pub mod ecef;
pub mod geodesy;
pub mod precision;
pub mod vec;

pub use ecef::*;
pub use geodesy::*;
pub use precision::*;
pub use vec::*;

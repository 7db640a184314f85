pub mod budget;
pub mod event_bus;
pub mod frame;
pub mod throttle;
pub mod timers;

pub use budget::*;
pub use event_bus::*;
pub use frame::*;
pub use throttle::*;
pub use timers::*;

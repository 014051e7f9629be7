#![doc = "Fixed-rate, single-threaded real-time executive core."]

pub mod executive;
pub mod frame;
pub mod gpio;
pub mod realtime;
pub mod schedule;
pub mod tick;
pub mod timer;

pub use executive::*;
pub use frame::*;
pub use gpio::*;
pub use realtime::*;
pub use schedule::*;
pub use tick::*;
pub use timer::*;

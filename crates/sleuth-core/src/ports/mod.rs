//! Ports - 抽象化レイヤー
//!
//! Seams that tests swap out: time and id generation.

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};

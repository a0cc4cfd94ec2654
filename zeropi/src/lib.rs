//! Drive a ZeroPi board (DC motors, servos, steppers, digital and analog pins)
//! over its serial command protocol.

mod board;
mod error;
pub mod script;
pub mod util;

pub use board::ZeroPi;
pub use error::Error;
pub use zeropi_commands::{Command, Reading};
pub use zeropi_core::Config;

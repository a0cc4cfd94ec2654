//! Host side of the ZeroPi serial command protocol.
//!
//! [protocol] holds the transport abstraction, the reply correlation and the task that
//! owns a connection; [serial] plugs a real serial port into it.

pub mod config;
pub mod error;
pub mod protocol;
pub mod serial;

pub use config::Config;
pub use error::Error;

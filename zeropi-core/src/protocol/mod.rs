//! Definitions for the text protocol spoken over serial.
//!
//! AsyncSerial is an abstraction over serial, it should be implemented by every transport we support.
//! In correlator mod there is the heavy lifting: framing outgoing commands and matching replies to callbacks.
//! In connection mod a single task owns the transport and the correlator, and hands out [CoreHandle]s.
//!
//! Lines going out look like `\nM13 A10\n`, lines coming back like `R13 A10 L512 OK` or `M56 OK`.

use std::{future::Future, io};

mod connection;
mod correlator;
mod lines;
pub use connection::{Core, CoreHandle, MAX_READ_ERRORS};
pub use correlator::{Callback, Correlator};
pub use lines::{LineBuffer, MAX_LINE_LEN};

pub mod test_harness;

/// Byte stream abstraction, implemented for the real serial port and for in-memory test pairs.
pub trait AsyncSerial: Send + 'static {
    /// reads whatever is available into `buf`, `Ok(0)` means the link is gone
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
    /// writes the whole of `buf`
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

/// Signals a transport raises towards the [Correlator].
#[derive(Debug)]
pub enum TransportEvent {
    /// the link is ready, raised once
    Open,
    /// raw bytes, not necessarily aligned to lines
    Data(Vec<u8>),
    /// non-fatal transport failure
    Error(io::Error),
    /// the link went away, nothing more will be read
    Disconnect,
}

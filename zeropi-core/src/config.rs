/// Serial device the board is wired to on a Raspberry Pi.
pub const DEFAULT_PATH: &str = "/dev/ttyAMA0";
/// Baud rate the board firmware listens at.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// device path of the serial port
    pub path: String,
    pub baud_rate: u32,
    /// log every line sent and received
    pub debug: bool,
    /// Buffer incoming bytes and split them on `\n` before matching replies.
    ///
    /// When off, every chunk the transport delivers is treated as exactly one reply.
    pub reassemble_lines: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            debug: false,
            reassemble_lines: false,
        }
    }
}

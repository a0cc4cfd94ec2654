use thiserror::Error;

/// Failures a caller can act on.
///
/// Transport errors, disconnects and failed writes happen inside the connection task and
/// are only logged; malformed or unmatched replies are dropped without a trace.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open serial port: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("the port is not open yet, wait for it to open before writing")]
    NotOpen,

    #[error("the connection task has stopped")]
    Closed,

    #[error("the callback for `{0}` was replaced before a reply arrived")]
    Superseded(String),

    #[error("the reply to `{0}` carried no value")]
    MissingValue(String),
}

pub type Result<T> = core::result::Result<T, Error>;

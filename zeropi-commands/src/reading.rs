use serde::{Deserialize, Serialize};

use crate::Command;

/// The outcome of a read-style command, as reported by the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// The command text that was sent, e.g. `M13 A10`.
    pub command: String,
    /// The key the reply was matched on, e.g. `R13 A10`.
    pub key: String,
    /// The value after `L` in the reply, if the board sent one.
    pub value: Option<i64>,
}

impl Reading {
    /// Builds the reading for `command`, or `None` if it never gets a reply.
    pub fn new(command: &Command, value: Option<i64>) -> Option<Reading> {
        Some(Reading {
            command: command.to_string(),
            key: command.reply_key()?,
            value,
        })
    }
}

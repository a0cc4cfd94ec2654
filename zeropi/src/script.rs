//! Running lists of commands, e.g. loaded from a JSON file:
//!
//! ```json
//! [
//!     {"command": "steppers_enable"},
//!     {"command": "stepper_move_to", "device": 0, "position": 200, "speed": 1000},
//!     {"command": "analog_read", "pin": 3}
//! ]
//! ```

use std::path::Path;

use zeropi_commands::{Command, Reading};

use crate::{util::serde::deserialize_from_json_file, Error, ZeroPi};

pub fn load_script(file: &Path) -> Result<Vec<Command>, Error> {
    deserialize_from_json_file(file)
}

/// Sends `command`, returning what the board answered for read-style commands.
pub async fn execute(zeropi: &ZeroPi, command: &Command) -> Result<Option<Reading>, Error> {
    let value = zeropi.send(command).await?;
    Ok(Reading::new(command, value))
}

/// Runs `commands` one after the other, stopping at the first error.
pub async fn run_script(zeropi: &ZeroPi, commands: &[Command]) -> Result<Vec<Reading>, Error> {
    let mut readings = Vec::new();
    for command in commands {
        if let Some(reading) = execute(zeropi, command).await? {
            readings.push(reading);
        }
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempdir::TempDir;
    use test_log::test;
    use zeropi_core::Config;

    use super::*;
    use crate::util::serial::SerialPorts;

    #[test]
    fn load_from_file() {
        let dir = TempDir::new("zeropi").unwrap();
        let file = dir.path().join("script.json");
        fs::write(
            &file,
            r#"[{"command": "digital_read", "pin": 2}, {"command": "steppers_disable"}]"#,
        )
        .unwrap();
        assert_eq!(
            load_script(&file).unwrap(),
            vec![Command::DigitalRead { pin: 2 }, Command::SteppersDisable]
        );
    }

    #[test]
    fn load_errors() {
        let dir = TempDir::new("zeropi").unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(load_script(&missing), Err(Error::Io { .. })));

        let invalid = dir.path().join("invalid.json");
        fs::write(&invalid, r#"[{"command": "fly"}]"#).unwrap();
        assert!(matches!(load_script(&invalid), Err(Error::Json(_))));
    }

    #[test(tokio::test)]
    async fn run_on_simulated_board() {
        let (zeropi, _join_handles) = SerialPorts::Simulated.connect(&Config::default()).unwrap();
        zeropi.opened().await.unwrap();
        let readings = run_script(
            &zeropi,
            &[
                Command::SteppersEnable,
                Command::AnalogRead { pin: 3 },
                Command::StepperMove { device: 1, distance: -20, speed: 100 },
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            readings,
            vec![
                Reading {
                    command: "M13 A3".to_string(),
                    key: "R13 A3".to_string(),
                    value: Some(0),
                },
                Reading {
                    command: "M52 D1 R-20 F100".to_string(),
                    key: "R52 D1".to_string(),
                    value: Some(0),
                },
            ]
        );
    }
}

use defmt_or_log::info;
use tokio::task::JoinHandle;
use zeropi_core::{
    Config,
    protocol::{
        Core,
        test_harness::{FakeBoard, Testable},
    },
};

use crate::{Error, ZeroPi};

#[derive(Debug, Clone, PartialEq)]
pub enum SerialPorts {
    /// talk to an in-process fake board instead of real hardware
    Simulated,
    Path(String),
}

impl SerialPorts {
    pub fn parse(s: &str) -> SerialPorts {
        if s == "simulated" {
            SerialPorts::Simulated
        } else {
            SerialPorts::Path(s.to_string())
        }
    }

    /// Opens the connection and spawns the tasks serving it.
    pub fn connect(&self, config: &Config) -> Result<(ZeroPi, Vec<JoinHandle<()>>), Error> {
        match self {
            SerialPorts::Simulated => Ok(Self::connect_simulated(config)),
            SerialPorts::Path(path) => {
                let config = Config {
                    path: path.clone(),
                    ..config.clone()
                };
                let (core, join_handle) = Core::open(&config)?;
                Ok((ZeroPi::new(core), vec![join_handle]))
            }
        }
    }

    fn connect_simulated(config: &Config) -> (ZeroPi, Vec<JoinHandle<()>>) {
        info!("Using a simulated board");
        let (host, device) = Testable::new();
        let board = FakeBoard::new(device);
        let board_handle = tokio::spawn(board.run());
        let (core, core_handle) = Core::spawn(host, config);
        (ZeroPi::new(core), vec![core_handle, board_handle])
    }

    /// Ports found on this machine, for when the user doesn't know which one to pick.
    pub fn available() -> Result<Vec<String>, Error> {
        Ok(zeropi_core::serial::available_ports()?)
    }
}

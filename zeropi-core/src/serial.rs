/*!
Real serial port support
*/
use std::io;

use defmt_or_log::info;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    task::JoinHandle,
};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::{
    error::Result,
    protocol::{AsyncSerial, Core, CoreHandle},
    Config,
};

/// implement AsyncSerial for SerialStream
impl AsyncSerial for SerialStream {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        AsyncReadExt::read(self, buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(self, buf).await?;
        AsyncWriteExt::flush(self).await
    }
}

/// Opens the port described by `config`, 8N1 without flow control.
pub fn open_port(config: &Config) -> Result<SerialStream> {
    info!("Opening serial port {} at {} baud", config.path, config.baud_rate);
    let port = tokio_serial::new(config.path.as_str(), config.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()?;
    Ok(port)
}

/// Names of the serial ports found on this machine.
pub fn available_ports() -> Result<Vec<String>> {
    Ok(tokio_serial::available_ports()?
        .into_iter()
        .map(|port| port.port_name)
        .collect())
}

impl Core<SerialStream> {
    /// Opens the configured port and spawns the connection task for it.
    pub fn open(config: &Config) -> Result<(CoreHandle, JoinHandle<()>)> {
        let port = open_port(config)?;
        Ok(Core::spawn(port, config))
    }
}

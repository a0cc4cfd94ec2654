use defmt_or_log::debug;
use zeropi_commands::Command;
use zeropi_core::{Error, error::Result, protocol::CoreHandle};

/// The board's actions as methods, on top of a connection to it.
///
/// Commands without a reply return as soon as they are handed to the connection.
/// Reads and stepper moves wait for the board to answer.
#[derive(Debug, Clone)]
pub struct ZeroPi {
    core: CoreHandle,
}

impl ZeroPi {
    pub fn new(core: CoreHandle) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &CoreHandle {
        &self.core
    }

    /// Resolves once the serial port is open, nothing can be sent before that.
    pub async fn opened(&self) -> Result<()> {
        self.core.opened().await
    }

    /// Sends any command, waiting for its reply if it gets one.
    pub async fn send(&self, command: &Command) -> Result<Option<i64>> {
        debug!("ZeroPi::send: {:?}", command);
        match command.reply_key() {
            Some(key) => self.core.query(key, command.to_string()).await,
            None => self.core.write(command.to_string()).map(|()| None),
        }
    }

    fn write(&self, command: Command) -> Result<()> {
        self.core.write(command.to_string())
    }

    async fn read(&self, command: Command) -> Result<i64> {
        self.send(&command).await?.ok_or_else(|| {
            Error::MissingValue(command.reply_key().unwrap_or_else(|| command.to_string()))
        })
    }

    /// See [Command::DigitalWrite].
    pub fn digital_write(&self, pin: u32, level: u8) -> Result<()> {
        self.write(Command::DigitalWrite { pin, level })
    }

    /// See [Command::PwmWrite].
    pub fn pwm_write(&self, pin: u32, pwm: u32) -> Result<()> {
        self.write(Command::PwmWrite { pin, pwm })
    }

    /// See [Command::DigitalRead].
    pub async fn digital_read(&self, pin: u32) -> Result<i64> {
        self.read(Command::DigitalRead { pin }).await
    }

    /// See [Command::AnalogRead].
    pub async fn analog_read(&self, pin: u32) -> Result<i64> {
        self.read(Command::AnalogRead { pin }).await
    }

    /// See [Command::DcMotorRun].
    pub fn dc_motor_run(&self, device: u32, pwm: i32) -> Result<()> {
        self.write(Command::DcMotorRun { device, pwm })
    }

    /// See [Command::DcMotorStop].
    pub fn dc_motor_stop(&self, device: u32) -> Result<()> {
        self.write(Command::DcMotorStop { device })
    }

    /// See [Command::ServoRun].
    pub fn servo_run(&self, device: u32, angle: u32) -> Result<()> {
        self.write(Command::ServoRun { device, angle })
    }

    /// See [Command::StepperRun].
    pub fn stepper_run(&self, device: u32, speed: i32) -> Result<()> {
        self.write(Command::StepperRun { device, speed })
    }

    /// See [Command::StepperMove]. Resolves when the board reports the move done.
    pub async fn stepper_move(&self, device: u32, distance: i64, speed: u32) -> Result<Option<i64>> {
        self.send(&Command::StepperMove {
            device,
            distance,
            speed,
        })
        .await
    }

    /// See [Command::StepperMoveTo]. Resolves when the board reports the move done.
    pub async fn stepper_move_to(&self, device: u32, position: i64, speed: u32) -> Result<Option<i64>> {
        self.send(&Command::StepperMoveTo {
            device,
            position,
            speed,
        })
        .await
    }

    /// See [Command::StepperSetting].
    pub fn stepper_setting(&self, device: u32, microstep: u32, acceleration: u32) -> Result<()> {
        self.write(Command::StepperSetting {
            device,
            microstep,
            acceleration,
        })
    }

    /// See [Command::StepperStop].
    pub fn stepper_stop(&self, device: u32) -> Result<()> {
        self.write(Command::StepperStop { device })
    }

    /// See [Command::SteppersEnable].
    pub fn steppers_enable(&self) -> Result<()> {
        self.write(Command::SteppersEnable)
    }

    /// See [Command::SteppersDisable].
    pub fn steppers_disable(&self) -> Result<()> {
        self.write(Command::SteppersDisable)
    }
}

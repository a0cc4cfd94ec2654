use core::fmt;

use serde::{Deserialize, Serialize};

/// Every action the board firmware understands.
///
/// The [fmt::Display] implementation renders the command text that goes on the wire
/// (without the surrounding newlines), e.g. `M11 D10 L1`. Read-style commands also
/// have a [Command::reply_key], the prefix of the line the board answers with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::Subcommand))]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Set a digital pin high (1) or low (0).
    DigitalWrite { pin: u32, level: u8 },
    /// Drive a pin with a PWM duty cycle.
    PwmWrite { pin: u32, pwm: u32 },
    /// Read the level of a digital pin.
    DigitalRead { pin: u32 },
    /// Read the value of an analog pin.
    AnalogRead { pin: u32 },
    /// Run a DC motor, the sign of `pwm` is the direction.
    #[cfg_attr(feature = "clap", command(allow_negative_numbers = true))]
    DcMotorRun { device: u32, pwm: i32 },
    /// Stop a DC motor.
    DcMotorStop { device: u32 },
    /// Move a servo to `angle` degrees.
    ServoRun { device: u32, angle: u32 },
    /// Spin a stepper continuously, the sign of `speed` is the direction.
    #[cfg_attr(feature = "clap", command(allow_negative_numbers = true))]
    StepperRun { device: u32, speed: i32 },
    /// Move a stepper by `distance` steps relative to where it is.
    #[cfg_attr(feature = "clap", command(allow_negative_numbers = true))]
    StepperMove { device: u32, distance: i64, speed: u32 },
    /// Move a stepper to the absolute `position`.
    #[cfg_attr(feature = "clap", command(allow_negative_numbers = true))]
    StepperMoveTo { device: u32, position: i64, speed: u32 },
    /// Configure microstepping and acceleration of a stepper.
    StepperSetting {
        device: u32,
        microstep: u32,
        acceleration: u32,
    },
    /// Stop a stepper.
    StepperStop { device: u32 },
    /// Energize all stepper drivers.
    SteppersEnable,
    /// Release all stepper drivers.
    SteppersDisable,
}

impl Command {
    /// The correlation key of the reply this command gets, `None` for fire-and-forget commands.
    ///
    /// Both stepper moves on a device share the same key, so a second move replaces
    /// the completion of the first one.
    pub fn reply_key(&self) -> Option<String> {
        match self {
            Command::DigitalRead { pin } => Some(format!("R12 D{pin}")),
            Command::AnalogRead { pin } => Some(format!("R13 A{pin}")),
            Command::StepperMove { device, .. } | Command::StepperMoveTo { device, .. } => {
                Some(format!("R52 D{device}"))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::DigitalWrite { pin, level } => write!(f, "M11 D{pin} L{level}"),
            Command::PwmWrite { pin, pwm } => write!(f, "M11 D{pin} P{pwm}"),
            Command::DigitalRead { pin } => write!(f, "M12 D{pin}"),
            Command::AnalogRead { pin } => write!(f, "M13 A{pin}"),
            Command::DcMotorRun { device, pwm } => write!(f, "M21 D{device} P{pwm}"),
            Command::DcMotorStop { device } => write!(f, "M22 D{device}"),
            Command::ServoRun { device, angle } => write!(f, "M41 D{device} A{angle}"),
            Command::StepperRun { device, speed } => write!(f, "M51 D{device} F{speed}"),
            Command::StepperMove {
                device,
                distance,
                speed,
            } => write!(f, "M52 D{device} R{distance} F{speed}"),
            Command::StepperMoveTo {
                device,
                position,
                speed,
            } => write!(f, "M52 D{device} A{position} F{speed}"),
            Command::StepperSetting {
                device,
                microstep,
                acceleration,
            } => write!(f, "M53 D{device} S{microstep} A{acceleration}"),
            Command::StepperStop { device } => write!(f, "M54 D{device}"),
            Command::SteppersEnable => f.write_str("M56"),
            Command::SteppersDisable => f.write_str("M57"),
        }
    }
}

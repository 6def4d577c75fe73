/*!
 * Decoded values and write commands.
 *
 * `Reading` is what comes back from a read or a change notification,
 * `Command` is what a caller hands to a write. Both are tagged unions over
 * every feature so a session can carry them on a single event stream.
 */
use serde::{Deserialize, Serialize};

use crate::adpcm::PcmFrame;
use crate::configuration::{
    AdvertisingParameters, AdvertisingUpdate, ConnectionParameters, ConnectionUpdate,
    FirmwareVersion, MtuRequest,
};
use crate::environment::{
    Color, EnvironmentConfig, EnvironmentConfigUpdate, Gas, Humidity, Pressure, Temperature,
};
use crate::motion::{
    EulerAngles, Heading, MotionConfig, MotionConfigUpdate, Quaternion, RawMotion, RotationMatrix,
    StepCount, Tap, Vector3,
};
use crate::sound::{SoundConfig, SoundConfigUpdate, SpeakerCommand};
use crate::user_interface::{Button, LedMode};

/// A decoded value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reading {
    /// Device name
    Name(String),
    /// Advertising parameters
    AdvertisingParameters(AdvertisingParameters),
    /// Connection parameters
    ConnectionParameters(ConnectionParameters),
    /// Eddystone URL
    Eddystone(String),
    /// Cloud token
    CloudToken(String),
    /// Firmware version
    Firmware(FirmwareVersion),
    /// MTU
    Mtu(u16),
    /// Temperature
    Temperature(Temperature),
    /// Pressure
    Pressure(Pressure),
    /// Humidity
    Humidity(Humidity),
    /// Gas
    Gas(Gas),
    /// Color
    Color(Color),
    /// Environment configuration
    EnvironmentConfiguration(EnvironmentConfig),
    /// LED state
    Led(LedMode),
    /// Button state
    Button(Button),
    /// Motion configuration
    MotionConfiguration(MotionConfig),
    /// Tap
    Tap(Tap),
    /// Orientation code
    AbsoluteOrientation(u8),
    /// Quaternion
    Quaternion(Quaternion),
    /// Step counter
    StepCounter(StepCount),
    /// Raw motion data
    RawData(RawMotion),
    /// Euler angles
    Euler(EulerAngles),
    /// Rotation matrix
    RotationMatrix(RotationMatrix),
    /// Heading
    Heading(Heading),
    /// Gravity vector
    Gravity(Vector3),
    /// Sound configuration
    SoundConfiguration(SoundConfig),
    /// Speaker status
    SpeakerStatus(i8),
    /// Microphone audio
    Microphone(PcmFrame),
    /// Battery level, percent
    Battery(u8),
}

/// A value to write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Command {
    /// Device name
    Name(String),
    /// Advertising parameters update
    AdvertisingParameters(AdvertisingUpdate),
    /// Connection parameters update
    ConnectionParameters(ConnectionUpdate),
    /// Eddystone URL
    Eddystone(String),
    /// Cloud token
    CloudToken(String),
    /// MTU request
    Mtu(MtuRequest),
    /// Environment configuration update
    EnvironmentConfiguration(EnvironmentConfigUpdate),
    /// LED state
    Led(LedMode),
    /// Motion configuration update
    MotionConfiguration(MotionConfigUpdate),
    /// Sound configuration update
    SoundConfiguration(SoundConfigUpdate),
    /// Speaker data
    Speaker(SpeakerCommand),
}

impl Command {
    /// Variant name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Name(_) => "name",
            Command::AdvertisingParameters(_) => "advertising parameters",
            Command::ConnectionParameters(_) => "connection parameters",
            Command::Eddystone(_) => "eddystone",
            Command::CloudToken(_) => "cloud token",
            Command::Mtu(_) => "mtu",
            Command::EnvironmentConfiguration(_) => "environment configuration",
            Command::Led(_) => "led",
            Command::MotionConfiguration(_) => "motion configuration",
            Command::SoundConfiguration(_) => "sound configuration",
            Command::Speaker(_) => "speaker",
        }
    }
}

impl From<LedMode> for Command {
    fn from(mode: LedMode) -> Self {
        Command::Led(mode)
    }
}

impl From<SpeakerCommand> for Command {
    fn from(command: SpeakerCommand) -> Self {
        Command::Speaker(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_interface::LedColor;

    #[test]
    fn test_reading_serializes_tagged() {
        let reading = Reading::Temperature(Temperature { celsius: 22.5 });
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["kind"], "temperature");
        assert_eq!(json["value"]["celsius"], 22.5);
    }

    #[test]
    fn test_command_from_led() {
        let command: Command = LedMode::Breathe {
            color: LedColor::Red,
            intensity: 50,
            delay: 1000,
        }
        .into();
        assert_eq!(command.kind(), "led");
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["value"]["mode"], "breathe");
        assert_eq!(json["value"]["color"], "red");
    }
}

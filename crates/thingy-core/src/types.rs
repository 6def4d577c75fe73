/*!
 * Identifiers shared across the Thingy crates.
 *
 * `Id` names a physical device (and therefore its session), `FeatureId`
 * names one logical capability of that device and `MethodKind` names the
 * transaction a feature operation is performing.
 */
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Identifier of a physical device and of the session bound to it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id(String);

impl Id {
    /// Create a new ID with a random UUID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an ID from a peripheral address or any other stable string
    pub fn from_string<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_string())
    }

    /// Get the string representation of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Every logical capability exposed by the device.
///
/// The serialized form is the lowercase feature name used on the event
/// stream, e.g. `"temperature"` or `"rotationmatrixorientation"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureId {
    /// Device name
    Name,
    /// Advertising interval and timeout
    AdvertisingParameters,
    /// Connection interval, latency and supervision timeout
    ConnectionParameters,
    /// Eddystone URL beacon
    Eddystone,
    /// Cloud token
    CloudToken,
    /// Firmware version
    Firmware,
    /// Preferred MTU
    Mtu,
    /// Temperature in Celsius
    Temperature,
    /// Pressure in hPa
    Pressure,
    /// Relative humidity
    Humidity,
    /// eCO2 and TVOC
    Gas,
    /// Color sensor
    Color,
    /// Environment sensor intervals and calibration
    EnvironmentConfiguration,
    /// RGB LED
    Led,
    /// Push button
    Button,
    /// Motion processing configuration
    MotionConfiguration,
    /// Tap detection
    Tap,
    /// Portrait/landscape orientation
    AbsoluteOrientation,
    /// Orientation quaternion
    QuaternionOrientation,
    /// Pedometer
    StepCounter,
    /// Raw accelerometer, gyroscope and compass
    RawData,
    /// Euler angles
    EulerOrientation,
    /// Rotation matrix
    RotationMatrixOrientation,
    /// Compass heading
    Heading,
    /// Gravity vector
    GravityVector,
    /// Speaker and microphone modes
    SoundConfiguration,
    /// Speaker playback data
    SpeakerData,
    /// Speaker status
    SpeakerStatus,
    /// ADPCM microphone stream
    Microphone,
    /// Battery level
    Battery,
}

impl FeatureId {
    /// All features, in catalog order
    pub const ALL: [FeatureId; 30] = [
        FeatureId::Name,
        FeatureId::AdvertisingParameters,
        FeatureId::ConnectionParameters,
        FeatureId::Eddystone,
        FeatureId::CloudToken,
        FeatureId::Firmware,
        FeatureId::Mtu,
        FeatureId::Temperature,
        FeatureId::Pressure,
        FeatureId::Humidity,
        FeatureId::Gas,
        FeatureId::Color,
        FeatureId::EnvironmentConfiguration,
        FeatureId::Led,
        FeatureId::Button,
        FeatureId::MotionConfiguration,
        FeatureId::Tap,
        FeatureId::AbsoluteOrientation,
        FeatureId::QuaternionOrientation,
        FeatureId::StepCounter,
        FeatureId::RawData,
        FeatureId::EulerOrientation,
        FeatureId::RotationMatrixOrientation,
        FeatureId::Heading,
        FeatureId::GravityVector,
        FeatureId::SoundConfiguration,
        FeatureId::SpeakerData,
        FeatureId::SpeakerStatus,
        FeatureId::Microphone,
        FeatureId::Battery,
    ];

    /// The feature name used on the event stream
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureId::Name => "name",
            FeatureId::AdvertisingParameters => "advertisingparameters",
            FeatureId::ConnectionParameters => "connectionparameters",
            FeatureId::Eddystone => "eddystone",
            FeatureId::CloudToken => "cloudtoken",
            FeatureId::Firmware => "firmware",
            FeatureId::Mtu => "mtu",
            FeatureId::Temperature => "temperature",
            FeatureId::Pressure => "pressure",
            FeatureId::Humidity => "humidity",
            FeatureId::Gas => "gas",
            FeatureId::Color => "color",
            FeatureId::EnvironmentConfiguration => "environmentconfiguration",
            FeatureId::Led => "led",
            FeatureId::Button => "button",
            FeatureId::MotionConfiguration => "motionconfiguration",
            FeatureId::Tap => "tap",
            FeatureId::AbsoluteOrientation => "absoluteorientation",
            FeatureId::QuaternionOrientation => "quaternionorientation",
            FeatureId::StepCounter => "stepcounter",
            FeatureId::RawData => "rawdata",
            FeatureId::EulerOrientation => "eulerorientation",
            FeatureId::RotationMatrixOrientation => "rotationmatrixorientation",
            FeatureId::Heading => "heading",
            FeatureId::GravityVector => "gravityvector",
            FeatureId::SoundConfiguration => "soundconfiguration",
            FeatureId::SpeakerData => "speakerdata",
            FeatureId::SpeakerStatus => "speakerstatus",
            FeatureId::Microphone => "microphone",
            FeatureId::Battery => "battery",
        }
    }

    /// Position of this feature in [`FeatureId::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureId::ALL
            .iter()
            .copied()
            .find(|feature| feature.as_str() == s)
            .ok_or_else(|| Error::not_found(format!("Unknown feature '{}'", s)))
    }
}

/// The kind of transaction a feature operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Resolve the service and attribute handles
    Connect,
    /// Read the attribute
    Read,
    /// Write the attribute
    Write,
    /// Enable change notifications
    StartNotify,
    /// Disable change notifications
    StopNotify,
}

impl MethodKind {
    /// Lowercase method name for logs and spans
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Connect => "connect",
            MethodKind::Read => "read",
            MethodKind::Write => "write",
            MethodKind::StartNotify => "start_notify",
            MethodKind::StopNotify => "stop_notify",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

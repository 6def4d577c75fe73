/*!
 * Per-feature codec descriptors.
 *
 * A [`Codec`] bundles the optional decoder and encoder of one feature.
 * Encoders of multi-field registers are read-modify-write: the caller
 * validates the command, reads the register, then merges.
 */
use thingy_core::error::{Error, Result};
use thingy_core::types::FeatureId;

use crate::reading::{Command, Reading};
use crate::{adpcm, battery, configuration, eddystone, environment, motion, sound, user_interface};

/// Decoder signature
pub type DecodeFn = fn(&[u8]) -> Result<Reading>;
/// Encoder signature for registers written whole
pub type EncodeFn = fn(&Command) -> Result<Vec<u8>>;
/// Validation signature for read-modify-write registers
pub type ValidateFn = fn(&Command) -> Result<()>;
/// Merge signature for read-modify-write registers: command plus current bytes
pub type MergeFn = fn(&Command, &[u8]) -> Result<Vec<u8>>;

/// How a feature turns a command into bytes
#[derive(Debug, Clone, Copy)]
pub enum Encoder {
    /// The command alone determines the bytes
    Direct(EncodeFn),
    /// Unspecified fields come from a fresh read of the register
    ReadModifyWrite {
        /// Checks the command before anything is read
        validate: ValidateFn,
        /// Builds the bytes from the command and the current register
        merge: MergeFn,
    },
}

/// Decoder and encoder of one feature
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    decoder: Option<DecodeFn>,
    encoder: Option<Encoder>,
}

macro_rules! expect_command {
    ($command:expr, $variant:path, $name:literal) => {
        match $command {
            $variant(inner) => inner,
            other => {
                return Err(Error::validation(format!(
                    "malformed command: expected {}, got {}",
                    $name,
                    other.kind()
                )))
            }
        }
    };
}

impl Codec {
    /// A codec that only decodes
    pub const fn read_only(decoder: DecodeFn) -> Self {
        Self {
            decoder: Some(decoder),
            encoder: None,
        }
    }

    /// A codec that only encodes
    pub const fn write_only(encoder: Encoder) -> Self {
        Self {
            decoder: None,
            encoder: Some(encoder),
        }
    }

    /// A codec that decodes and encodes
    pub const fn read_write(decoder: DecodeFn, encoder: Encoder) -> Self {
        Self {
            decoder: Some(decoder),
            encoder: Some(encoder),
        }
    }

    /// The codec of `feature`
    pub fn for_feature(feature: FeatureId) -> Self {
        use Encoder::{Direct, ReadModifyWrite};

        match feature {
            FeatureId::Name => Codec::read_write(
                |raw| configuration::decode_name(raw).map(Reading::Name),
                Direct(|c| configuration::encode_name(expect_command!(c, Command::Name, "name"))),
            ),
            FeatureId::AdvertisingParameters => Codec::read_write(
                |raw| {
                    configuration::decode_advertising(raw).map(Reading::AdvertisingParameters)
                },
                ReadModifyWrite {
                    validate: |c| {
                        expect_command!(
                            c,
                            Command::AdvertisingParameters,
                            "advertising parameters"
                        )
                        .validate()
                    },
                    merge: |c, current| {
                        configuration::encode_advertising(
                            expect_command!(
                                c,
                                Command::AdvertisingParameters,
                                "advertising parameters"
                            ),
                            current,
                        )
                    },
                },
            ),
            FeatureId::ConnectionParameters => Codec::read_write(
                |raw| configuration::decode_connection(raw).map(Reading::ConnectionParameters),
                ReadModifyWrite {
                    validate: |c| {
                        expect_command!(c, Command::ConnectionParameters, "connection parameters")
                            .validate()
                    },
                    merge: |c, current| {
                        configuration::encode_connection(
                            expect_command!(
                                c,
                                Command::ConnectionParameters,
                                "connection parameters"
                            ),
                            current,
                        )
                    },
                },
            ),
            FeatureId::Eddystone => Codec::read_write(
                |raw| eddystone::decode_url(raw).map(Reading::Eddystone),
                Direct(|c| {
                    eddystone::encode_url(expect_command!(c, Command::Eddystone, "eddystone"))
                }),
            ),
            FeatureId::CloudToken => Codec::read_write(
                |raw| configuration::decode_cloud_token(raw).map(Reading::CloudToken),
                Direct(|c| {
                    configuration::encode_cloud_token(expect_command!(
                        c,
                        Command::CloudToken,
                        "cloud token"
                    ))
                }),
            ),
            FeatureId::Firmware => {
                Codec::read_only(|raw| configuration::decode_firmware(raw).map(Reading::Firmware))
            }
            FeatureId::Mtu => Codec::read_write(
                |raw| configuration::decode_mtu(raw).map(Reading::Mtu),
                Direct(|c| configuration::encode_mtu(expect_command!(c, Command::Mtu, "mtu"))),
            ),
            FeatureId::Temperature => Codec::read_only(|raw| {
                environment::decode_temperature(raw).map(Reading::Temperature)
            }),
            FeatureId::Pressure => {
                Codec::read_only(|raw| environment::decode_pressure(raw).map(Reading::Pressure))
            }
            FeatureId::Humidity => {
                Codec::read_only(|raw| environment::decode_humidity(raw).map(Reading::Humidity))
            }
            FeatureId::Gas => {
                Codec::read_only(|raw| environment::decode_gas(raw).map(Reading::Gas))
            }
            FeatureId::Color => {
                Codec::read_only(|raw| environment::decode_color(raw).map(Reading::Color))
            }
            FeatureId::EnvironmentConfiguration => Codec::read_write(
                |raw| {
                    environment::decode_environment_config(raw)
                        .map(Reading::EnvironmentConfiguration)
                },
                ReadModifyWrite {
                    validate: |c| {
                        expect_command!(
                            c,
                            Command::EnvironmentConfiguration,
                            "environment configuration"
                        )
                        .validate()
                    },
                    merge: |c, current| {
                        environment::encode_environment_config(
                            expect_command!(
                                c,
                                Command::EnvironmentConfiguration,
                                "environment configuration"
                            ),
                            current,
                        )
                    },
                },
            ),
            FeatureId::Led => Codec::read_write(
                |raw| user_interface::decode_led(raw).map(Reading::Led),
                Direct(|c| user_interface::encode_led(expect_command!(c, Command::Led, "led"))),
            ),
            FeatureId::Button => {
                Codec::read_only(|raw| user_interface::decode_button(raw).map(Reading::Button))
            }
            FeatureId::MotionConfiguration => Codec::read_write(
                |raw| motion::decode_motion_config(raw).map(Reading::MotionConfiguration),
                ReadModifyWrite {
                    validate: |c| {
                        expect_command!(c, Command::MotionConfiguration, "motion configuration")
                            .validate()
                    },
                    merge: |c, current| {
                        motion::encode_motion_config(
                            expect_command!(
                                c,
                                Command::MotionConfiguration,
                                "motion configuration"
                            ),
                            current,
                        )
                    },
                },
            ),
            FeatureId::Tap => Codec::read_only(|raw| motion::decode_tap(raw).map(Reading::Tap)),
            FeatureId::AbsoluteOrientation => Codec::read_only(|raw| {
                motion::decode_orientation(raw).map(Reading::AbsoluteOrientation)
            }),
            FeatureId::QuaternionOrientation => {
                Codec::read_only(|raw| motion::decode_quaternion(raw).map(Reading::Quaternion))
            }
            FeatureId::StepCounter => {
                Codec::read_only(|raw| motion::decode_step_count(raw).map(Reading::StepCounter))
            }
            FeatureId::RawData => {
                Codec::read_only(|raw| motion::decode_raw_motion(raw).map(Reading::RawData))
            }
            FeatureId::EulerOrientation => {
                Codec::read_only(|raw| motion::decode_euler(raw).map(Reading::Euler))
            }
            FeatureId::RotationMatrixOrientation => Codec::read_only(|raw| {
                motion::decode_rotation_matrix(raw).map(Reading::RotationMatrix)
            }),
            FeatureId::Heading => {
                Codec::read_only(|raw| motion::decode_heading(raw).map(Reading::Heading))
            }
            FeatureId::GravityVector => {
                Codec::read_only(|raw| motion::decode_gravity(raw).map(Reading::Gravity))
            }
            FeatureId::SoundConfiguration => Codec::read_write(
                |raw| sound::decode_sound_config(raw).map(Reading::SoundConfiguration),
                ReadModifyWrite {
                    validate: |c| {
                        expect_command!(c, Command::SoundConfiguration, "sound configuration")
                            .validate()
                    },
                    merge: |c, current| {
                        sound::encode_sound_config(
                            expect_command!(c, Command::SoundConfiguration, "sound configuration"),
                            current,
                        )
                    },
                },
            ),
            FeatureId::SpeakerData => Codec::write_only(Direct(|c| {
                sound::encode_speaker(expect_command!(c, Command::Speaker, "speaker"))
            })),
            FeatureId::SpeakerStatus => Codec::read_only(|raw| {
                sound::decode_speaker_status(raw).map(Reading::SpeakerStatus)
            }),
            FeatureId::Microphone => {
                Codec::read_only(|raw| adpcm::decode_frame(raw).map(Reading::Microphone))
            }
            FeatureId::Battery => {
                Codec::read_only(|raw| battery::decode_battery(raw).map(Reading::Battery))
            }
        }
    }

    /// Whether a decoder is configured
    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Whether an encoder is configured
    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    /// Whether encoding needs the current register contents
    pub fn requires_current(&self) -> bool {
        matches!(self.encoder, Some(Encoder::ReadModifyWrite { .. }))
    }

    /// Decode `raw`
    pub fn decode(&self, raw: &[u8]) -> Result<Reading> {
        let decoder = self
            .decoder
            .ok_or_else(|| Error::unsupported("no decoder is configured"))?;
        decoder(raw)
    }

    /// Check `command` without building bytes
    pub fn validate(&self, command: &Command) -> Result<()> {
        match self.encoder {
            None => Err(Error::unsupported("no encoder is configured")),
            Some(Encoder::Direct(encode)) => encode(command).map(|_| ()),
            Some(Encoder::ReadModifyWrite { validate, .. }) => validate(command),
        }
    }

    /// Encode `command`; read-modify-write encoders need `current`
    pub fn encode(&self, command: &Command, current: Option<&[u8]>) -> Result<Vec<u8>> {
        match self.encoder {
            None => Err(Error::unsupported("no encoder is configured")),
            Some(Encoder::Direct(encode)) => encode(command),
            Some(Encoder::ReadModifyWrite { merge, .. }) => {
                let current = current.ok_or_else(|| {
                    Error::validation("the current register value is needed to merge this update")
                })?;
                merge(command, current)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::AdvertisingUpdate;
    use crate::user_interface::{LedColor, LedMode};

    #[test]
    fn test_every_feature_has_a_codec() {
        for feature in FeatureId::ALL {
            let codec = Codec::for_feature(feature);
            assert!(codec.has_decoder() || codec.has_encoder(), "{}", feature);
        }
        assert!(!Codec::for_feature(FeatureId::SpeakerData).has_decoder());
        assert!(!Codec::for_feature(FeatureId::Temperature).has_encoder());
    }

    #[test]
    fn test_decode_dispatch() {
        let codec = Codec::for_feature(FeatureId::Temperature);
        match codec.decode(&[0x16, 0x32]).unwrap() {
            Reading::Temperature(t) => assert_eq!(t.celsius, 22.5),
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_command_is_validation_error() {
        let codec = Codec::for_feature(FeatureId::Led);
        let err = codec.encode(&Command::Name("x".into()), None).unwrap_err();
        assert_eq!(
            err,
            Error::validation("malformed command: expected led, got name")
        );
    }

    #[test]
    fn test_read_modify_write_needs_current() {
        let codec = Codec::for_feature(FeatureId::AdvertisingParameters);
        assert!(codec.requires_current());
        let command = Command::AdvertisingParameters(AdvertisingUpdate {
            interval_ms: Some(100.0),
            timeout_s: None,
        });
        assert!(codec.validate(&command).is_ok());
        assert!(codec.encode(&command, None).is_err());
        assert_eq!(
            codec.encode(&command, Some(&[0x20, 0x03, 0x0A])).unwrap(),
            vec![0xA0, 0x00, 0x0A]
        );
    }

    #[test]
    fn test_direct_encoder() {
        let codec = Codec::for_feature(FeatureId::Led);
        assert!(!codec.requires_current());
        let command = Command::Led(LedMode::OneShot {
            color: LedColor::Green,
            intensity: 100,
        });
        assert_eq!(codec.encode(&command, None).unwrap(), vec![3, 2, 100]);
    }

    #[test]
    fn test_missing_codec_is_unsupported() {
        let codec = Codec::for_feature(FeatureId::SpeakerData);
        assert!(matches!(codec.decode(&[1]), Err(Error::Unsupported(_))));
        let codec = Codec::for_feature(FeatureId::Battery);
        assert!(matches!(
            codec.encode(&Command::Name("x".into()), None),
            Err(Error::Unsupported(_))
        ));
    }
}

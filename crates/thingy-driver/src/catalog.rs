/*!
 * Service and attribute identifiers of the Thingy:52.
 *
 * Every custom id is the base `ef68xxxx-9b35-4933-9b10-52ffa9740042` with a
 * 16-bit short id in the `xxxx` position. Battery uses the standard
 * Bluetooth SIG ids.
 */
use thingy_codec::Codec;
use thingy_core::types::FeatureId;
use uuid::Uuid;

const THINGY_BASE: u128 = 0xef68_0000_9b35_4933_9b10_52ff_a974_0042;
const SIG_BASE: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a Thingy short id
pub const fn thingy_uuid(short: u16) -> Uuid {
    Uuid::from_u128(THINGY_BASE | ((short as u128) << 96))
}

/// Expand a Bluetooth SIG short id
pub const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(SIG_BASE | ((short as u128) << 96))
}

/// Configuration service, also the discovery filter
pub const CONFIGURATION_SERVICE: Uuid = thingy_uuid(0x0100);
/// Environment service
pub const ENVIRONMENT_SERVICE: Uuid = thingy_uuid(0x0200);
/// User interface service
pub const USER_INTERFACE_SERVICE: Uuid = thingy_uuid(0x0300);
/// Motion service
pub const MOTION_SERVICE: Uuid = thingy_uuid(0x0400);
/// Sound service
pub const SOUND_SERVICE: Uuid = thingy_uuid(0x0500);
/// Standard battery service
pub const BATTERY_SERVICE: Uuid = sig_uuid(0x180f);

/// Services requested next to the discovery filter
pub const OPTIONAL_SERVICES: [Uuid; 5] = [
    BATTERY_SERVICE,
    ENVIRONMENT_SERVICE,
    USER_INTERFACE_SERVICE,
    MOTION_SERVICE,
    SOUND_SERVICE,
];

/// Where a feature lives and how its payloads are converted
#[derive(Debug, Clone, Copy)]
pub struct FeatureDescriptor {
    /// The feature
    pub feature: FeatureId,
    /// Owning service
    pub service: Uuid,
    /// Attribute id
    pub attribute: Uuid,
    /// Payload conversions
    pub codec: Codec,
}

/// Owning service of a feature
pub fn service_of(feature: FeatureId) -> Uuid {
    use FeatureId::*;

    match feature {
        Name | AdvertisingParameters | ConnectionParameters | Eddystone | CloudToken | Firmware
        | Mtu => CONFIGURATION_SERVICE,
        Temperature | Pressure | Humidity | Gas | Color | EnvironmentConfiguration => {
            ENVIRONMENT_SERVICE
        }
        Led | Button => USER_INTERFACE_SERVICE,
        MotionConfiguration | Tap | AbsoluteOrientation | QuaternionOrientation | StepCounter
        | RawData | EulerOrientation | RotationMatrixOrientation | Heading | GravityVector => {
            MOTION_SERVICE
        }
        SoundConfiguration | SpeakerData | SpeakerStatus | Microphone => SOUND_SERVICE,
        Battery => BATTERY_SERVICE,
    }
}

/// Attribute id of a feature
pub fn attribute_of(feature: FeatureId) -> Uuid {
    use FeatureId::*;

    match feature {
        Name => thingy_uuid(0x0101),
        AdvertisingParameters => thingy_uuid(0x0102),
        ConnectionParameters => thingy_uuid(0x0104),
        Eddystone => thingy_uuid(0x0105),
        CloudToken => thingy_uuid(0x0106),
        Firmware => thingy_uuid(0x0107),
        Mtu => thingy_uuid(0x0108),
        Temperature => thingy_uuid(0x0201),
        Pressure => thingy_uuid(0x0202),
        Humidity => thingy_uuid(0x0203),
        Gas => thingy_uuid(0x0204),
        Color => thingy_uuid(0x0205),
        EnvironmentConfiguration => thingy_uuid(0x0206),
        Led => thingy_uuid(0x0301),
        Button => thingy_uuid(0x0302),
        MotionConfiguration => thingy_uuid(0x0401),
        Tap => thingy_uuid(0x0402),
        AbsoluteOrientation => thingy_uuid(0x0403),
        QuaternionOrientation => thingy_uuid(0x0404),
        StepCounter => thingy_uuid(0x0405),
        RawData => thingy_uuid(0x0406),
        EulerOrientation => thingy_uuid(0x0407),
        RotationMatrixOrientation => thingy_uuid(0x0408),
        Heading => thingy_uuid(0x0409),
        GravityVector => thingy_uuid(0x040a),
        SoundConfiguration => thingy_uuid(0x0501),
        SpeakerData => thingy_uuid(0x0502),
        SpeakerStatus => thingy_uuid(0x0503),
        Microphone => thingy_uuid(0x0504),
        Battery => sig_uuid(0x2a19),
    }
}

/// Full descriptor of a feature
pub fn descriptor(feature: FeatureId) -> FeatureDescriptor {
    FeatureDescriptor {
        feature,
        service: service_of(feature),
        attribute: attribute_of(feature),
        codec: Codec::for_feature(feature),
    }
}

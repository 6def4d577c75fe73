/*!
 * Motion service codecs.
 *
 * Fixed-point conventions: quaternion components are Q2.30, Euler angles
 * and heading are Q16.16, rotation matrix entries are Q14.2 and raw sensor
 * axes use per-sensor scale factors.
 */
use bytes::Buf;
use serde::{Deserialize, Serialize};
use thingy_core::error::{Error, Result};

use crate::frame::{check_range, reader, u16_at};

/// Tap event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tap {
    /// Axis and direction code
    pub direction: u8,
    /// Number of taps
    pub count: u8,
}

/// Orientation quaternion, normalized to unit length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// Scalar part
    pub w: f64,
    /// X
    pub x: f64,
    /// Y
    pub y: f64,
    /// Z
    pub z: f64,
}

impl Quaternion {
    /// Euclidean norm
    pub fn magnitude(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Pedometer reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCount {
    /// Steps since the counter started
    pub steps: u32,
    /// Time since the counter started, ms
    pub elapsed_ms: u32,
}

/// Three-axis vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// X
    pub x: f64,
    /// Y
    pub y: f64,
    /// Z
    pub z: f64,
}

/// Raw motion sensor data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMotion {
    /// Accelerometer, G
    pub accelerometer: Vector3,
    /// Gyroscope, deg/s
    pub gyroscope: Vector3,
    /// Compass, microtesla
    pub compass: Vector3,
}

/// Euler angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Roll
    pub roll: f64,
    /// Pitch
    pub pitch: f64,
    /// Yaw
    pub yaw: f64,
}

/// 3x3 rotation matrix, row-major
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationMatrix(pub [[f64; 3]; 3]);

/// Compass heading in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// Degrees
    pub degrees: f64,
}

/// Motion configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Step counter reporting interval, ms
    pub step_counter_interval_ms: u16,
    /// Temperature compensation interval, ms
    pub temperature_compensation_interval_ms: u16,
    /// Magnetometer compensation interval, ms
    pub magnetometer_compensation_interval_ms: u16,
    /// Motion processing unit frequency, Hz
    pub motion_processing_frequency_hz: u16,
    /// Wake on motion
    pub wake_on_motion: bool,
}

/// Partial update of the motion configuration; `None` keeps the device value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionConfigUpdate {
    /// 100 - 5000 ms
    pub step_counter_interval_ms: Option<u16>,
    /// 100 - 5000 ms
    pub temperature_compensation_interval_ms: Option<u16>,
    /// 100 - 1000 ms
    pub magnetometer_compensation_interval_ms: Option<u16>,
    /// 5 - 200 Hz
    pub motion_processing_frequency_hz: Option<u16>,
    /// Wake on motion
    pub wake_on_motion: Option<bool>,
}

const MOTION_CONFIG_LEN: usize = 9;
const Q30: f64 = (1u32 << 30) as f64;
const Q16: f64 = 65536.0;
const ACCELEROMETER_SCALE: f64 = 64.0;
const GYROSCOPE_SCALE: f64 = 2048.0;
const COMPASS_SCALE: f64 = 4096.0;

/// Decode a tap event
pub fn decode_tap(raw: &[u8]) -> Result<Tap> {
    let mut buf = reader(raw, 2, "tap")?;
    Ok(Tap {
        direction: buf.get_u8(),
        count: buf.get_u8(),
    })
}

/// Decode the orientation code (0 portrait, 1 landscape, 2 reverse portrait, 3 reverse landscape)
pub fn decode_orientation(raw: &[u8]) -> Result<u8> {
    let mut buf = reader(raw, 1, "orientation")?;
    Ok(buf.get_u8())
}

/// Decode a Q2.30 quaternion and normalize it
pub fn decode_quaternion(raw: &[u8]) -> Result<Quaternion> {
    let mut buf = reader(raw, 16, "quaternion")?;
    let mut q = Quaternion {
        w: f64::from(buf.get_i32_le()) / Q30,
        x: f64::from(buf.get_i32_le()) / Q30,
        y: f64::from(buf.get_i32_le()) / Q30,
        z: f64::from(buf.get_i32_le()) / Q30,
    };

    let magnitude = q.magnitude();
    if magnitude != 0.0 {
        q.w /= magnitude;
        q.x /= magnitude;
        q.y /= magnitude;
        q.z /= magnitude;
    }
    Ok(q)
}

/// Decode the step counter
pub fn decode_step_count(raw: &[u8]) -> Result<StepCount> {
    let mut buf = reader(raw, 8, "step counter")?;
    Ok(StepCount {
        steps: buf.get_u32_le(),
        elapsed_ms: buf.get_u32_le(),
    })
}

/// Decode raw accelerometer, gyroscope and compass axes
pub fn decode_raw_motion(raw: &[u8]) -> Result<RawMotion> {
    let mut buf = reader(raw, 18, "raw motion")?;
    let mut axes = |scale: f64| Vector3 {
        x: f64::from(buf.get_i16_le()) / scale,
        y: f64::from(buf.get_i16_le()) / scale,
        z: f64::from(buf.get_i16_le()) / scale,
    };
    let accelerometer = axes(ACCELEROMETER_SCALE);
    let gyroscope = axes(GYROSCOPE_SCALE);
    let compass = axes(COMPASS_SCALE);
    Ok(RawMotion {
        accelerometer,
        gyroscope,
        compass,
    })
}

/// Decode Q16.16 roll, pitch and yaw
pub fn decode_euler(raw: &[u8]) -> Result<EulerAngles> {
    let mut buf = reader(raw, 12, "euler")?;
    Ok(EulerAngles {
        roll: f64::from(buf.get_i32_le()) / Q16,
        pitch: f64::from(buf.get_i32_le()) / Q16,
        yaw: f64::from(buf.get_i32_le()) / Q16,
    })
}

/// Decode nine consecutive Q14.2 entries into a row-major matrix
pub fn decode_rotation_matrix(raw: &[u8]) -> Result<RotationMatrix> {
    let mut buf = reader(raw, 18, "rotation matrix")?;
    let mut matrix = [[0.0; 3]; 3];
    for row in matrix.iter_mut() {
        for cell in row.iter_mut() {
            *cell = f64::from(buf.get_i16_le()) / 4.0;
        }
    }
    Ok(RotationMatrix(matrix))
}

/// Decode a Q16.16 heading
pub fn decode_heading(raw: &[u8]) -> Result<Heading> {
    let mut buf = reader(raw, 4, "heading")?;
    Ok(Heading {
        degrees: f64::from(buf.get_i32_le()) / Q16,
    })
}

/// Decode the gravity vector from three little-endian `f32`
pub fn decode_gravity(raw: &[u8]) -> Result<Vector3> {
    let mut buf = reader(raw, 12, "gravity")?;
    Ok(Vector3 {
        x: f64::from(buf.get_f32_le()),
        y: f64::from(buf.get_f32_le()),
        z: f64::from(buf.get_f32_le()),
    })
}

/// Decode the motion configuration register
pub fn decode_motion_config(raw: &[u8]) -> Result<MotionConfig> {
    let mut buf = reader(raw, MOTION_CONFIG_LEN, "motion configuration")?;
    Ok(MotionConfig {
        step_counter_interval_ms: buf.get_u16_le(),
        temperature_compensation_interval_ms: buf.get_u16_le(),
        magnetometer_compensation_interval_ms: buf.get_u16_le(),
        motion_processing_frequency_hz: buf.get_u16_le(),
        wake_on_motion: buf.get_u8() != 0,
    })
}

impl MotionConfigUpdate {
    /// Check every provided field; at least one must be provided
    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(Error::validation("motion configuration update sets no field"));
        }
        if let Some(v) = self.step_counter_interval_ms {
            check_range("step counter interval", v, 100, 5000)?;
        }
        if let Some(v) = self.temperature_compensation_interval_ms {
            check_range("temperature compensation interval", v, 100, 5000)?;
        }
        if let Some(v) = self.magnetometer_compensation_interval_ms {
            check_range("magnetometer compensation interval", v, 100, 1000)?;
        }
        if let Some(v) = self.motion_processing_frequency_hz {
            check_range("motion processing unit frequency", v, 5, 200)?;
        }
        Ok(())
    }
}

/// Merge `update` into the current register bytes
pub fn encode_motion_config(update: &MotionConfigUpdate, current: &[u8]) -> Result<Vec<u8>> {
    update.validate()?;
    reader(current, MOTION_CONFIG_LEN, "motion configuration")?;

    let mut out = Vec::with_capacity(MOTION_CONFIG_LEN);
    for (value, offset) in [
        (update.step_counter_interval_ms, 0),
        (update.temperature_compensation_interval_ms, 2),
        (update.magnetometer_compensation_interval_ms, 4),
        (update.motion_processing_frequency_hz, 6),
    ] {
        let value = value.unwrap_or_else(|| u16_at(current, offset));
        out.extend_from_slice(&value.to_le_bytes());
    }
    let wake = update.wake_on_motion.unwrap_or(current[8] != 0);
    out.push(u8::from(wake));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn i32s(values: [i32; 4]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_quaternion_identity() {
        let q = decode_quaternion(&i32s([1 << 30, 0, 0, 0])).unwrap();
        assert_eq!(q, Quaternion { w: 1.0, x: 0.0, y: 0.0, z: 0.0 });
    }

    #[test]
    fn test_quaternion_zero_is_not_normalized() {
        let q = decode_quaternion(&[0u8; 16]).unwrap();
        assert_eq!(q.magnitude(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_quaternion_is_unit(w: i32, x: i32, y: i32, z: i32) {
            prop_assume!(w != 0 || x != 0 || y != 0 || z != 0);
            let q = decode_quaternion(&i32s([w, x, y, z])).unwrap();
            let norm = q.w * q.w + q.x * q.x + q.y * q.y + q.z * q.z;
            prop_assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_raw_motion_scaling() {
        let axes: [i16; 9] = [64, -128, 32, 2048, 1024, -2048, 4096, 0, -8192];
        let raw: Vec<u8> = axes.iter().flat_map(|v| v.to_le_bytes()).collect();
        let motion = decode_raw_motion(&raw).unwrap();
        assert_eq!(motion.accelerometer, Vector3 { x: 1.0, y: -2.0, z: 0.5 });
        assert_eq!(motion.gyroscope, Vector3 { x: 1.0, y: 0.5, z: -1.0 });
        assert_eq!(motion.compass, Vector3 { x: 1.0, y: 0.0, z: -2.0 });
    }

    #[test]
    fn test_euler_and_heading() {
        let raw: Vec<u8> = [90 * 65536, -45 * 65536, 98304]
            .iter()
            .flat_map(|v: &i32| v.to_le_bytes())
            .collect();
        let euler = decode_euler(&raw).unwrap();
        assert_eq!(euler, EulerAngles { roll: 90.0, pitch: -45.0, yaw: 1.5 });

        let heading = decode_heading(&(180 * 65536i32).to_le_bytes()).unwrap();
        assert_eq!(heading.degrees, 180.0);
    }

    #[test]
    fn test_rotation_matrix_reads_every_entry() {
        let entries: [i16; 9] = [4, 0, 0, 0, 8, 0, 0, 0, -4];
        let raw: Vec<u8> = entries.iter().flat_map(|v| v.to_le_bytes()).collect();
        let matrix = decode_rotation_matrix(&raw).unwrap();
        assert_eq!(matrix.0, [[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, -1.0]]);
    }

    #[test]
    fn test_gravity() {
        let raw: Vec<u8> = [0.0f32, -9.81, 0.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let gravity = decode_gravity(&raw).unwrap();
        assert_eq!(gravity.x, 0.0);
        assert_eq!(gravity.y, f64::from(-9.81f32));
        assert_eq!(gravity.z, 0.5);
    }

    #[test]
    fn test_tap_and_steps() {
        assert_eq!(decode_tap(&[3, 2]).unwrap(), Tap { direction: 3, count: 2 });
        let steps = decode_step_count(&[10, 0, 0, 0, 0xE8, 0x03, 0, 0]).unwrap();
        assert_eq!(steps, StepCount { steps: 10, elapsed_ms: 1000 });
        assert!(matches!(decode_step_count(&[10, 0, 0]), Err(Error::Decode(_))));
    }

    #[test]
    fn test_motion_config_round_trip_through_update() {
        let current = [0xE8, 0x03, 0xF4, 0x01, 0x64, 0x00, 0xC8, 0x00, 0x01];
        let config = decode_motion_config(&current).unwrap();
        assert_eq!(config.step_counter_interval_ms, 1000);
        assert_eq!(config.motion_processing_frequency_hz, 200);
        assert!(config.wake_on_motion);

        let update = MotionConfigUpdate {
            motion_processing_frequency_hz: Some(50),
            wake_on_motion: Some(false),
            ..Default::default()
        };
        let bytes = encode_motion_config(&update, &current).unwrap();
        assert_eq!(bytes, vec![0xE8, 0x03, 0xF4, 0x01, 0x64, 0x00, 0x32, 0x00, 0x00]);
    }

    #[test]
    fn test_motion_config_validation() {
        let update = MotionConfigUpdate {
            magnetometer_compensation_interval_ms: Some(1500),
            ..Default::default()
        };
        assert!(matches!(update.validate(), Err(Error::Validation(_))));
        assert!(matches!(
            MotionConfigUpdate::default().validate(),
            Err(Error::Validation(_))
        ));
    }
}

/*!
 * Environment service codecs: temperature, pressure, humidity, gas, color
 * and the environment configuration register.
 */
use bytes::Buf;
use serde::{Deserialize, Serialize};
use thingy_core::error::{Error, Result};

use crate::frame::{check_range, reader, u16_at};

/// Temperature reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    /// Degrees Celsius
    pub celsius: f64,
}

/// Air pressure reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    /// Hectopascal
    pub hpa: f64,
}

/// Relative humidity reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Humidity {
    /// Percent
    pub percent: u8,
}

/// Air quality reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gas {
    /// Equivalent CO2 in ppm
    pub eco2_ppm: u16,
    /// Total volatile organic compounds in ppb
    pub tvoc_ppb: u16,
}

/// Color sensor reading converted to 8-bit RGB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub red: u8,
    /// Green
    pub green: u8,
    /// Blue
    pub blue: u8,
}

/// Clear channel value read on a black surface
pub const CLEAR_AT_BLACK: f64 = 300.0;
/// Clear channel value read on a white surface
pub const CLEAR_AT_WHITE: f64 = 400.0;

/// Gas sensor sampling interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasInterval {
    /// Every second
    OneSecond,
    /// Every 10 seconds
    TenSeconds,
    /// Every 60 seconds
    SixtySeconds,
}

impl GasInterval {
    /// Interval in seconds
    pub fn seconds(&self) -> u16 {
        match self {
            GasInterval::OneSecond => 1,
            GasInterval::TenSeconds => 10,
            GasInterval::SixtySeconds => 60,
        }
    }

    /// Accept 1, 10 or 60 seconds
    pub fn from_seconds(seconds: u16) -> Result<Self> {
        match seconds {
            1 => Ok(GasInterval::OneSecond),
            10 => Ok(GasInterval::TenSeconds),
            60 => Ok(GasInterval::SixtySeconds),
            other => Err(Error::validation(format!(
                "gas interval must be 1, 10 or 60 seconds, got {}",
                other
            ))),
        }
    }

    fn code(&self) -> u8 {
        match self {
            GasInterval::OneSecond => 1,
            GasInterval::TenSeconds => 2,
            GasInterval::SixtySeconds => 3,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(GasInterval::OneSecond),
            2 => Ok(GasInterval::TenSeconds),
            3 => Ok(GasInterval::SixtySeconds),
            other => Err(Error::decode(format!("unknown gas mode {}", other))),
        }
    }
}

/// Color sensor LED calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCalibration {
    /// Red LED intensity
    pub red: u8,
    /// Green LED intensity
    pub green: u8,
    /// Blue LED intensity
    pub blue: u8,
}

/// Environment configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Temperature sampling interval, ms
    pub temperature_interval_ms: u16,
    /// Pressure sampling interval, ms
    pub pressure_interval_ms: u16,
    /// Humidity sampling interval, ms
    pub humidity_interval_ms: u16,
    /// Color sampling interval, ms
    pub color_interval_ms: u16,
    /// Gas sampling interval
    pub gas_interval: GasInterval,
    /// Color sensor calibration
    pub color_calibration: ColorCalibration,
}

/// Partial update of the environment configuration; `None` keeps the device value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfigUpdate {
    /// Temperature sampling interval, 100 - 60000 ms
    pub temperature_interval_ms: Option<u16>,
    /// Pressure sampling interval, 50 - 60000 ms
    pub pressure_interval_ms: Option<u16>,
    /// Humidity sampling interval, 100 - 60000 ms
    pub humidity_interval_ms: Option<u16>,
    /// Color sampling interval, 200 - 60000 ms
    pub color_interval_ms: Option<u16>,
    /// Gas sampling interval in seconds: 1, 10 or 60
    pub gas_interval_s: Option<u16>,
    /// Color sensor calibration
    pub color_calibration: Option<ColorCalibration>,
}

const ENVIRONMENT_CONFIG_LEN: usize = 12;

/// Decode a temperature: signed integer part plus hundredths
pub fn decode_temperature(raw: &[u8]) -> Result<Temperature> {
    let mut buf = reader(raw, 2, "temperature")?;
    let integer = buf.get_i8();
    let decimal = buf.get_u8();
    Ok(Temperature {
        celsius: f64::from(integer) + f64::from(decimal) / 100.0,
    })
}

/// Decode pressure: unsigned 32-bit integer part plus hundredths
pub fn decode_pressure(raw: &[u8]) -> Result<Pressure> {
    let mut buf = reader(raw, 5, "pressure")?;
    let integer = buf.get_u32_le();
    let decimal = buf.get_u8();
    Ok(Pressure {
        hpa: f64::from(integer) + f64::from(decimal) / 100.0,
    })
}

/// Decode relative humidity
pub fn decode_humidity(raw: &[u8]) -> Result<Humidity> {
    let mut buf = reader(raw, 1, "humidity")?;
    Ok(Humidity {
        percent: buf.get_u8(),
    })
}

/// Decode eCO2 and TVOC
pub fn decode_gas(raw: &[u8]) -> Result<Gas> {
    let mut buf = reader(raw, 4, "gas")?;
    Ok(Gas {
        eco2_ppm: buf.get_u16_le(),
        tvoc_ppb: buf.get_u16_le(),
    })
}

/// Decode the raw red, green, blue and clear channels into 8-bit RGB
pub fn decode_color(raw: &[u8]) -> Result<Color> {
    let mut buf = reader(raw, 8, "color")?;
    let r = buf.get_u16_le();
    let g = buf.get_u16_le();
    let b = buf.get_u16_le();
    let c = buf.get_u16_le();
    Ok(color_from_channels(r, g, b, c))
}

/// Convert raw channels to RGB by scaling each channel's share of the
/// total with the clear channel normalized between black and white.
pub fn color_from_channels(r: u16, g: u16, b: u16, c: u16) -> Color {
    let sum = f64::from(r) + f64::from(g) + f64::from(b);
    if sum == 0.0 {
        return Color {
            red: 0,
            green: 0,
            blue: 0,
        };
    }

    let clear_normalized =
        ((f64::from(c) - CLEAR_AT_BLACK) / (CLEAR_AT_WHITE - CLEAR_AT_BLACK)).max(0.0);
    let channel = |value: u16| -> u8 {
        let scaled = f64::from(value) / sum * 255.0 * 3.0 * clear_normalized;
        scaled.min(255.0).round() as u8
    };

    Color {
        red: channel(r),
        green: channel(g),
        blue: channel(b),
    }
}

/// Decode the environment configuration register
pub fn decode_environment_config(raw: &[u8]) -> Result<EnvironmentConfig> {
    let mut buf = reader(raw, ENVIRONMENT_CONFIG_LEN, "environment configuration")?;
    let temperature_interval_ms = buf.get_u16_le();
    let pressure_interval_ms = buf.get_u16_le();
    let humidity_interval_ms = buf.get_u16_le();
    let color_interval_ms = buf.get_u16_le();
    let gas_interval = GasInterval::from_code(buf.get_u8())?;
    let color_calibration = ColorCalibration {
        red: buf.get_u8(),
        green: buf.get_u8(),
        blue: buf.get_u8(),
    };

    Ok(EnvironmentConfig {
        temperature_interval_ms,
        pressure_interval_ms,
        humidity_interval_ms,
        color_interval_ms,
        gas_interval,
        color_calibration,
    })
}

impl EnvironmentConfigUpdate {
    /// Check every provided field; at least one must be provided
    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(Error::validation(
                "environment configuration update sets no field",
            ));
        }
        if let Some(v) = self.temperature_interval_ms {
            check_range("temperature interval", v, 100, 60000)?;
        }
        if let Some(v) = self.pressure_interval_ms {
            check_range("pressure interval", v, 50, 60000)?;
        }
        if let Some(v) = self.humidity_interval_ms {
            check_range("humidity interval", v, 100, 60000)?;
        }
        if let Some(v) = self.color_interval_ms {
            check_range("color interval", v, 200, 60000)?;
        }
        if let Some(v) = self.gas_interval_s {
            GasInterval::from_seconds(v)?;
        }
        Ok(())
    }
}

/// Merge `update` into the current register bytes
pub fn encode_environment_config(
    update: &EnvironmentConfigUpdate,
    current: &[u8],
) -> Result<Vec<u8>> {
    update.validate()?;
    reader(current, ENVIRONMENT_CONFIG_LEN, "environment configuration")?;

    let gas_code = match update.gas_interval_s {
        Some(seconds) => GasInterval::from_seconds(seconds)?.code(),
        None => current[8],
    };
    let calibration = update.color_calibration.unwrap_or(ColorCalibration {
        red: current[9],
        green: current[10],
        blue: current[11],
    });

    let mut out = Vec::with_capacity(ENVIRONMENT_CONFIG_LEN);
    for (value, offset) in [
        (update.temperature_interval_ms, 0),
        (update.pressure_interval_ms, 2),
        (update.humidity_interval_ms, 4),
        (update.color_interval_ms, 6),
    ] {
        let value = value.unwrap_or_else(|| u16_at(current, offset));
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.push(gas_code);
    out.extend_from_slice(&[calibration.red, calibration.green, calibration.blue]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature() {
        assert_eq!(decode_temperature(&[0x16, 0x32]).unwrap().celsius, 22.5);
        assert_eq!(decode_temperature(&[0xFB, 0x32]).unwrap().celsius, -4.5);
        assert!(matches!(decode_temperature(&[0x16]), Err(Error::Decode(_))));
    }

    #[test]
    fn test_pressure() {
        let raw = [0xF5, 0x03, 0x00, 0x00, 0x19];
        assert_eq!(decode_pressure(&raw).unwrap().hpa, 1013.25);
    }

    #[test]
    fn test_humidity_and_gas() {
        assert_eq!(decode_humidity(&[41]).unwrap().percent, 41);
        let gas = decode_gas(&[0x90, 0x01, 0x0A, 0x00]).unwrap();
        assert_eq!(gas, Gas { eco2_ppm: 400, tvoc_ppb: 10 });
    }

    #[test]
    fn test_color_white_surface() {
        // Equal channels with clear at the white point saturate every channel
        let color = color_from_channels(100, 100, 100, 400);
        assert_eq!(color, Color { red: 255, green: 255, blue: 255 });
    }

    #[test]
    fn test_color_below_black_point_is_black() {
        let color = color_from_channels(10, 200, 30, 250);
        assert_eq!(color, Color { red: 0, green: 0, blue: 0 });
    }

    #[test]
    fn test_color_ratio() {
        // red share 0.5, clear halfway: 0.5 * 255 * 3 * 0.5 = 191.25
        let raw = [0x32, 0x00, 0x19, 0x00, 0x19, 0x00, 0x5E, 0x01];
        let color = decode_color(&raw).unwrap();
        assert_eq!(color.red, 191);
        assert_eq!(color.green, 96);
        assert_eq!(color.blue, 96);
    }

    #[test]
    fn test_color_zero_sum() {
        assert_eq!(color_from_channels(0, 0, 0, 1000), Color { red: 0, green: 0, blue: 0 });
    }

    fn sample_config() -> Vec<u8> {
        vec![0xE8, 0x03, 0xD0, 0x07, 0xB8, 0x0B, 0xA0, 0x0F, 0x02, 0x67, 0x4E, 0x71]
    }

    #[test]
    fn test_environment_config_decode() {
        let config = decode_environment_config(&sample_config()).unwrap();
        assert_eq!(config.temperature_interval_ms, 1000);
        assert_eq!(config.pressure_interval_ms, 2000);
        assert_eq!(config.humidity_interval_ms, 3000);
        assert_eq!(config.color_interval_ms, 4000);
        assert_eq!(config.gas_interval, GasInterval::TenSeconds);
        assert_eq!(config.gas_interval.seconds(), 10);
        assert_eq!(
            config.color_calibration,
            ColorCalibration { red: 0x67, green: 0x4E, blue: 0x71 }
        );
    }

    #[test]
    fn test_environment_config_partial_update_keeps_other_fields() {
        let update = EnvironmentConfigUpdate {
            humidity_interval_ms: Some(5000),
            gas_interval_s: Some(60),
            ..Default::default()
        };
        let bytes = encode_environment_config(&update, &sample_config()).unwrap();
        let config = decode_environment_config(&bytes).unwrap();
        assert_eq!(config.temperature_interval_ms, 1000);
        assert_eq!(config.pressure_interval_ms, 2000);
        assert_eq!(config.humidity_interval_ms, 5000);
        assert_eq!(config.color_interval_ms, 4000);
        assert_eq!(config.gas_interval, GasInterval::SixtySeconds);
        assert_eq!(&bytes[9..], &[0x67, 0x4E, 0x71]);
    }

    #[test]
    fn test_environment_config_validation() {
        let empty = EnvironmentConfigUpdate::default();
        assert!(matches!(empty.validate(), Err(Error::Validation(_))));

        let update = EnvironmentConfigUpdate {
            color_interval_ms: Some(199),
            ..Default::default()
        };
        assert!(matches!(
            encode_environment_config(&update, &sample_config()),
            Err(Error::Validation(_))
        ));

        let update = EnvironmentConfigUpdate {
            gas_interval_s: Some(30),
            ..Default::default()
        };
        assert!(matches!(update.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_environment_config_unknown_gas_mode() {
        let mut raw = sample_config();
        raw[8] = 9;
        assert!(matches!(decode_environment_config(&raw), Err(Error::Decode(_))));
    }
}

/*!
 * Configuration service codecs: device name, advertising and connection
 * parameters, cloud token, firmware version and MTU.
 *
 * The advertising and connection parameter registers hold several
 * independent fields and are written read-modify-write.
 */
use std::fmt;

use bytes::Buf;
use serde::{Deserialize, Serialize};
use thingy_core::error::{Error, Result};

use crate::frame::{check_range, check_range_f64, reader, u16_at};

/// Longest device name the firmware stores
pub const MAX_NAME_LEN: usize = 10;
/// Longest cloud token the firmware stores
pub const MAX_CLOUD_TOKEN_LEN: usize = 250;

const ADVERTISING_UNIT_MS: f64 = 0.625;
const CONNECTION_INTERVAL_UNIT_MS: f64 = 1.25;
const SUPERVISION_TIMEOUT_UNIT_MS: f64 = 10.0;
const ADVERTISING_LEN: usize = 3;
const CONNECTION_LEN: usize = 8;

/// Decode the advertised device name
pub fn decode_name(raw: &[u8]) -> Result<String> {
    Ok(String::from_utf8_lossy(raw).into_owned())
}

/// Encode a device name: ASCII, at most 10 characters
pub fn encode_name(name: &str) -> Result<Vec<u8>> {
    if !name.is_ascii() {
        return Err(Error::validation("device name must be ASCII"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::validation(format!(
            "device name must be at most {} characters, got {}",
            MAX_NAME_LEN,
            name.len()
        )));
    }
    Ok(name.as_bytes().to_vec())
}

/// Advertising parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvertisingParameters {
    /// Advertising interval, ms
    pub interval_ms: f64,
    /// Advertising timeout, s (0 disables the timeout)
    pub timeout_s: u8,
}

/// Partial update of the advertising parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvertisingUpdate {
    /// Interval, 20 - 5000 ms
    pub interval_ms: Option<f64>,
    /// Timeout, 0 - 180 s
    pub timeout_s: Option<u8>,
}

/// Decode the advertising parameters register
pub fn decode_advertising(raw: &[u8]) -> Result<AdvertisingParameters> {
    let mut buf = reader(raw, ADVERTISING_LEN, "advertising parameters")?;
    Ok(AdvertisingParameters {
        interval_ms: f64::from(buf.get_u16_le()) * ADVERTISING_UNIT_MS,
        timeout_s: buf.get_u8(),
    })
}

impl AdvertisingUpdate {
    /// Check every provided field; at least one must be provided
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms.is_none() && self.timeout_s.is_none() {
            return Err(Error::validation("advertising parameters update sets no field"));
        }
        if let Some(interval) = self.interval_ms {
            check_range_f64("advertising interval", interval, 20.0, 5000.0)?;
        }
        if let Some(timeout) = self.timeout_s {
            check_range("advertising timeout", timeout, 0, 180)?;
        }
        Ok(())
    }
}

/// Merge `update` into the current advertising register
pub fn encode_advertising(update: &AdvertisingUpdate, current: &[u8]) -> Result<Vec<u8>> {
    update.validate()?;
    reader(current, ADVERTISING_LEN, "advertising parameters")?;

    let interval = match update.interval_ms {
        Some(ms) => (ms / ADVERTISING_UNIT_MS).round() as u16,
        None => u16_at(current, 0),
    };
    let timeout = update.timeout_s.unwrap_or(current[2]);

    let [lo, hi] = interval.to_le_bytes();
    Ok(vec![lo, hi, timeout])
}

/// Connection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Minimum connection interval, ms
    pub min_interval_ms: f64,
    /// Maximum connection interval, ms
    pub max_interval_ms: f64,
    /// Slave latency, connection events
    pub slave_latency: u16,
    /// Supervision timeout, ms
    pub supervision_timeout_ms: f64,
}

/// Partial update of the connection parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    /// Minimum interval, at least 7.5 ms and not above the maximum
    pub min_interval_ms: Option<f64>,
    /// Maximum interval, at most 4000 ms and not below the minimum
    pub max_interval_ms: Option<f64>,
    /// Slave latency, 0 - 499
    pub slave_latency: Option<u16>,
    /// Supervision timeout, 100 - 32000 ms
    pub supervision_timeout_ms: Option<f64>,
}

/// Decode the connection parameters register
pub fn decode_connection(raw: &[u8]) -> Result<ConnectionParameters> {
    let mut buf = reader(raw, CONNECTION_LEN, "connection parameters")?;
    Ok(ConnectionParameters {
        min_interval_ms: f64::from(buf.get_u16_le()) * CONNECTION_INTERVAL_UNIT_MS,
        max_interval_ms: f64::from(buf.get_u16_le()) * CONNECTION_INTERVAL_UNIT_MS,
        slave_latency: buf.get_u16_le(),
        supervision_timeout_ms: f64::from(buf.get_u16_le()) * SUPERVISION_TIMEOUT_UNIT_MS,
    })
}

impl ConnectionUpdate {
    /// Check every provided field; at least one must be provided
    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(Error::validation("connection parameters update sets no field"));
        }
        if let Some(min) = self.min_interval_ms {
            check_range_f64("minimum connection interval", min, 7.5, 4000.0)?;
        }
        if let Some(max) = self.max_interval_ms {
            check_range_f64("maximum connection interval", max, 7.5, 4000.0)?;
        }
        if let Some(latency) = self.slave_latency {
            check_range("slave latency", latency, 0, 499)?;
        }
        if let Some(timeout) = self.supervision_timeout_ms {
            check_range_f64("supervision timeout", timeout, 100.0, 32000.0)?;
        }
        Ok(())
    }

    /// Fill the missing fields from `current` and check the cross-field rules
    pub fn merge(&self, current: &ConnectionParameters) -> Result<ConnectionParameters> {
        self.validate()?;
        let merged = ConnectionParameters {
            min_interval_ms: self.min_interval_ms.unwrap_or(current.min_interval_ms),
            max_interval_ms: self.max_interval_ms.unwrap_or(current.max_interval_ms),
            slave_latency: self.slave_latency.unwrap_or(current.slave_latency),
            supervision_timeout_ms: self
                .supervision_timeout_ms
                .unwrap_or(current.supervision_timeout_ms),
        };

        if merged.min_interval_ms > merged.max_interval_ms {
            return Err(Error::validation(format!(
                "minimum connection interval {} ms is above the maximum {} ms",
                merged.min_interval_ms, merged.max_interval_ms
            )));
        }
        let needed = (1.0 + f64::from(merged.slave_latency)) * merged.max_interval_ms;
        if merged.supervision_timeout_ms * 4.0 < needed {
            return Err(Error::validation(format!(
                "supervision timeout {} ms is too short: 4 x timeout must reach {} ms",
                merged.supervision_timeout_ms, needed
            )));
        }
        Ok(merged)
    }
}

/// Merge `update` into the current connection parameters register
pub fn encode_connection(update: &ConnectionUpdate, current: &[u8]) -> Result<Vec<u8>> {
    let merged = update.merge(&decode_connection(current)?)?;

    let mut out = Vec::with_capacity(CONNECTION_LEN);
    for value in [
        (merged.min_interval_ms / CONNECTION_INTERVAL_UNIT_MS).round() as u16,
        (merged.max_interval_ms / CONNECTION_INTERVAL_UNIT_MS).round() as u16,
        merged.slave_latency,
        (merged.supervision_timeout_ms / SUPERVISION_TIMEOUT_UNIT_MS).round() as u16,
    ] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    Ok(out)
}

/// Decode the cloud token
pub fn decode_cloud_token(raw: &[u8]) -> Result<String> {
    Ok(String::from_utf8_lossy(raw).into_owned())
}

/// Encode a cloud token of at most 250 characters
pub fn encode_cloud_token(token: &str) -> Result<Vec<u8>> {
    let len = token.chars().count();
    if len > MAX_CLOUD_TOKEN_LEN {
        return Err(Error::validation(format!(
            "cloud token must be at most {} characters, got {}",
            MAX_CLOUD_TOKEN_LEN, len
        )));
    }
    Ok(token.as_bytes().to_vec())
}

/// Firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FirmwareVersion {
    /// Major
    pub major: u8,
    /// Minor
    pub minor: u8,
    /// Patch
    pub patch: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Decode the firmware version
pub fn decode_firmware(raw: &[u8]) -> Result<FirmwareVersion> {
    let mut buf = reader(raw, 3, "firmware version")?;
    Ok(FirmwareVersion {
        major: buf.get_u8(),
        minor: buf.get_u8(),
        patch: buf.get_u8(),
    })
}

/// MTU change request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtuRequest {
    /// Requested MTU, 23 - 276 bytes
    pub size: u16,
    /// Ask the peripheral to initiate the MTU exchange
    pub peripheral_request: bool,
}

/// Decode the stored MTU
pub fn decode_mtu(raw: &[u8]) -> Result<u16> {
    reader(raw, 3, "mtu")?;
    Ok(u16_at(raw, 1))
}

/// Encode an MTU request
pub fn encode_mtu(request: &MtuRequest) -> Result<Vec<u8>> {
    check_range("MTU size", request.size, 23, 276)?;
    let [lo, hi] = request.size.to_le_bytes();
    Ok(vec![u8::from(request.peripheral_request), lo, hi])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_advertising_interval_update_keeps_timeout() {
        let update = AdvertisingUpdate {
            interval_ms: Some(100.0),
            timeout_s: None,
        };
        let bytes = encode_advertising(&update, &[0xA0, 0x00, 0x0A]).unwrap();
        assert_eq!(bytes, vec![0xA0, 0x00, 0x0A]);
    }

    #[test]
    fn test_advertising_decode() {
        let params = decode_advertising(&[0xA0, 0x00, 0x0A]).unwrap();
        assert_eq!(params.interval_ms, 100.0);
        assert_eq!(params.timeout_s, 10);
    }

    #[test]
    fn test_advertising_validation() {
        let update = AdvertisingUpdate { interval_ms: Some(19.0), timeout_s: None };
        assert!(matches!(update.validate(), Err(Error::Validation(_))));
        let update = AdvertisingUpdate { interval_ms: None, timeout_s: Some(181) };
        assert!(matches!(update.validate(), Err(Error::Validation(_))));
        assert!(matches!(
            AdvertisingUpdate::default().validate(),
            Err(Error::Validation(_))
        ));
        // Timeout 0 is a value, not a missing field
        let update = AdvertisingUpdate {
            interval_ms: None,
            timeout_s: Some(0),
        };
        assert_eq!(
            encode_advertising(&update, &[0xA0, 0x00, 0x0A]).unwrap(),
            vec![0xA0, 0x00, 0x00]
        );
    }

    fn connection_register(min: u16, max: u16, latency: u16, timeout: u16) -> Vec<u8> {
        [min, max, latency, timeout].iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_connection_decode() {
        let params = decode_connection(&connection_register(6, 24, 3, 400)).unwrap();
        assert_eq!(params.min_interval_ms, 7.5);
        assert_eq!(params.max_interval_ms, 30.0);
        assert_eq!(params.slave_latency, 3);
        assert_eq!(params.supervision_timeout_ms, 4000.0);
    }

    #[test]
    fn test_connection_partial_update() {
        let current = connection_register(6, 24, 3, 400);
        let update = ConnectionUpdate {
            max_interval_ms: Some(50.0),
            ..Default::default()
        };
        let bytes = encode_connection(&update, &current).unwrap();
        assert_eq!(bytes, connection_register(6, 40, 3, 400));
    }

    #[test]
    fn test_connection_rejects_min_above_max() {
        let current = connection_register(6, 24, 0, 400);
        let update = ConnectionUpdate {
            min_interval_ms: Some(40.0),
            ..Default::default()
        };
        assert!(matches!(encode_connection(&update, &current), Err(Error::Validation(_))));
    }

    #[test]
    fn test_connection_rejects_short_timeout() {
        let current = connection_register(6, 24, 0, 400);
        // (1 + 4) * 100 = 500 > 100 * 4
        let update = ConnectionUpdate {
            max_interval_ms: Some(100.0),
            slave_latency: Some(4),
            supervision_timeout_ms: Some(100.0),
            ..Default::default()
        };
        assert!(matches!(encode_connection(&update, &current), Err(Error::Validation(_))));
    }

    proptest! {
        #[test]
        fn prop_connection_timeout_rule(
            min in 7.5f64..=4000.0,
            max in 7.5f64..=4000.0,
            latency in 0u16..=499,
            timeout in 100.0f64..=32000.0,
        ) {
            let update = ConnectionUpdate {
                min_interval_ms: Some(min),
                max_interval_ms: Some(max),
                slave_latency: Some(latency),
                supervision_timeout_ms: Some(timeout),
            };
            let current = connection_register(6, 24, 0, 400);
            let result = encode_connection(&update, &current);
            if timeout * 4.0 < (1.0 + f64::from(latency)) * max || min > max {
                prop_assert!(matches!(result, Err(Error::Validation(_))));
            } else {
                prop_assert!(result.is_ok());
            }
        }
    }

    #[test]
    fn test_name() {
        assert_eq!(encode_name("Thingy").unwrap(), b"Thingy".to_vec());
        assert!(matches!(encode_name("ThingyThingy"), Err(Error::Validation(_))));
        assert!(matches!(encode_name("Thingé"), Err(Error::Validation(_))));
        assert_eq!(decode_name(b"Thingy").unwrap(), "Thingy");
    }

    #[test]
    fn test_cloud_token() {
        let token = "a".repeat(250);
        assert_eq!(encode_cloud_token(&token).unwrap().len(), 250);
        assert!(encode_cloud_token(&"a".repeat(251)).is_err());
        assert_eq!(decode_cloud_token(b"abc").unwrap(), "abc");
    }

    #[test]
    fn test_firmware() {
        let version = decode_firmware(&[2, 1, 0]).unwrap();
        assert_eq!(version.to_string(), "v2.1.0");
    }

    #[test]
    fn test_mtu() {
        assert_eq!(decode_mtu(&[0, 0xF7, 0x00]).unwrap(), 247);
        let request = MtuRequest { size: 276, peripheral_request: true };
        assert_eq!(encode_mtu(&request).unwrap(), vec![1, 0x14, 0x01]);
        let request = MtuRequest { size: 22, peripheral_request: false };
        assert!(matches!(encode_mtu(&request), Err(Error::Validation(_))));
    }
}

//! Standard battery service level.

use bytes::Buf;
use thingy_core::error::{Error, Result};

use crate::frame::reader;

/// Decode the battery level in percent
pub fn decode_battery(raw: &[u8]) -> Result<u8> {
    let mut buf = reader(raw, 1, "battery")?;
    let level = buf.get_u8();
    if level > 100 {
        return Err(Error::decode(format!("battery level {} is above 100%", level)));
    }
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery() {
        assert_eq!(decode_battery(&[87]).unwrap(), 87);
        assert!(matches!(decode_battery(&[0xFF]), Err(Error::Decode(_))));
        assert!(matches!(decode_battery(&[]), Err(Error::Decode(_))));
    }
}

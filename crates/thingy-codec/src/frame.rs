//! Length-checked payload access and input range checks shared by the codecs.

use std::fmt::Display;

use bytes::Buf;
use thingy_core::error::{Error, Result};

/// Borrow `raw` as a little-endian reader after checking it holds at least `len` bytes.
///
/// `bytes::Buf` getters panic on short input; every codec goes through
/// here first so a truncated notification becomes a decode error.
pub(crate) fn reader<'a>(raw: &'a [u8], len: usize, what: &str) -> Result<&'a [u8]> {
    if raw.len() < len {
        return Err(Error::decode(format!(
            "{} payload needs {} bytes, got {}",
            what,
            len,
            raw.len()
        )));
    }
    Ok(raw)
}

/// Reject `value` unless `min <= value <= max`.
pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + Display + Copy,
{
    if value < min || value > max {
        return Err(Error::validation(format!(
            "{} must be in the range {} - {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

/// Like [`check_range`] for real-valued inputs; NaN and infinities are rejected too.
pub(crate) fn check_range_f64(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::validation(format!("{} must be a finite number", field)));
    }
    check_range(field, value, min, max)
}

/// Read a little-endian `u16` at `offset`; the caller has checked the length.
pub(crate) fn u16_at(raw: &[u8], offset: usize) -> u16 {
    let mut buf = &raw[offset..];
    buf.get_u16_le()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_payload_is_decode_error() {
        assert!(matches!(reader(&[1, 2], 3, "tap"), Err(Error::Decode(_))));
        assert_eq!(reader(&[1, 2, 3, 4], 3, "tap").unwrap().len(), 4);
    }

    #[test]
    fn test_check_range_bounds_inclusive() {
        assert!(check_range("delay", 50u16, 50, 10000).is_ok());
        assert!(check_range("delay", 10000u16, 50, 10000).is_ok());
        let err = check_range("delay", 49u16, 50, 10000).unwrap_err();
        assert_eq!(
            err,
            Error::validation("delay must be in the range 50 - 10000, got 49")
        );
    }

    #[test]
    fn test_check_range_f64_rejects_nan() {
        assert!(check_range_f64("interval", 7.5, 7.5, 4000.0).is_ok());
        assert!(check_range_f64("interval", f64::NAN, 7.5, 4000.0).is_err());
        assert!(check_range_f64("interval", f64::INFINITY, 7.5, 4000.0).is_err());
    }
}

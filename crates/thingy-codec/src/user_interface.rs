/*!
 * User interface service codecs: the RGB LED and the button.
 */
use std::fmt;

use bytes::Buf;
use serde::{Deserialize, Serialize};
use thingy_core::error::{Error, Result};

use crate::frame::{check_range, reader};

/// Predefined LED colors used by the breathe and one-shot modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    /// Red (1)
    Red = 1,
    /// Green (2)
    Green = 2,
    /// Yellow (3)
    Yellow = 3,
    /// Blue (4)
    Blue = 4,
    /// Purple (5)
    Purple = 5,
    /// Cyan (6)
    Cyan = 6,
    /// White (7)
    White = 7,
}

impl LedColor {
    /// All colors in code order
    pub const ALL: [LedColor; 7] = [
        LedColor::Red,
        LedColor::Green,
        LedColor::Yellow,
        LedColor::Blue,
        LedColor::Purple,
        LedColor::Cyan,
        LedColor::White,
    ];

    /// Wire code, 1 - 7
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Look a color up by its wire code
    pub fn from_code(code: u8) -> Result<Self> {
        LedColor::ALL
            .get(usize::from(code).wrapping_sub(1))
            .copied()
            .ok_or_else(|| {
                Error::validation(format!(
                    "LED color code must be in the range 1 - 7, got {}",
                    code
                ))
            })
    }

    /// Look a color up by name
    pub fn from_name(name: &str) -> Result<Self> {
        LedColor::ALL
            .iter()
            .copied()
            .find(|color| color.to_string() == name)
            .ok_or_else(|| Error::validation(format!("unknown LED color '{}'", name)))
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedColor::Red => "red",
            LedColor::Green => "green",
            LedColor::Yellow => "yellow",
            LedColor::Blue => "blue",
            LedColor::Purple => "purple",
            LedColor::Cyan => "cyan",
            LedColor::White => "white",
        };
        f.write_str(name)
    }
}

/// LED state, both as read back from the device and as written to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LedMode {
    /// LED off
    Off,
    /// Constant RGB color
    Constant {
        /// Red, 0 - 255
        red: u8,
        /// Green, 0 - 255
        green: u8,
        /// Blue, 0 - 255
        blue: u8,
    },
    /// Breathing predefined color
    Breathe {
        /// Color
        color: LedColor,
        /// Intensity in percent, 0 - 100
        intensity: u8,
        /// Delay between breaths, 50 - 10000 ms
        delay: u16,
    },
    /// Single flash of a predefined color
    OneShot {
        /// Color
        color: LedColor,
        /// Intensity in percent, 0 - 100
        intensity: u8,
    },
}

const MODE_OFF: u8 = 0;
const MODE_CONSTANT: u8 = 1;
const MODE_BREATHE: u8 = 2;
const MODE_ONE_SHOT: u8 = 3;

/// Decode the LED register
pub fn decode_led(raw: &[u8]) -> Result<LedMode> {
    let mut buf = reader(raw, 1, "led")?;
    match buf.get_u8() {
        MODE_OFF => Ok(LedMode::Off),
        MODE_CONSTANT => {
            let mut buf = reader(raw, 4, "led constant")?;
            buf.advance(1);
            Ok(LedMode::Constant {
                red: buf.get_u8(),
                green: buf.get_u8(),
                blue: buf.get_u8(),
            })
        }
        MODE_BREATHE => {
            let mut buf = reader(raw, 5, "led breathe")?;
            buf.advance(1);
            Ok(LedMode::Breathe {
                color: LedColor::from_code(buf.get_u8()).map_err(|e| Error::decode(e.to_string()))?,
                intensity: buf.get_u8(),
                delay: buf.get_u16_le(),
            })
        }
        MODE_ONE_SHOT => {
            let mut buf = reader(raw, 3, "led one-shot")?;
            buf.advance(1);
            Ok(LedMode::OneShot {
                color: LedColor::from_code(buf.get_u8()).map_err(|e| Error::decode(e.to_string()))?,
                intensity: buf.get_u8(),
            })
        }
        other => Err(Error::decode(format!("unknown LED mode {}", other))),
    }
}

/// Validate and encode an LED command
pub fn encode_led(mode: &LedMode) -> Result<Vec<u8>> {
    match *mode {
        LedMode::Off => Ok(vec![MODE_OFF]),
        LedMode::Constant { red, green, blue } => Ok(vec![MODE_CONSTANT, red, green, blue]),
        LedMode::Breathe {
            color,
            intensity,
            delay,
        } => {
            check_range("LED intensity", intensity, 0, 100)?;
            check_range("LED delay", delay, 50, 10000)?;
            let [lo, hi] = delay.to_le_bytes();
            Ok(vec![MODE_BREATHE, color.code(), intensity, lo, hi])
        }
        LedMode::OneShot { color, intensity } => {
            check_range("LED intensity", intensity, 0, 100)?;
            Ok(vec![MODE_ONE_SHOT, color.code(), intensity])
        }
    }
}

/// Button state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// 1 while pressed, 0 when released
    pub state: u8,
}

impl Button {
    /// Whether the button is held down
    pub fn is_pressed(&self) -> bool {
        self.state != 0
    }
}

/// Decode the button state
pub fn decode_button(raw: &[u8]) -> Result<Button> {
    let mut buf = reader(raw, 1, "button")?;
    Ok(Button { state: buf.get_u8() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_led_encoding() {
        assert_eq!(encode_led(&LedMode::Off).unwrap(), vec![0]);
        assert_eq!(
            encode_led(&LedMode::Constant { red: 255, green: 0, blue: 16 }).unwrap(),
            vec![1, 255, 0, 16]
        );
        assert_eq!(
            encode_led(&LedMode::Breathe {
                color: LedColor::Red,
                intensity: 50,
                delay: 1000
            })
            .unwrap(),
            vec![2, 1, 50, 0xE8, 0x03]
        );
        assert_eq!(
            encode_led(&LedMode::OneShot { color: LedColor::Cyan, intensity: 20 }).unwrap(),
            vec![3, 6, 20]
        );
    }

    #[test]
    fn test_led_rejects_out_of_range() {
        let too_bright = LedMode::Breathe { color: LedColor::Blue, intensity: 101, delay: 1000 };
        assert!(matches!(encode_led(&too_bright), Err(Error::Validation(_))));

        let too_fast = LedMode::Breathe { color: LedColor::Blue, intensity: 10, delay: 49 };
        assert!(matches!(encode_led(&too_fast), Err(Error::Validation(_))));

        let too_slow = LedMode::Breathe { color: LedColor::Blue, intensity: 10, delay: 10001 };
        assert!(matches!(encode_led(&too_slow), Err(Error::Validation(_))));

        let one_shot = LedMode::OneShot { color: LedColor::White, intensity: 200 };
        assert!(matches!(encode_led(&one_shot), Err(Error::Validation(_))));
    }

    #[test]
    fn test_led_colors() {
        assert_eq!(LedColor::from_name("purple").unwrap(), LedColor::Purple);
        assert_eq!(LedColor::from_code(7).unwrap(), LedColor::White);
        assert!(LedColor::from_code(0).is_err());
        assert!(LedColor::from_code(8).is_err());
        assert!(LedColor::from_name("orange").is_err());
    }

    #[test]
    fn test_led_decode_errors() {
        assert!(matches!(decode_led(&[9]), Err(Error::Decode(_))));
        assert!(matches!(decode_led(&[2, 1, 50]), Err(Error::Decode(_))));
        assert!(matches!(decode_led(&[3, 0, 50]), Err(Error::Decode(_))));
        assert!(matches!(decode_led(&[]), Err(Error::Decode(_))));
    }

    proptest! {
        #[test]
        fn prop_breathe_round_trip(
            code in 1u8..=7,
            intensity in 0u8..=100,
            delay in 50u16..=10000,
        ) {
            let mode = LedMode::Breathe {
                color: LedColor::from_code(code).unwrap(),
                intensity,
                delay,
            };
            prop_assert_eq!(decode_led(&encode_led(&mode).unwrap()).unwrap(), mode);
        }

        #[test]
        fn prop_constant_round_trip(red: u8, green: u8, blue: u8) {
            let mode = LedMode::Constant { red, green, blue };
            prop_assert_eq!(decode_led(&encode_led(&mode).unwrap()).unwrap(), mode);
        }
    }

    #[test]
    fn test_button() {
        assert!(decode_button(&[1]).unwrap().is_pressed());
        assert!(!decode_button(&[0]).unwrap().is_pressed());
    }
}

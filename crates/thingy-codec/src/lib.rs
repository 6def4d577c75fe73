/*!
 * Thingy Codec
 *
 * Pure, stateless conversions between the Thingy:52 characteristic
 * payloads and typed values. Nothing in this crate performs I/O.
 *
 * Multi-byte fields are little-endian unless a module says otherwise.
 * Decoders check the payload length before reading; encoders validate
 * every field before building bytes.
 */

#![warn(missing_docs)]

mod frame;

pub mod adpcm;
pub mod battery;
pub mod codec;
pub mod configuration;
pub mod eddystone;
pub mod environment;
pub mod motion;
pub mod reading;
pub mod sound;
pub mod user_interface;

pub use codec::{Codec, Encoder};
pub use reading::{Command, Reading};

/// Thingy codec crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

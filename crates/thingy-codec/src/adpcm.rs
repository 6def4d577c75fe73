/*!
 * IMA ADPCM decoder for the microphone stream.
 *
 * A frame is a 3-byte header (big-endian `i16` predictor, `i8` step index)
 * followed by up to 128 bytes of 4-bit codes, high nibble first. Each frame
 * expands to 256 signed 16-bit samples at 16 kHz.
 */
use bytes::Buf;
use serde::{Deserialize, Serialize};
use thingy_core::error::{Error, Result};

use crate::frame::reader;

/// Microphone sample rate
pub const SAMPLE_RATE_HZ: u32 = 16_000;
/// Samples produced per frame
pub const SAMPLES_PER_FRAME: usize = 256;
/// Header bytes per frame
pub const HEADER_LEN: usize = 3;
/// Most ADPCM bytes a frame can carry
pub const MAX_DATA_LEN: usize = SAMPLES_PER_FRAME / 2;

const INDEX_TABLE: [i8; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

const STEP_SIZE_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66, 73,
    80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449, 494,
    544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272, 2499,
    2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493, 10442,
    11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

const MAX_INDEX: i32 = (STEP_SIZE_TABLE.len() - 1) as i32;

/// One decoded microphone frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFrame {
    /// Signed 16-bit samples; samples past the input's nibble count stay zero
    pub samples: Vec<i16>,
}

impl PcmFrame {
    /// Samples scaled to [-1.0, 1.0) for playback
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| f32::from(s) / 32768.0).collect()
    }

    /// Samples as little-endian bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Playback duration of the frame
    pub fn duration(&self) -> std::time::Duration {
        let micros = self.samples.len() as u64 * 1_000_000 / u64::from(SAMPLE_RATE_HZ);
        std::time::Duration::from_micros(micros)
    }
}

/// Decoder state carried from one nibble to the next
#[derive(Debug, Clone, Copy)]
struct DecoderState {
    predictor: i32,
    index: i32,
    step: i32,
}

impl DecoderState {
    fn new(predictor: i16, index: i8) -> Self {
        let index = i32::from(index).clamp(0, MAX_INDEX);
        Self {
            predictor: i32::from(predictor),
            index,
            step: STEP_SIZE_TABLE[index as usize],
        }
    }

    fn next_sample(&mut self, nibble: u8) -> i16 {
        let delta = nibble & 0x0F;

        self.index = (self.index + i32::from(INDEX_TABLE[usize::from(delta)])).clamp(0, MAX_INDEX);

        let negative = delta & 8 != 0;
        let magnitude = delta & 7;

        let mut diff = self.step >> 3;
        if magnitude & 4 != 0 {
            diff += self.step;
        }
        if magnitude & 2 != 0 {
            diff += self.step >> 1;
        }
        if magnitude & 1 != 0 {
            diff += self.step >> 2;
        }

        if negative {
            self.predictor -= diff;
        } else {
            self.predictor += diff;
        }
        self.predictor = self.predictor.clamp(i32::from(i16::MIN), i32::from(i16::MAX));

        self.step = STEP_SIZE_TABLE[self.index as usize];
        self.predictor as i16
    }
}

/// Decode one microphone frame
pub fn decode_frame(raw: &[u8]) -> Result<PcmFrame> {
    let mut buf = reader(raw, HEADER_LEN, "microphone")?;
    let data_len = raw.len() - HEADER_LEN;
    if data_len > MAX_DATA_LEN {
        return Err(Error::decode(format!(
            "microphone frame carries {} ADPCM bytes, at most {} fit in one frame",
            data_len, MAX_DATA_LEN
        )));
    }

    let predictor = buf.get_i16();
    let index = buf.get_i8();
    let mut state = DecoderState::new(predictor, index);

    let mut samples = vec![0i16; SAMPLES_PER_FRAME];
    let mut out = samples.iter_mut();
    for &byte in buf {
        for nibble in [byte >> 4, byte & 0x0F] {
            if let Some(slot) = out.next() {
                *slot = state.next_sample(nibble);
            }
        }
    }

    Ok(PcmFrame { samples })
}

/*!
 * Sound service codecs: sound configuration, speaker data and status.
 * The microphone stream lives in [`crate::adpcm`].
 */
use bytes::Buf;
use serde::{Deserialize, Serialize};
use thingy_core::error::{Error, Result};

use crate::frame::{check_range, reader};

/// Sound configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundConfig {
    /// 1 frequency, 2 8-bit PCM, 3 predefined sample
    pub speaker_mode: u8,
    /// 1 ADPCM, 2 sound pressure level
    pub microphone_mode: u8,
}

/// Partial update of the sound configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundConfigUpdate {
    /// Speaker mode, 1 - 3
    pub speaker_mode: Option<u8>,
    /// Microphone mode, 1 - 2
    pub microphone_mode: Option<u8>,
}

/// Data sent to the speaker; the variant must match the configured speaker mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SpeakerCommand {
    /// Play a tone
    Frequency {
        /// Tone frequency, Hz
        frequency_hz: u16,
        /// Tone duration, ms
        duration_ms: u16,
        /// Volume, 0 - 100
        volume: u8,
    },
    /// Stream unsigned 8-bit PCM samples
    Pcm {
        /// Samples
        samples: Vec<u8>,
    },
    /// Play one of the predefined samples
    Sample {
        /// Sample id
        sample_id: u8,
    },
}

/// Decode the sound configuration register
pub fn decode_sound_config(raw: &[u8]) -> Result<SoundConfig> {
    let mut buf = reader(raw, 2, "sound configuration")?;
    Ok(SoundConfig {
        speaker_mode: buf.get_u8(),
        microphone_mode: buf.get_u8(),
    })
}

impl SoundConfigUpdate {
    /// Check every provided field; at least one must be provided
    pub fn validate(&self) -> Result<()> {
        if self.speaker_mode.is_none() && self.microphone_mode.is_none() {
            return Err(Error::validation("sound configuration update sets no field"));
        }
        if let Some(mode) = self.speaker_mode {
            check_range("speaker mode", mode, 1, 3)?;
        }
        if let Some(mode) = self.microphone_mode {
            check_range("microphone mode", mode, 1, 2)?;
        }
        Ok(())
    }
}

/// Merge `update` into the current sound configuration register
pub fn encode_sound_config(update: &SoundConfigUpdate, current: &[u8]) -> Result<Vec<u8>> {
    update.validate()?;
    let current = decode_sound_config(current)?;
    Ok(vec![
        update.speaker_mode.unwrap_or(current.speaker_mode),
        update.microphone_mode.unwrap_or(current.microphone_mode),
    ])
}

/// Encode speaker data
pub fn encode_speaker(command: &SpeakerCommand) -> Result<Vec<u8>> {
    match command {
        SpeakerCommand::Frequency {
            frequency_hz,
            duration_ms,
            volume,
        } => {
            check_range("speaker volume", *volume, 0, 100)?;
            let mut out = Vec::with_capacity(5);
            out.extend_from_slice(&frequency_hz.to_le_bytes());
            out.extend_from_slice(&duration_ms.to_le_bytes());
            out.push(*volume);
            Ok(out)
        }
        SpeakerCommand::Pcm { samples } if samples.is_empty() => {
            Err(Error::validation("speaker PCM data is empty"))
        }
        SpeakerCommand::Pcm { samples } => Ok(samples.clone()),
        SpeakerCommand::Sample { sample_id } => Ok(vec![*sample_id]),
    }
}

/// Decode the speaker status byte
pub fn decode_speaker_status(raw: &[u8]) -> Result<i8> {
    let mut buf = reader(raw, 1, "speaker status")?;
    Ok(buf.get_i8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_config_partial_update() {
        let update = SoundConfigUpdate {
            speaker_mode: Some(3),
            microphone_mode: None,
        };
        assert_eq!(encode_sound_config(&update, &[1, 2]).unwrap(), vec![3, 2]);
        assert_eq!(
            decode_sound_config(&[3, 2]).unwrap(),
            SoundConfig { speaker_mode: 3, microphone_mode: 2 }
        );
    }

    #[test]
    fn test_sound_config_validation() {
        let update = SoundConfigUpdate { speaker_mode: Some(4), microphone_mode: None };
        assert!(matches!(update.validate(), Err(Error::Validation(_))));
        let update = SoundConfigUpdate { speaker_mode: None, microphone_mode: Some(0) };
        assert!(matches!(update.validate(), Err(Error::Validation(_))));
        assert!(SoundConfigUpdate::default().validate().is_err());
    }

    #[test]
    fn test_speaker_frequency() {
        let command = SpeakerCommand::Frequency {
            frequency_hz: 440,
            duration_ms: 1000,
            volume: 100,
        };
        assert_eq!(encode_speaker(&command).unwrap(), vec![0xB8, 0x01, 0xE8, 0x03, 100]);

        let loud = SpeakerCommand::Frequency { frequency_hz: 440, duration_ms: 10, volume: 101 };
        assert!(matches!(encode_speaker(&loud), Err(Error::Validation(_))));
    }

    #[test]
    fn test_speaker_pcm_and_sample() {
        let pcm = SpeakerCommand::Pcm { samples: vec![128, 130, 126] };
        assert_eq!(encode_speaker(&pcm).unwrap(), vec![128, 130, 126]);
        assert!(encode_speaker(&SpeakerCommand::Pcm { samples: vec![] }).is_err());
        assert_eq!(encode_speaker(&SpeakerCommand::Sample { sample_id: 2 }).unwrap(), vec![2]);
    }

    #[test]
    fn test_speaker_status() {
        assert_eq!(decode_speaker_status(&[0xFF]).unwrap(), -1);
    }
}

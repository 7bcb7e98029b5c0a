//! Chunk encoding and finalization.
//!
//! While recording, captured PCM is emitted as chunks of little-endian signed
//! 16-bit mono samples. On stop the chunks are concatenated and wrapped in a
//! WAV container, producing the immutable finalized clip.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::sync::Arc;

use super::error::RecorderError;

/// Encodes mono i16 samples as one chunk.
pub fn encode_chunk(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// The single immutable buffer a stopped session produces.
///
/// Cloning shares the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedAudio {
    bytes: Arc<[u8]>,
    sample_rate: u32,
    sample_count: usize,
}

impl FinalizedAudio {
    /// Concatenates chunks into a WAV clip.
    ///
    /// The result always carries a WAV header, so it is never empty even when no
    /// samples were captured.
    ///
    /// # Errors
    /// - If the WAV writer rejects the data (e.g. the clip exceeds 4 GiB)
    pub fn from_chunks(chunks: &[Vec<u8>], sample_rate: u32) -> Result<Self, RecorderError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut sample_count = 0usize;
        {
            let mut writer = WavWriter::new(&mut cursor, spec)
                .map_err(|e| RecorderError::Encoding(e.to_string()))?;
            for chunk in chunks {
                for pair in chunk.chunks_exact(2) {
                    writer
                        .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                        .map_err(|e| RecorderError::Encoding(e.to_string()))?;
                    sample_count += 1;
                }
            }
            writer
                .finalize()
                .map_err(|e| RecorderError::Encoding(e.to_string()))?;
        }

        let bytes: Arc<[u8]> = cursor.into_inner().into();
        tracing::debug!(
            "Finalized {} chunks into {} bytes ({} samples at {}Hz)",
            chunks.len(),
            bytes.len(),
            sample_count,
            sample_rate
        );

        Ok(Self {
            bytes,
            sample_rate,
            sample_count,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f32 / self.sample_rate as f32
    }
}

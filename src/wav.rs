//! Minimal RIFF/WAVE header synthesis for headerless PCM payloads.
//!
//! Speech models frequently return bare linear PCM. Wrapping those samples in
//! the canonical 44-byte header is enough for any WAV-aware decoder to play
//! them back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the canonical PCM WAV header in bytes.
pub const HEADER_LEN: usize = 44;

/// Size of the `fmt ` chunk body for plain linear PCM.
const FMT_CHUNK_LEN: u32 = 16;

/// WAVE format tag for uncompressed linear PCM.
const FORMAT_PCM: u16 = 1;

/// Bytes counted by the RIFF size field that precede the sample data.
const RIFF_OVERHEAD: u32 = (HEADER_LEN as u32) - 8;

/// Sample layout assumed for headerless payloads.
///
/// The default matches the speech model output: 24 kHz, mono, 16-bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Frames per second.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Interleaved channel count.
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Bits used by one sample of one channel.
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Builds a format from its three parameters.
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes occupied by one frame (all channels of one sample instant).
    pub fn block_align(&self) -> Option<u16> {
        self.channels.checked_mul(self.bits_per_sample / 8)
    }

    /// Bytes of sample data per second of audio.
    pub fn byte_rate(&self) -> Option<u32> {
        self.sample_rate
            .checked_mul(u32::from(self.block_align()?))
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::new(
            default_sample_rate(),
            default_channels(),
            default_bits_per_sample(),
        )
    }
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_channels() -> u16 {
    1
}

fn default_bits_per_sample() -> u16 {
    16
}

/// Reasons a header cannot describe a payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// The payload does not fit the 32-bit RIFF size fields.
    #[error("payload of {0} bytes does not fit the 32-bit WAV size fields")]
    PayloadTooLarge(u64),

    /// Channel count and bit depth overflow the byte-rate or block-align fields.
    #[error("PCM format {0:?} overflows the WAV rate fields")]
    FormatOverflow(PcmFormat),
}

/// Builds the 44-byte little-endian header for `data_len` bytes of PCM.
///
/// # Errors
/// [`HeaderError::PayloadTooLarge`] when `36 + data_len` overflows `u32`, and
/// [`HeaderError::FormatOverflow`] when the derived rate fields overflow.
pub fn build_header(
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    data_len: u32,
) -> Result<[u8; HEADER_LEN], HeaderError> {
    let format = PcmFormat::new(sample_rate, channels, bits_per_sample);
    let riff_len = RIFF_OVERHEAD
        .checked_add(data_len)
        .ok_or(HeaderError::PayloadTooLarge(u64::from(data_len)))?;
    let block_align = format
        .block_align()
        .ok_or(HeaderError::FormatOverflow(format))?;
    let byte_rate = format
        .byte_rate()
        .ok_or(HeaderError::FormatOverflow(format))?;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_len.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    Ok(header)
}

/// Builds the header for `format` describing a payload of `data_len` bytes.
///
/// # Errors
/// Same as [`build_header`]; lengths above `u32::MAX` are rejected rather
/// than truncated.
pub fn header_for(format: &PcmFormat, data_len: usize) -> Result<[u8; HEADER_LEN], HeaderError> {
    let data_len = u32::try_from(data_len)
        .map_err(|_| HeaderError::PayloadTooLarge(data_len as u64))?;
    build_header(
        format.sample_rate,
        format.channels,
        format.bits_per_sample,
        data_len,
    )
}

/// Prepends a synthesized header to raw PCM bytes.
///
/// # Errors
/// Propagates [`HeaderError`] from [`header_for`].
pub fn wrap_pcm(format: &PcmFormat, pcm: &[u8]) -> Result<Vec<u8>, HeaderError> {
    let header = header_for(format, pcm.len())?;
    let mut container = Vec::with_capacity(HEADER_LEN + pcm.len());
    container.extend_from_slice(&header);
    container.extend_from_slice(pcm);
    Ok(container)
}

//! WAV encoding
//!
//! 16-bit PCM RIFF/WAVE, framed by hand so the layout is always the
//! canonical 44-byte header followed by interleaved little-endian samples:
//!
//! ```text
//! 0  "RIFF"  4  36 + dataSize   8  "WAVE"
//! 12 "fmt "  16 16              20 1 (PCM)   22 channels
//! 24 sampleRate                 28 byteRate  32 blockAlign  34 16
//! 36 "data"  40 dataSize        44 samples...
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use mf_core::{PcmBuffer, Sample};

use crate::error::{DecodeError, OfflineError, OfflineResult};

/// Size of the canonical header
pub const WAV_HEADER_LEN: usize = 44;

/// PCM format tag
const FORMAT_PCM: u16 = 1;
/// Output sample width
const BITS_PER_SAMPLE: u16 = 16;

/// Audio encoder trait
pub trait AudioEncoder {
    /// Encode buffer to bytes
    fn encode(&self, buffer: &PcmBuffer) -> OfflineResult<Vec<u8>>;

    /// File extension
    fn extension(&self) -> &'static str;
}

/// 16-bit PCM WAV encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct Wav16Encoder;

impl AudioEncoder for Wav16Encoder {
    fn encode(&self, buffer: &PcmBuffer) -> OfflineResult<Vec<u8>> {
        encode_wav16(buffer)
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}

/// Convert one sample to 16-bit: clamp to `[-1, 1]`, scale negatives by
/// 32768 and positives by 32767, truncate toward zero
#[inline]
pub fn sample_to_i16(sample: Sample) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode `buffer` as a 16-bit PCM WAV file image
pub fn encode_wav16(buffer: &PcmBuffer) -> OfflineResult<Vec<u8>> {
    let header = WavHeader::pcm16(buffer)?;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + header.data_size as usize);
    out.extend_from_slice(&header.to_bytes());

    let channels: Vec<&[Sample]> = buffer.channels().collect();
    for frame in 0..buffer.frames() {
        for channel in &channels {
            out.extend_from_slice(&sample_to_i16(channel[frame]).to_le_bytes());
        }
    }
    Ok(out)
}

/// Encode and write to `path`; returns the number of bytes written
pub fn write_wav16(path: impl AsRef<Path>, buffer: &PcmBuffer) -> OfflineResult<u64> {
    let path = path.as_ref();
    let bytes = encode_wav16(buffer)?;
    fs::write(path, &bytes)?;
    debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes.len() as u64)
}

/// RIFF/WAVE header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Format tag (1 = PCM)
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Size of the `data` chunk in bytes
    pub data_size: u32,
}

impl WavHeader {
    /// Header for 16-bit PCM output of `buffer`
    pub fn pcm16(buffer: &PcmBuffer) -> OfflineResult<Self> {
        let channels = u16::try_from(buffer.channel_count()).map_err(|_| {
            OfflineError::Encoding(format!("too many channels: {}", buffer.channel_count()))
        })?;
        let block_align = channels
            .checked_mul(BITS_PER_SAMPLE / 8)
            .ok_or_else(|| OfflineError::Encoding(format!("too many channels: {channels}")))?;

        let data_size = (buffer.frames() as u64) * u64::from(block_align);
        // RIFF size field must also hold the 36 header bytes after it
        let data_size = u32::try_from(data_size)
            .ok()
            .filter(|size| size.checked_add(36).is_some())
            .ok_or_else(|| {
                OfflineError::Encoding(format!("{data_size} bytes of audio exceed the WAV limit"))
            })?;

        Ok(Self {
            format: FORMAT_PCM,
            channels,
            sample_rate: buffer.sample_rate(),
            byte_rate: buffer.sample_rate().saturating_mul(u32::from(block_align)),
            block_align,
            bits_per_sample: BITS_PER_SAMPLE,
            data_size,
        })
    }

    /// The canonical 44-byte header
    pub fn to_bytes(&self) -> [u8; WAV_HEADER_LEN] {
        let mut out = [0u8; WAV_HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&(36 + self.data_size).to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&self.format.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    /// Read the header of a RIFF/WAVE image.
    ///
    /// Walks the chunk list, so extra chunks and extended `fmt ` chunks are
    /// accepted.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(DecodeError::Header("missing RIFF/WAVE signature".into()));
        }

        let mut fmt: Option<&[u8]> = None;
        let mut pos = 12;
        while pos + 8 <= bytes.len() {
            let id = &bytes[pos..pos + 4];
            let size = read_u32(bytes, pos + 4)? as usize;
            let body = pos + 8;

            match id {
                b"fmt " => {
                    let end = body
                        .checked_add(size)
                        .filter(|&end| end <= bytes.len() && size >= 16)
                        .ok_or_else(|| DecodeError::Header("truncated fmt chunk".into()))?;
                    fmt = Some(&bytes[body..end]);
                }
                b"data" => {
                    let fmt = fmt.ok_or_else(|| {
                        DecodeError::Header("data chunk before fmt chunk".into())
                    })?;
                    return Ok(Self {
                        format: read_u16(fmt, 0)?,
                        channels: read_u16(fmt, 2)?,
                        sample_rate: read_u32(fmt, 4)?,
                        byte_rate: read_u32(fmt, 8)?,
                        block_align: read_u16(fmt, 12)?,
                        bits_per_sample: read_u16(fmt, 14)?,
                        data_size: size as u32,
                    });
                }
                _ => {}
            }

            // Chunks are word aligned
            pos = body.saturating_add(size).saturating_add(size & 1);
        }

        Err(DecodeError::Header("no data chunk".into()))
    }

    /// Number of sample frames declared by the header
    pub fn frames(&self) -> u32 {
        if self.block_align == 0 {
            0
        } else {
            self.data_size / u32::from(self.block_align)
        }
    }
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16, DecodeError> {
    bytes
        .get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or_else(|| DecodeError::Header(format!("truncated at byte {at}")))
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, DecodeError> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| DecodeError::Header(format!("truncated at byte {at}")))
}

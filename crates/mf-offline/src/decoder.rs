//! WAV decoding
//!
//! Uses hound for 8/16/24/32-bit integer and 32-bit float PCM. Integer
//! samples are scaled by `2^(bits-1)` into `[-1, 1)`.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};
use log::debug;
use mf_core::{PcmBuffer, Sample};

use crate::error::DecodeError;

/// Decode a WAV file
pub fn decode_wav(path: impl AsRef<Path>) -> Result<PcmBuffer, DecodeError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| DecodeError::Read(format!("{}: {e}", path.display())))?;
    let buffer = decode_reader(WavReader::new(BufReader::new(file))?)?;
    debug!(
        "decoded {}: {} ch, {} frames @ {} Hz",
        path.display(),
        buffer.channel_count(),
        buffer.frames(),
        buffer.sample_rate()
    );
    Ok(buffer)
}

/// Decode WAV bytes held in memory
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<PcmBuffer, DecodeError> {
    decode_reader(WavReader::new(Cursor::new(bytes))?)
}

fn decode_reader<R: Read>(mut reader: WavReader<R>) -> Result<PcmBuffer, DecodeError> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels);

    let interleaved: Vec<Sample> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 * scale))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits) => {
            return Err(DecodeError::UnsupportedFormat {
                format: "integer",
                bits,
            });
        }
        (SampleFormat::Float, bits) => {
            return Err(DecodeError::UnsupportedFormat {
                format: "float",
                bits,
            });
        }
    };

    Ok(PcmBuffer::from_interleaved(spec.sample_rate, channels, &interleaved)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hound::{WavSpec, WavWriter};

    fn write<F>(spec: WavSpec, f: F) -> Vec<u8>
    where
        F: FnOnce(&mut WavWriter<&mut Cursor<Vec<u8>>>),
    {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            f(&mut writer);
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn spec(channels: u16, bits: u16, format: SampleFormat) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: bits,
            sample_format: format,
        }
    }

    #[test]
    fn test_decode_16_bit_stereo() {
        let bytes = write(spec(2, 16, SampleFormat::Int), |w| {
            for s in [16384i16, -32768, 0, 32767] {
                w.write_sample(s).unwrap();
            }
        });
        let buffer = decode_wav_bytes(&bytes).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.channel(0).unwrap(), &[0.5, 0.0]);
        assert_eq!(buffer.channel(1).unwrap()[0], -1.0);
    }

    #[test]
    fn test_decode_8_and_24_bit() {
        let bytes = write(spec(1, 8, SampleFormat::Int), |w| {
            w.write_sample(64i8).unwrap();
        });
        assert_eq!(decode_wav_bytes(&bytes).unwrap().channel(0).unwrap(), &[0.5]);

        let bytes = write(spec(1, 24, SampleFormat::Int), |w| {
            w.write_sample(-4_194_304i32).unwrap();
        });
        assert_eq!(decode_wav_bytes(&bytes).unwrap().channel(0).unwrap(), &[-0.5]);
    }

    #[test]
    fn test_decode_float() {
        let bytes = write(spec(1, 32, SampleFormat::Float), |w| {
            w.write_sample(0.25f32).unwrap();
            w.write_sample(-1.5f32).unwrap();
        });
        let buffer = decode_wav_bytes(&bytes).unwrap();
        assert_relative_eq!(buffer.channel(0).unwrap()[0], 0.25);
        assert_relative_eq!(buffer.channel(0).unwrap()[1], -1.5);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            decode_wav_bytes(b"not a wav file at all"),
            Err(DecodeError::Read(_))
        ));
    }

    #[test]
    fn test_decode_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let mut writer = WavWriter::create(&path, spec(1, 16, SampleFormat::Int)).unwrap();
        for i in 0..100 {
            writer.write_sample((i * 100) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = decode_wav(&path).unwrap();
        assert_eq!(buffer.frames(), 100);
        assert_eq!(buffer.sample_rate(), 44100);
    }
}

//! Sample type and the immutable PCM buffer

use crate::{CoreError, CoreResult, linear_to_db};

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Decoded, de-interleaved PCM audio.
///
/// A buffer never changes after construction. Every processing stage reads
/// one buffer and produces a new one, so a stage can be abandoned at any
/// point without leaving a half-written buffer behind.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<Sample>>,
}

impl PcmBuffer {
    /// Create a buffer from per-channel sample vectors.
    ///
    /// All channels must have the same length and there must be at least one.
    pub fn new(sample_rate: u32, channels: Vec<Vec<Sample>>) -> CoreResult<Self> {
        if sample_rate == 0 {
            return Err(CoreError::InvalidSampleRate(sample_rate));
        }
        let Some(first) = channels.first() else {
            return Err(CoreError::NoChannels);
        };
        let expected = first.len();
        for (channel, data) in channels.iter().enumerate().skip(1) {
            if data.len() != expected {
                return Err(CoreError::ChannelLengthMismatch {
                    channel,
                    expected,
                    got: data.len(),
                });
            }
        }

        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Single-channel buffer
    pub fn mono(sample_rate: u32, samples: Vec<Sample>) -> CoreResult<Self> {
        Self::new(sample_rate, vec![samples])
    }

    /// Buffer of digital silence
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> CoreResult<Self> {
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count])
    }

    /// De-interleave `L R L R ...` style data
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        interleaved: &[Sample],
    ) -> CoreResult<Self> {
        if channel_count == 0 {
            return Err(CoreError::NoChannels);
        }
        if interleaved.len() % channel_count != 0 {
            return Err(CoreError::InterleaveMismatch {
                len: interleaved.len(),
                channels: channel_count,
            });
        }

        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }

        Self::new(sample_rate, channels)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Nyquist frequency in Hz
    #[inline]
    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> impl Iterator<Item = &[Sample]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Absolute peak across all channels (linear)
    pub fn peak(&self) -> Sample {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0, |peak, s| peak.max(s.abs()))
    }

    /// Absolute peak across all channels (dBFS)
    pub fn peak_db(&self) -> f64 {
        linear_to_db(self.peak())
    }

    /// Interleaved copy of the samples
    pub fn interleaved(&self) -> Vec<Sample> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for frame in 0..frames {
            for ch in &self.channels {
                out.push(ch[frame]);
            }
        }
        out
    }

    /// New buffer with a uniform linear gain applied to every sample
    pub fn scaled(&self, gain: Sample) -> Self {
        Self {
            sample_rate: self.sample_rate,
            channels: self
                .channels
                .iter()
                .map(|ch| ch.iter().map(|s| s * gain).collect())
                .collect(),
        }
    }

    /// Produce a new buffer by transforming every channel.
    ///
    /// The closure receives the channel index and its samples; it may change
    /// the channel length (e.g. convolution tails) as long as all channels
    /// come out equally long.
    pub fn try_map_channels<E, F>(&self, mut f: F) -> Result<Self, E>
    where
        E: From<CoreError>,
        F: FnMut(usize, &[Sample]) -> Result<Vec<Sample>, E>,
    {
        let channels = self
            .channels
            .iter()
            .enumerate()
            .map(|(index, ch)| f(index, ch))
            .collect::<Result<Vec<_>, E>>()?;

        Ok(Self::new(self.sample_rate, channels)?)
    }

    /// Infallible variant of [`PcmBuffer::try_map_channels`] for
    /// length-preserving transforms.
    pub fn map_channels<F>(&self, mut f: F) -> Self
    where
        F: FnMut(usize, &[Sample]) -> Vec<Sample>,
    {
        let channels: Vec<Vec<Sample>> = self
            .channels
            .iter()
            .enumerate()
            .map(|(index, ch)| {
                let out = f(index, ch);
                debug_assert_eq!(out.len(), ch.len());
                out
            })
            .collect();

        Self {
            sample_rate: self.sample_rate,
            channels,
        }
    }

    /// Take ownership of the channel data
    pub fn into_channels(self) -> Vec<Vec<Sample>> {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_channels() {
        let err = PcmBuffer::new(44100, vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert_eq!(
            err,
            CoreError::ChannelLengthMismatch {
                channel: 1,
                expected: 4,
                got: 3
            }
        );
    }

    #[test]
    fn test_rejects_empty_and_zero_rate() {
        assert_eq!(PcmBuffer::new(44100, vec![]), Err(CoreError::NoChannels));
        assert_eq!(
            PcmBuffer::mono(0, vec![0.0]),
            Err(CoreError::InvalidSampleRate(0))
        );
    }

    #[test]
    fn test_interleave_round_trip() {
        let buffer =
            PcmBuffer::from_interleaved(48000, 2, &[0.5, 0.3, -0.5, -0.3, 0.25, 0.15]).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0).unwrap(), &[0.5, -0.5, 0.25]);
        assert_eq!(buffer.channel(1).unwrap(), &[0.3, -0.3, 0.15]);
        assert_eq!(buffer.interleaved(), vec![0.5, 0.3, -0.5, -0.3, 0.25, 0.15]);
    }

    #[test]
    fn test_interleave_mismatch() {
        assert!(matches!(
            PcmBuffer::from_interleaved(48000, 2, &[0.0; 5]),
            Err(CoreError::InterleaveMismatch { len: 5, channels: 2 })
        ));
    }

    #[test]
    fn test_peak_spans_channels() {
        let buffer = PcmBuffer::new(44100, vec![vec![0.5, -0.2], vec![0.1, -0.8]]).unwrap();
        assert_eq!(buffer.peak(), 0.8);
    }

    #[test]
    fn test_scaled_leaves_source_untouched() {
        let buffer = PcmBuffer::mono(44100, vec![0.5, -0.5]).unwrap();
        let louder = buffer.scaled(2.0);
        assert_eq!(louder.channel(0).unwrap(), &[1.0, -1.0]);
        assert_eq!(buffer.channel(0).unwrap(), &[0.5, -0.5]);
    }
}

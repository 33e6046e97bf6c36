use std::{io::Cursor, sync::Arc};

use hound::{SampleFormat, WavReader};

use crate::{Result, WavecastError};

/// Decoded audio: one sample vector per channel plus timing metadata.
///
/// A signal is immutable once built. Everything downstream shares it through
/// [`SignalRef`] so sample data is never copied.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    duration: f64,
}

/// Shared, read-only handle to the current signal.
pub type SignalRef = Arc<DecodedSignal>;

impl DecodedSignal {
    /// Builds a signal from per-channel samples, validating the layout.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(WavecastError::decode("sample rate must be positive"));
        }
        let frames = match channels.first() {
            Some(first) => first.len(),
            None => return Err(WavecastError::decode("signal has no channels")),
        };
        if frames == 0 {
            return Err(WavecastError::decode("signal has no samples"));
        }
        if channels.iter().any(|channel| channel.len() != frames) {
            return Err(WavecastError::decode("channels have different lengths"));
        }

        Ok(Self {
            channels,
            sample_rate,
            duration: frames as f64 / sample_rate as f64,
        })
    }

    /// Convenience constructor for single channel material.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(vec![samples], sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the signal in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Index of the sample frame playing at `seconds`.
    pub fn sample_index(&self, seconds: f64) -> i64 {
        (seconds * self.sample_rate as f64).floor() as i64
    }

    /// Sample of `channel` at `index`. Anything outside the signal is silence.
    pub fn sample_or_silence(&self, channel: usize, index: i64) -> f32 {
        if index < 0 {
            return 0.0;
        }
        self.channels
            .get(channel)
            .and_then(|samples| samples.get(index as usize))
            .copied()
            .unwrap_or(0.0)
    }

    /// Channel average at `index`, silence outside the signal.
    pub fn mono_sample(&self, index: i64) -> f32 {
        if index < 0 || index as usize >= self.frame_count() {
            return 0.0;
        }
        let index = index as usize;
        let sum: f32 = self.channels.iter().map(|channel| channel[index]).sum();
        sum / self.channels.len() as f32
    }

    /// Appends interleaved sample frames `[start, end)` to `out`, clamped to the
    /// signal bounds.
    pub fn interleave_into(&self, start: usize, end: usize, out: &mut Vec<f32>) {
        let end = end.min(self.frame_count());
        if start >= end {
            return;
        }
        out.reserve((end - start) * self.channels.len());
        for index in start..end {
            for channel in &self.channels {
                out.push(channel[index]);
            }
        }
    }
}

/// Capability that turns encoded audio bytes into a [`DecodedSignal`].
pub trait Decoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedSignal>;
}

/// Decoder for RIFF/WAVE files: integer PCM at 8 to 32 bits and 32-bit float.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedSignal> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let channel_count = spec.channels as usize;
        if channel_count == 0 {
            return Err(WavecastError::decode("wav header declares zero channels"));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(sample.clamp(-1.0, 1.0));
            }
        }

        DecodedSignal::new(channels, spec.sample_rate)
    }
}

/// Holds the one signal that is current for a session.
///
/// Every load bumps a generation counter so holders of an older handle can
/// tell that they are stale.
#[derive(Debug, Default)]
pub struct SignalStore {
    current: Option<SignalRef>,
    generation: u64,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes` and makes the result current. On failure the previous
    /// signal stays in place.
    pub fn load(&mut self, decoder: &dyn Decoder, bytes: &[u8]) -> Result<SignalRef> {
        let signal = decoder.decode(bytes)?;
        Ok(self.replace(signal))
    }

    /// Installs an already decoded signal, discarding the old one.
    pub fn replace(&mut self, signal: DecodedSignal) -> SignalRef {
        let signal = Arc::new(signal);
        self.generation += 1;
        tracing::info!(
            generation = self.generation,
            channels = signal.channel_count(),
            sample_rate = signal.sample_rate(),
            duration = signal.duration(),
            "loaded audio signal"
        );
        self.current = Some(signal.clone());
        signal
    }

    pub fn current(&self) -> Option<&SignalRef> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(spec: WavSpec, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for sample in samples {
                writer.write_sample(*sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_stereo_pcm() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[16_384, -16_384, 0, 32_767]);

        let signal = WavDecoder.decode(&bytes).unwrap();
        assert_eq!(signal.channel_count(), 2);
        assert_eq!(signal.frame_count(), 2);
        assert!((signal.channel(0).unwrap()[0] - 0.5).abs() < 1e-4);
        assert!((signal.channel(1).unwrap()[0] + 0.5).abs() < 1e-4);
        assert!((signal.duration() - 2.0 / 8_000.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_garbage() {
        let err = WavDecoder.decode(b"definitely not a wav file").unwrap_err();
        assert!(matches!(err, WavecastError::Decode(_)));
    }

    #[test]
    fn validates_layout() {
        assert!(DecodedSignal::new(Vec::new(), 44_100).is_err());
        assert!(DecodedSignal::mono(vec![0.0; 4], 0).is_err());
        assert!(DecodedSignal::new(vec![vec![0.0; 4], vec![0.0; 3]], 44_100).is_err());
    }

    #[test]
    fn out_of_range_reads_are_silent() {
        let signal = DecodedSignal::mono(vec![0.5; 10], 10).unwrap();
        assert_eq!(signal.sample_or_silence(0, -1), 0.0);
        assert_eq!(signal.sample_or_silence(0, 10), 0.0);
        assert_eq!(signal.sample_or_silence(3, 0), 0.0);
        assert_eq!(signal.mono_sample(9), 0.5);
    }

    #[test]
    fn failed_load_keeps_previous_signal() {
        let mut store = SignalStore::new();
        store.replace(DecodedSignal::mono(vec![0.1; 8], 8).unwrap());
        assert!(store.load(&WavDecoder, b"nope").is_err());
        assert_eq!(store.generation(), 1);
        assert_eq!(store.current().unwrap().frame_count(), 8);
    }
}

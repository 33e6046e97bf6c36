use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AnalyzerConfig, DecodedSignal, Result, WavecastError};

/// Magnitude per frequency bin, each in `[0, 255]`, for one playback instant.
///
/// The length is fixed by the analyzer that produced it and never changes for
/// the lifetime of that analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySnapshot {
    bins: Vec<u8>,
}

impl FrequencySnapshot {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    /// A snapshot of `len` silent bins.
    pub fn silent(len: usize) -> Self {
        Self { bins: vec![0; len] }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin `index` as a value in `[0, 1]`; missing bins read as zero.
    pub fn normalized(&self, index: usize) -> f32 {
        self.bins.get(index).map_or(0.0, |value| *value as f32 / 255.0)
    }

    /// Value for output sample `i` of `count` when stretching or squeezing the
    /// snapshot, using the lower neighbour `floor(i / count * len)`.
    pub fn resampled(&self, i: usize, count: usize) -> f32 {
        if count == 0 || self.bins.is_empty() {
            return 0.0;
        }
        let index = (i as f64 / count as f64 * self.bins.len() as f64).floor() as usize;
        self.normalized(index.min(self.bins.len() - 1))
    }

    /// Mean of the lowest `fraction` of bins, in `[0, 255]`. At least one bin is
    /// always included.
    pub fn low_band_average(&self, fraction: f32) -> f32 {
        if self.bins.is_empty() {
            return 0.0;
        }
        let count = ((self.bins.len() as f32 * fraction).floor() as usize)
            .clamp(1, self.bins.len());
        let sum: u32 = self.bins[..count].iter().map(|value| *value as u32).sum();
        sum as f32 / count as f32
    }
}

/// Short-time spectrum analyzer in the style of a browser analyser node:
/// Blackman window, real FFT, temporal smoothing and a decibel to byte mapping.
///
/// Each consumer (live preview, export) owns its own instance; the snapshot
/// buffer is only ever borrowed between updates so a render never sees a
/// half-written spectrum.
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    smoothed: Vec<f32>,
    snapshot: FrequencySnapshot,
    window: Vec<f32>,
    fft: FftResources,
}

impl SpectrumAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        if config.fft_size < 32 || !config.fft_size.is_power_of_two() {
            return Err(WavecastError::msg(format!(
                "fft size must be a power of two of at least 32, got {}",
                config.fft_size
            )));
        }
        if !(0.0..1.0).contains(&config.smoothing) || config.max_db <= config.min_db {
            return Err(WavecastError::msg("analyzer smoothing or decibel range is invalid"));
        }

        let size = config.fft_size;
        let bins = config.bin_count();
        let window = (0..size).map(|index| blackman_value(index, size)).collect();
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        Ok(Self {
            smoothed: vec![0.0; bins],
            snapshot: FrequencySnapshot::silent(bins),
            window,
            fft: FftResources {
                scratch: plan.make_scratch_vec(),
                spectrum: plan.make_output_vec(),
                input: plan.make_input_vec(),
                plan,
            },
            config,
        })
    }

    pub fn bin_count(&self) -> usize {
        self.snapshot.len()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Most recently computed snapshot.
    pub fn snapshot(&self) -> &FrequencySnapshot {
        &self.snapshot
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
        self.snapshot = FrequencySnapshot::silent(self.smoothed.len());
    }

    /// Analyses the window of samples that ends at `position` seconds and
    /// returns the updated snapshot.
    pub fn analyze(
        &mut self,
        signal: &DecodedSignal,
        position: f64,
    ) -> Result<&FrequencySnapshot> {
        let size = self.config.fft_size;
        let end = signal.sample_index(position);
        let start = end.saturating_sub(size as i64);

        for (offset, slot) in self.fft.input.iter_mut().enumerate() {
            let index = start.saturating_add(offset as i64);
            *slot = signal.mono_sample(index) * self.window[offset];
        }

        let fft = &mut self.fft;
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
            .map_err(|err| WavecastError::msg(format!("fft failed: {err}")))?;

        let tau = self.config.smoothing;
        let range = self.config.max_db - self.config.min_db;
        let scale = 1.0 / size as f32;
        let mut bins = std::mem::take(&mut self.snapshot.bins);

        for ((bin, smoothed), out) in self
            .fft
            .spectrum
            .iter()
            .zip(self.smoothed.iter_mut())
            .zip(bins.iter_mut())
        {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            *out = to_byte(*smoothed, self.config.min_db, range);
        }

        self.snapshot.bins = bins;
        Ok(&self.snapshot)
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("config", &self.config)
            .field("bins", &self.snapshot.len())
            .finish()
    }
}

fn to_byte(magnitude: f32, min_db: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    (255.0 * (db - min_db) / range).floor().clamp(0.0, 255.0) as u8
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let phase = 2.0 * PI * index as f32 / len as f32;
    A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos()
}

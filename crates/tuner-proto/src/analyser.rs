//! Frequency analyser: turns mono PCM into byte magnitudes the way a Web
//! Audio `AnalyserNode` does: Blackman window, FFT, exponential smoothing,
//! decibel scaling into 0..=255.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::spectrum::FrequencySource;

pub const DEFAULT_FFT_SIZE: usize = 4096;
pub const DEFAULT_SMOOTHING_TIME_CONSTANT: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnalyserError {
    #[error("fft size {0} must be a power of two in 32..=32768")]
    FftSize(usize),
    #[error("smoothing time constant {0} outside 0..=1")]
    Smoothing(f32),
    #[error("min decibels {0} must be below max decibels {1}")]
    Decibels(f32, f32),
}

/// Blackman window, alpha = 0.16.
fn blackman(size: usize) -> Vec<f32> {
    let alpha = 0.16;
    let a0 = (1. - alpha) / 2.;
    let a1 = 1. / 2.;
    let a2 = alpha / 2.;
    (0..size)
        .map(|i| {
            let t = i as f32 / size as f32;
            a0 - a1 * (2. * PI * t).cos() + a2 * (4. * PI * t).cos()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing_time_constant: DEFAULT_SMOOTHING_TIME_CONSTANT,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }
}

impl AnalyserOptions {
    pub fn validate(&self) -> Result<(), AnalyserError> {
        if !self.fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(AnalyserError::FftSize(self.fft_size));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(AnalyserError::Smoothing(self.smoothing_time_constant));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(AnalyserError::Decibels(self.min_decibels, self.max_decibels));
        }
        Ok(())
    }
}

pub struct Analyser {
    opts: AnalyserOptions,
    sample_rate: f32,
    /// Most recent `fft_size` samples, oldest first.
    ring: VecDeque<f32>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Smoothed linear magnitudes, `fft_size / 2` entries.
    smoothed: Vec<f32>,
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("opts", &self.opts)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl Analyser {
    pub fn new(opts: AnalyserOptions, sample_rate: f32) -> Result<Self, AnalyserError> {
        opts.validate()?;
        let n = opts.fft_size;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Ok(Self {
            opts,
            sample_rate,
            ring: VecDeque::with_capacity(n),
            fft,
            window: blackman(n),
            buffer: vec![Complex::default(); n],
            scratch,
            smoothed: vec![0.0; n / 2],
        })
    }

    /// Length of the byte frequency array (`fft_size / 2`).
    pub fn frequency_bin_count(&self) -> usize {
        self.opts.fft_size / 2
    }

    /// Append mono samples normalised to -1..1.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let n = self.opts.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let overflow = (self.ring.len() + tail.len()).saturating_sub(n);
        self.ring.drain(..overflow);
        self.ring.extend(tail.iter().copied());
    }

    /// Drop buffered audio and smoothing history (station change).
    pub fn reset(&mut self) {
        self.ring.clear();
        self.smoothed.fill(0.0);
    }

    fn compute_fft(&mut self) {
        let n = self.opts.fft_size;
        let tau = self.opts.smoothing_time_constant;

        // Zero-pad at the front while the ring is still filling.
        let pad = n - self.ring.len();
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { self.ring[i - pad] };
            *slot = Complex::new(s * self.window[i], 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let norm = 1.0 / n as f32;
        for (o, c) in self.smoothed.iter_mut().zip(self.buffer.iter()) {
            let value = tau * *o + (1.0 - tau) * c.norm() * norm;
            *o = if value.is_finite() { value } else { 0.0 };
        }
    }

    /// Recompute the spectrum and write byte magnitudes into `dst`.
    /// Extra elements beyond `frequency_bin_count` are left untouched.
    pub fn get_byte_frequency_data(&mut self, dst: &mut [u8]) {
        self.compute_fft();
        let min_db = self.opts.min_decibels;
        let max_db = self.opts.max_decibels;
        for (v, m) in dst.iter_mut().zip(self.smoothed.iter()) {
            let db = 20.0 * m.log10();
            let scaled = 255.0 / (max_db - min_db) * (db - min_db);
            *v = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

impl FrequencySource for Analyser {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn fill_byte_frequency_data(&mut self, dst: &mut [u8]) {
        self.get_byte_frequency_data(dst);
    }
}

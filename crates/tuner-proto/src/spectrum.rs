//! Log-frequency bar spectrum.
//!
//! Each frame pulls byte magnitudes (0–255) from a [`FrequencySource`], maps
//! sample indices onto a `log2` axis between `start_freq` and `end_freq`, and
//! draws one bar per bin holding the loudest sample that fell into it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Layout parameters.  Defaults: 20 bars from 20 Hz to 15 kHz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumParams {
    pub bins: usize,
    pub start_freq: f64,
    pub end_freq: f64,
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            bins: 20,
            start_freq: 20.0,
            end_freq: 15000.0,
        }
    }
}

/// Mapping from sample index to bar index for one buffer length / sample
/// rate combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLayout {
    pub start_index: usize,
    pub end_index: usize,
    bins: usize,
    m: f64,
    b: f64,
}

fn freq(i: usize) -> f64 {
    (i as f64).log2()
}

impl BinLayout {
    /// `None` when the buffer is too short to span at least two distinct
    /// positions (`end_index - 1 <= start_index`).
    pub fn new(params: &SpectrumParams, sample_count: usize, sample_rate: f32) -> Option<Self> {
        if sample_count < 2 || params.bins == 0 || sample_rate <= 0.0 {
            return None;
        }
        let n = sample_count as f64;
        let nyquist = sample_rate as f64 / 2.0;
        let start_index = (n * params.start_freq / nyquist).max(1.0).round() as usize;
        let end_index = (n * params.end_freq / nyquist)
            .min((sample_count - 1) as f64)
            .round() as usize;

        if end_index < 1 || end_index - 1 <= start_index {
            return None;
        }

        // x(start) = 0, x(end - 1) = 1
        let start = freq(start_index);
        let end = freq(end_index - 1);
        let m = 1.0 / (end - start);
        let b = -start * m;

        Some(Self {
            start_index,
            end_index,
            bins: params.bins,
            m,
            b,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Normalised position of sample `i` on the log axis.
    pub fn position(&self, i: usize) -> f64 {
        self.m * freq(i) + self.b
    }

    pub fn bar_index(&self, i: usize) -> usize {
        (self.position(i) * self.bins as f64).floor().max(0.0) as usize
    }
}

/// A filled rectangle in surface coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Where bars end up.  The TUI draws into terminal cells, tests record them.
pub trait Surface {
    /// `(width, height)` in surface units.
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    fn fill_rect(&mut self, bar: Bar);
}

/// The analysis side of the pipeline.
pub trait FrequencySource {
    fn sample_rate(&self) -> f32;
    /// Overwrite `dst` with the current byte magnitudes.
    fn fill_byte_frequency_data(&mut self, dst: &mut [u8]);
}

fn flush(surface: &mut impl Surface, layout: &BinLayout, index: usize, peak: u8) {
    // Overflow bars past the right edge are never visible.
    if index >= layout.bins {
        return;
    }
    let (width, height) = surface.size();
    let bins = layout.bins as f64;
    let h = height * peak as f64 / 256.0;
    surface.fill_rect(Bar {
        index,
        x: width * index as f64 / bins,
        y: height - h,
        width: (width / bins - 2.0).max(0.0),
        height: h,
    });
}

/// Clear `surface` and draw one frame of `samples`.
pub fn draw_frame(layout: &BinLayout, samples: &[u8], surface: &mut impl Surface) {
    surface.clear();

    let mut current = 0usize;
    let mut peak = 0u8;
    for i in layout.start_index..=layout.end_index {
        let bar = layout.bar_index(i);
        if bar > current {
            flush(surface, layout, current, peak);
            current = bar;
            peak = 0;
        }
        peak = peak.max(samples.get(i).copied().unwrap_or(0));
    }
}

/// Owns the reused sample buffer and drives frames until cancelled.
pub struct RenderLoop {
    params: SpectrumParams,
    samples: Vec<u8>,
    layout: Option<BinLayout>,
    layout_rate: f32,
    frames: u64,
}

impl RenderLoop {
    /// `sample_count` is the analyser's frequency bin count (`fft_size / 2`).
    pub fn new(params: SpectrumParams, sample_count: usize) -> Self {
        Self {
            params,
            samples: vec![0; sample_count],
            layout: None,
            layout_rate: 0.0,
            frames: 0,
        }
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn layout_for(&mut self, sample_rate: f32) -> Option<BinLayout> {
        if self.layout.is_none() || self.layout_rate != sample_rate {
            self.layout = BinLayout::new(&self.params, self.samples.len(), sample_rate);
            self.layout_rate = sample_rate;
            debug!("spectrum: layout {:?} at {} Hz", self.layout, sample_rate);
        }
        self.layout
    }

    /// Render a single frame.
    pub fn render(&mut self, source: &mut impl FrequencySource, surface: &mut impl Surface) {
        self.frames += 1;
        source.fill_byte_frequency_data(&mut self.samples);
        match self.layout_for(source.sample_rate()) {
            Some(layout) => draw_frame(&layout, &self.samples, surface),
            None => surface.clear(),
        }
    }

    /// Render one frame per `interval` until `cancel` fires or `max_frames`
    /// frames have been drawn.  Returns the number of frames rendered by this
    /// call.
    pub async fn run(
        &mut self,
        source: &mut impl FrequencySource,
        surface: &mut impl Surface,
        interval: Duration,
        cancel: &CancellationToken,
        max_frames: Option<u64>,
    ) -> u64 {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut rendered = 0u64;

        loop {
            if max_frames.is_some_and(|max| rendered >= max) {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.render(source, surface);
            rendered += 1;
        }
        rendered
    }
}

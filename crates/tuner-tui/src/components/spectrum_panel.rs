//! Spectrum pane: the log-frequency bar display.
//!
//! PCM chunks from the ffmpeg tap go into an `Analyser`; every frame tick the
//! `RenderLoop` pulls byte magnitudes from it and draws bars into a
//! `CellSurface`, which the pane paints with block characters.
//!
//! Surface units: each cell is `SUB_COLS` units wide and `SUB_ROWS` tall, so
//! the two-unit gap between bars is half a cell and heights have eighth-cell
//! resolution.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use tuner_proto::analyser::{Analyser, AnalyserError};
use tuner_proto::config::Config;
use tuner_proto::spectrum::{Bar, RenderLoop, Surface};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::bar_color,
    widgets::pane_chrome::{pane_chrome, Badge},
};

pub const SUB_COLS: f64 = 4.0;
pub const SUB_ROWS: f64 = 8.0;

const PARTIAL_BLOCKS: [char; 8] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇'];

/// Terminal-cell drawing surface.  Bars are recorded per frame and turned
/// into block characters on paint.
#[derive(Debug, Default)]
pub struct CellSurface {
    cols: u16,
    rows: u16,
    bars: Vec<Bar>,
}

impl CellSurface {
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) != (self.cols, self.rows) {
            self.cols = cols;
            self.rows = rows;
            self.bars.clear();
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Filled height of each column, in eighths of a cell.
    pub fn column_heights(&self) -> Vec<u16> {
        let max = self.rows as f64 * SUB_ROWS;
        (0..self.cols)
            .map(|c| {
                let center = (c as f64 + 0.5) * SUB_COLS;
                self.bars
                    .iter()
                    .find(|b| b.x <= center && center < b.x + b.width)
                    .map(|b| b.height.min(max).round() as u16)
                    .unwrap_or(0)
            })
            .collect()
    }

    /// One string per row, top to bottom.
    pub fn lines(&self) -> Vec<String> {
        let heights = self.column_heights();
        (0..self.rows)
            .map(|r| {
                let level = self.rows - 1 - r;
                heights
                    .iter()
                    .map(|&h| {
                        let full = h / 8;
                        if level < full {
                            '█'
                        } else if level == full {
                            PARTIAL_BLOCKS[(h % 8) as usize]
                        } else {
                            ' '
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

impl Surface for CellSurface {
    fn size(&self) -> (f64, f64) {
        (self.cols as f64 * SUB_COLS, self.rows as f64 * SUB_ROWS)
    }

    fn clear(&mut self) {
        self.bars.clear();
    }

    fn fill_rect(&mut self, bar: Bar) {
        self.bars.push(bar);
    }
}

pub struct SpectrumPanel {
    analyser: Analyser,
    render_loop: RenderLoop,
    surface: CellSurface,
    receiving: bool,
}

impl SpectrumPanel {
    pub fn new(config: &Config) -> Result<Self, AnalyserError> {
        let analyser = Analyser::new(
            config.spectrum.analyser_options(),
            config.audio.sample_rate as f32,
        )?;
        let render_loop =
            RenderLoop::new(config.spectrum.params(), analyser.frequency_bin_count());
        Ok(Self {
            analyser,
            render_loop,
            surface: CellSurface::default(),
            receiving: false,
        })
    }

    pub fn push_pcm(&mut self, samples: &[f32]) {
        self.analyser.push_samples(samples);
        self.receiving = true;
    }

    /// New stream or playback stopped: forget old audio.
    pub fn reset(&mut self) {
        self.analyser.reset();
        self.receiving = false;
    }

    /// Draw one frame into the surface.
    pub fn render_frame(&mut self) {
        self.render_loop.render(&mut self.analyser, &mut self.surface);
    }

    pub fn frames(&self) -> u64 {
        self.render_loop.frames()
    }

    #[cfg(test)]
    fn surface_mut(&mut self) -> &mut CellSurface {
        &mut self.surface
    }
}

impl Component for SpectrumPanel {
    fn id(&self) -> ComponentId {
        ComponentId::Spectrum
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, _state: &AppState) {
        let badge = if self.receiving {
            Badge::Receiving
        } else {
            Badge::Idle
        };
        let block = pane_chrome("spectrum", '3', focused, Some(badge));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        self.surface.resize(inner.width, inner.height);
        let rows = inner.height.max(1) as f64;
        let lines: Vec<Line> = self
            .surface
            .lines()
            .into_iter()
            .enumerate()
            .map(|(r, text)| {
                let t = 1.0 - r as f64 / rows;
                Line::from(Span::styled(text, Style::default().fg(bar_color(t))))
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }
}

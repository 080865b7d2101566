use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;
use crate::analyser::{
    AnalyserOptions, DEFAULT_FFT_SIZE, DEFAULT_MAX_DECIBELS, DEFAULT_MIN_DECIBELS,
    DEFAULT_SMOOTHING_TIME_CONSTANT,
};
use crate::spectrum::SpectrumParams;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Where the Icecast server lives and how often it is polled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL; `status-json.xsl` and mount ids are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory holding `{id}.png` station icons.
    #[serde(default = "default_icons_dir")]
    pub icons_dir: PathBuf,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumConfig {
    #[serde(default = "default_bins")]
    pub bins: usize,
    #[serde(default = "default_start_freq")]
    pub start_freq: f64,
    #[serde(default = "default_end_freq")]
    pub end_freq: f64,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing_time_constant: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
    /// Render loop frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Rate the ffmpeg tap resamples to; the analyser uses the same rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            icons_dir: default_icons_dir(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            start_freq: default_start_freq(),
            end_freq: default_end_freq(),
            fft_size: default_fft_size(),
            smoothing_time_constant: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
            fps: default_fps(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            default_volume: default_volume(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl SpectrumConfig {
    pub fn params(&self) -> SpectrumParams {
        SpectrumParams {
            bins: self.bins,
            start_freq: self.start_freq,
            end_freq: self.end_freq,
        }
    }

    pub fn analyser_options(&self) -> AnalyserOptions {
        AnalyserOptions {
            fft_size: self.fft_size,
            smoothing_time_constant: self.smoothing_time_constant,
            min_decibels: self.min_decibels,
            max_decibels: self.max_decibels,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/".to_string()
}

fn default_icons_dir() -> PathBuf {
    PathBuf::from("icons")
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_bins() -> usize {
    20
}

fn default_start_freq() -> f64 {
    20.0
}

fn default_end_freq() -> f64 {
    15000.0
}

fn default_fft_size() -> usize {
    DEFAULT_FFT_SIZE
}

fn default_smoothing() -> f32 {
    DEFAULT_SMOOTHING_TIME_CONSTANT
}

fn default_min_decibels() -> f32 {
    DEFAULT_MIN_DECIBELS
}

fn default_max_decibels() -> f32 {
    DEFAULT_MAX_DECIBELS
}

fn default_fps() -> u32 {
    30
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_volume() -> f32 {
    0.5
}

fn default_http_enabled() -> bool {
    false
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

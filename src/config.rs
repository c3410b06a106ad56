//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter for the cleaning and
//! segmentation pipeline as one explicit value — no ambient state. All
//! fields default to the clinical deployment settings.
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::artifact::WindowConfig;
use crate::segment::{default_exclusions, default_translations, Segmenter};

/// Configuration for the full cleaning and segmentation pipeline.
///
/// All fields are `pub`, so struct-update syntax works:
///
/// ```
/// use eegseg::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     block_secs: 10.0,          // longer dataset blocks
///     threshold_uv: 150.0,       // more tolerant window scan
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds trimmed from each end of a recording before any processing.
    ///
    /// Default: `5.0`.
    pub crop_secs: f64,

    /// Band-pass corner frequencies `[low, high]` in Hz, applied before the
    /// cleaning stages. Must satisfy `0 < low < high`.
    ///
    /// Default: `[0.5, 45.0]`.
    pub bandpass: [f64; 2],

    /// Mains frequencies notched out before band-passing.
    ///
    /// Default: `[50.0, 60.0]`.
    pub notch_freqs: Vec<f64>,

    /// Outlier threshold in channel standard deviations for the per-channel
    /// mask.
    ///
    /// Default: `3.0`.
    pub sigma: f32,

    /// Window length in seconds for the cross-channel artifact scan.
    /// A trailing partial window is never corrected.
    ///
    /// Default: `1.0`.
    pub window_secs: f64,

    /// Peak-amplitude threshold (µV) flagging a channel within a window.
    ///
    /// Default: `100.0`.
    pub threshold_uv: f32,

    /// Fraction of channels that must be flagged for a window to count as a
    /// global artifact. Must lie in `[0, 1]`.
    ///
    /// Default: `0.8`.
    pub quorum: f64,

    /// Target duration of dataset blocks in seconds. Segments shorter than
    /// one block contribute nothing.
    ///
    /// Default: `5.0`.
    pub block_secs: f64,

    /// Min-max scale every channel to `[0, 1]` after cleaning. With this
    /// set, a zero-range channel is a hard failure for the recording.
    ///
    /// Default: `true`.
    pub normalize: bool,

    /// Annotation texts excluded from segmentation (exact match against the
    /// raw or bracket-stripped text).
    pub exclusions: Vec<String>,

    /// Ordered `(pattern, tag)` substring table; first match wins.
    pub translations: Vec<(String, String)>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crop_secs: 5.0,
            bandpass: [0.5, 45.0],
            notch_freqs: vec![50.0, 60.0],
            sigma: 3.0,
            window_secs: 1.0,
            threshold_uv: 100.0,
            quorum: 0.8,
            block_secs: 5.0,
            normalize: true,
            exclusions: default_exclusions(),
            translations: default_translations(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file and validate.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let [low, high] = self.bandpass;
        ensure!(
            low > 0.0 && low < high,
            "bandpass must be two ascending positive frequencies, got [{low}, {high}]"
        );
        ensure!(
            (0.0..=1.0).contains(&self.quorum),
            "quorum must lie in [0, 1], got {}",
            self.quorum
        );
        ensure!(self.crop_secs >= 0.0, "crop_secs must be non-negative");
        for (name, v) in [
            ("sigma", self.sigma as f64),
            ("window_secs", self.window_secs),
            ("block_secs", self.block_secs),
        ] {
            ensure!(v > 0.0, "{name} must be positive, got {v}");
        }
        Ok(())
    }

    /// The window-scan slice of this configuration.
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            window_secs: self.window_secs,
            threshold_uv: self.threshold_uv,
            quorum: self.quorum,
        }
    }

    /// Segmenter built from the configured tables.
    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(self.exclusions.clone(), self.translations.clone())
    }
}

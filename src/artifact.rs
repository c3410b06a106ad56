//! Window-level cross-channel artifact correction.
//!
//! Complements the per-channel mask in [`crate::mask`]: isolated spikes are
//! repaired cheaply by interpolation, while simultaneous amplitude
//! excursions across most channels (electrode movement, cable pull) are
//! handed to an external denoising primitive, one window at a time.
use anyhow::{ensure, Result};
use log::debug;
use ndarray::{s, Array2};

/// External denoising primitive.
///
/// Implementations take one channel's window, return a cleaned window of
/// identical length, and keep no state between calls. Amplitude units are
/// the caller's; any internal rescaling is the implementation's business.
pub trait Denoise {
    fn denoise(&self, window: &[f32]) -> Result<Vec<f32>>;
}

/// Identity denoiser: detection without correction.
///
/// Useful for dry runs and for exercising the window logic in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Denoise for Passthrough {
    fn denoise(&self, window: &[f32]) -> Result<Vec<f32>> {
        Ok(window.to_vec())
    }
}

/// Tuning for the window scan. Defaults match the clinical deployment:
/// 1 s windows, 100 µV peak threshold, 0.8 channel quorum.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Window length in seconds. The segment is partitioned into
    /// non-overlapping windows of this length; a trailing partial window is
    /// ignored.
    pub window_secs: f64,
    /// Peak-amplitude threshold in microvolts. A channel is flagged when its
    /// absolute peak within the window exceeds this.
    pub threshold_uv: f32,
    /// Minimum fraction of channels that must be flagged for the window to
    /// count as a global artifact.
    pub quorum: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { window_secs: 1.0, threshold_uv: 100.0, quorum: 0.8 }
    }
}

/// Scan `data` (`[C, T]`, volts) in non-overlapping windows and denoise
/// every channel of each window that meets the cross-channel quorum.
///
/// A window is a *global artifact window* when at least
/// `ceil(quorum * n_channels)` channels exceed `threshold_uv` peak absolute
/// amplitude inside it. All channels of such a window — flagged or not —
/// are replaced by the denoiser's output; other windows are untouched.
///
/// Returns the number of windows corrected.
pub fn correct_windows<D: Denoise>(
    data: &mut Array2<f32>,
    sfreq: f64,
    cfg: &WindowConfig,
    denoiser: &D,
) -> Result<usize> {
    let (n_ch, n_t) = data.dim();
    let window = (cfg.window_secs * sfreq) as usize;
    if window == 0 || n_ch == 0 {
        return Ok(0);
    }
    let n_windows = n_t / window;
    let need = (cfg.quorum * n_ch as f64).ceil() as usize;

    let mut corrected = 0;
    for w in 0..n_windows {
        let a = w * window;
        let b = a + window;

        let flagged = (0..n_ch)
            .filter(|&c| {
                let peak_uv = data
                    .slice(s![c, a..b])
                    .iter()
                    .map(|v| (v * 1e6).abs())
                    .fold(0.0_f32, f32::max);
                peak_uv > cfg.threshold_uv
            })
            .count();

        if flagged < need {
            continue;
        }
        debug!("window {}/{n_windows}: {flagged}/{n_ch} channels over threshold, denoising", w + 1);

        for c in 0..n_ch {
            let raw: Vec<f32> = data.slice(s![c, a..b]).to_vec();
            let cleaned = denoiser.denoise(&raw)?;
            ensure!(
                cleaned.len() == window,
                "denoiser returned {} samples for a {window}-sample window",
                cleaned.len()
            );
            data.slice_mut(s![c, a..b])
                .assign(&ndarray::ArrayView1::from(&cleaned[..]));
        }
        corrected += 1;
    }
    Ok(corrected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Denoiser stub that zeroes the window, making corrections visible.
    struct Zeroing;

    impl Denoise for Zeroing {
        fn denoise(&self, window: &[f32]) -> Result<Vec<f32>> {
            Ok(vec![0.0; window.len()])
        }
    }

    /// 19 channels, 3 one-second windows at 100 Hz. `hot` channels carry a
    /// 200 µV square burst in window 1 only.
    fn burst(hot: usize) -> Array2<f32> {
        Array2::from_shape_fn((19, 300), |(c, t)| {
            if c < hot && (100..200).contains(&t) {
                200e-6
            } else {
                1e-6
            }
        })
    }

    #[test]
    fn quorum_met_denoises_every_channel() {
        // ceil(0.8 * 19) = 16 flagged channels reach quorum; all 19 are
        // denoised, not just the flagged ones.
        let mut data = burst(16);
        let n = correct_windows(&mut data, 100.0, &WindowConfig::default(), &Zeroing).unwrap();
        assert_eq!(n, 1);
        for c in 0..19 {
            for t in 100..200 {
                assert_eq!(data[[c, t]], 0.0, "ch {c} t {t} not denoised");
            }
        }
        // Window 0 stayed untouched.
        assert!(data[[0, 0]] != 0.0);
    }

    #[test]
    fn below_quorum_leaves_window_untouched() {
        let mut data = burst(15);
        let before = data.clone();
        let n = correct_windows(&mut data, 100.0, &WindowConfig::default(), &Zeroing).unwrap();
        assert_eq!(n, 0);
        assert_eq!(data, before);
    }

    #[test]
    fn trailing_partial_window_is_ignored() {
        // 250 samples at 100 Hz: two full windows plus a 50-sample tail that
        // is loud on every channel but must not be corrected.
        let mut data = Array2::from_shape_fn((4, 250), |(_, t)| {
            if t >= 200 { 500e-6 } else { 1e-6 }
        });
        let n = correct_windows(&mut data, 100.0, &WindowConfig::default(), &Zeroing).unwrap();
        assert_eq!(n, 0);
        assert!(data.slice(s![.., 200..]).iter().all(|&v| v == 500e-6));
    }

    #[test]
    fn passthrough_counts_without_changing_data() {
        let mut data = burst(19);
        let before = data.clone();
        let n = correct_windows(&mut data, 100.0, &WindowConfig::default(), &Passthrough).unwrap();
        assert_eq!(n, 1);
        assert_eq!(data, before);
    }
}

//! Per-channel 3-sigma outlier suppression.
//!
//! For each channel: samples deviating from the channel mean by more than
//! `sigma` standard deviations are flagged, replaced by the channel mean,
//! then linearly interpolated from the surrounding unflagged samples.
//! Statistics are computed over the whole segment, not a sliding window, so
//! the mask also catches channel-wide drift.
use ndarray::Array2;

/// Boolean matrix with the same shape as the data it masks; `true` marks a
/// sample considered corrupted. Produced and consumed here, never persisted.
pub type ArtifactMask = Array2<bool>;

/// Flag samples whose absolute deviation from the channel mean exceeds
/// `sigma` channel standard deviations.
///
/// A zero-variance channel produces no flags.
pub fn outlier_mask(data: &Array2<f32>, sigma: f32) -> ArtifactMask {
    let (n_ch, n_t) = data.dim();
    let mut mask = ArtifactMask::from_elem((n_ch, n_t), false);

    for c in 0..n_ch {
        let row = data.row(c);
        let n = n_t as f64;
        let mean = row.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = row.iter().map(|&v| {
            let d = v as f64 - mean;
            d * d
        }).sum::<f64>() / n;
        let limit = sigma as f64 * var.sqrt();

        for (t, &v) in row.iter().enumerate() {
            if (v as f64 - mean).abs() > limit {
                mask[[c, t]] = true;
            }
        }
    }
    mask
}

/// Mask outliers and repair them, returning the cleaned copy and the mask.
///
/// Flagged samples are first replaced by the channel mean. Channels with at
/// least two unflagged samples then get the flagged positions linearly
/// interpolated in sample-index space, with the unflagged positions as
/// control points; positions outside the control range take the nearest
/// endpoint value. Channels with fewer than two unflagged samples keep the
/// mean substitute — a degraded-but-safe fallback, not an error.
///
/// Pure transform: the input is untouched and every sample outside the mask
/// is bit-identical to its input.
pub fn suppress_outliers(data: &Array2<f32>, sigma: f32) -> (Array2<f32>, ArtifactMask) {
    let mask = outlier_mask(data, sigma);
    let mut out = data.clone();
    let (n_ch, n_t) = out.dim();

    for c in 0..n_ch {
        let flagged: Vec<usize> = (0..n_t).filter(|&t| mask[[c, t]]).collect();
        if flagged.is_empty() {
            continue;
        }

        let good: Vec<usize> = (0..n_t).filter(|&t| !mask[[c, t]]).collect();
        let mean = {
            let row = data.row(c);
            (row.iter().map(|&v| v as f64).sum::<f64>() / n_t as f64) as f32
        };
        for &t in &flagged {
            out[[c, t]] = mean;
        }

        if good.len() >= 2 {
            let values: Vec<f32> = good.iter().map(|&t| data[[c, t]]).collect();
            for &t in &flagged {
                out[[c, t]] = interp(t, &good, &values);
            }
        }
    }
    (out, mask)
}

/// Piecewise-linear interpolation of position `t` over sorted control points
/// `xs` with values `ys`; clamps to the endpoint values outside the range.
fn interp(t: usize, xs: &[usize], ys: &[f32]) -> f32 {
    if t <= xs[0] {
        return ys[0];
    }
    if t >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    // First control point strictly right of t.
    let hi = xs.partition_point(|&x| x < t);
    let lo = hi - 1;
    let frac = (t - xs[lo]) as f64 / (xs[hi] - xs[lo]) as f64;
    (ys[lo] as f64 + frac * (ys[hi] as f64 - ys[lo] as f64)) as f32
}

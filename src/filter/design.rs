//! Windowed-sinc FIR design.
//!
//! Band-pass kernels are built as the difference of two Hamming-windowed
//! lowpass kernels at the band edges; notch kernels as the sum of a lowpass
//! below and a highpass above the notched frequency. Kernel lengths follow
//! the `ceil(3.3 / trans_bw * sfreq)` rule, rounded to odd as required for
//! a linear-phase filter.
use std::f64::consts::PI;

/// Transition bandwidth for a corner frequency: `min(max(0.25·f, 2.0), f)`.
pub fn auto_trans_bandwidth(freq: f64) -> f64 {
    (0.25 * freq).max(2.0).min(freq)
}

/// Number of FIR taps for a transition bandwidth, rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n % 2 == 0 { n + 1 } else { n }
}

/// Hamming-windowed sinc kernel of odd length `n`.
///
/// `pass_zero = true` gives a lowpass with unit DC gain; `false` spectrally
/// inverts it into the complementary highpass.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for a linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);
    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Unit DC gain.
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Band-pass kernel for corners `low_hz < high_hz`.
///
/// Difference of two lowpass kernels of a shared length, chosen from the
/// narrower transition band of the two edges.
pub fn design_bandpass(low_hz: f64, high_hz: f64, sfreq: f64) -> Vec<f32> {
    let n_low = auto_filter_length(auto_trans_bandwidth(low_hz), sfreq);
    let n_high = auto_filter_length(auto_trans_bandwidth(high_hz), sfreq);
    let n = n_low.max(n_high);

    let upper = firwin(n, high_hz, sfreq, true);
    let lower = firwin(n, low_hz, sfreq, true);
    upper
        .iter()
        .zip(&lower)
        .map(|(u, l)| (u - l) as f32)
        .collect()
}

/// Notch (band-stop) kernel centred on `freq_hz` with ±1 Hz half-width.
///
/// Sum of a lowpass below and a highpass above the stop band.
pub fn design_notch(freq_hz: f64, sfreq: f64) -> Vec<f32> {
    const HALF_WIDTH_HZ: f64 = 1.0;
    let n = auto_filter_length(HALF_WIDTH_HZ, sfreq);

    let below = firwin(n, freq_hz - HALF_WIDTH_HZ, sfreq, true);
    let above = firwin(n, freq_hz + HALF_WIDTH_HZ, sfreq, false);
    below
        .iter()
        .zip(&above)
        .map(|(b, a)| (b + a) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_lengths_are_odd() {
        for f in [0.5, 1.0, 45.0] {
            let n = auto_filter_length(auto_trans_bandwidth(f), 256.0);
            assert!(n % 2 == 1, "N={n} even for f={f}");
        }
        assert!(design_bandpass(0.5, 45.0, 256.0).len() % 2 == 1);
        assert!(design_notch(50.0, 256.0).len() % 2 == 1);
    }

    #[test]
    fn bandpass_blocks_dc() {
        let h = design_bandpass(0.5, 45.0, 256.0);
        let s: f32 = h.iter().sum();
        assert!(s.abs() < 1e-4, "band-pass DC gain = {s}");
    }

    #[test]
    fn notch_passes_dc() {
        let h = design_notch(50.0, 256.0);
        let s: f32 = h.iter().sum();
        approx::assert_abs_diff_eq!(s, 1.0, epsilon = 1e-4_f32);
    }

    #[test]
    fn kernels_are_symmetric() {
        let h = design_bandpass(0.5, 45.0, 256.0);
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-6_f32);
        }
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, 10.0, 256.0, true);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-9);
    }
}

//! Zero-phase FIR application.
//!
//! One FFT product over the whole (padded) signal per channel. Zero phase
//! comes from shifting the convolution output left by `(N-1)/2`; the edge
//! transient is suppressed by reflect-limited padding of `N-1` samples on
//! each side.
use anyhow::{ensure, Result};
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

/// Apply a zero-phase FIR filter to each channel of `data` (`[C, T]`)
/// in place. `h` must have odd length.
pub fn apply_fir_zero_phase(data: &mut Array2<f32>, h: &[f32]) -> Result<()> {
    for ch in 0..data.nrows() {
        let row: Vec<f32> = data.row(ch).to_vec();
        let filtered = filter_1d(&row, h)?;
        data.row_mut(ch).assign(&ndarray::ArrayView1::from(&filtered[..]));
    }
    Ok(())
}

/// Filter one 1-D signal; returns a vector of the same length as `x`.
pub fn filter_1d(x: &[f32], h: &[f32]) -> Result<Vec<f32>> {
    let n_x = x.len();
    let n_h = h.len();
    ensure!(n_h % 2 == 1, "FIR kernel length must be odd, got {n_h}");
    if n_x == 0 {
        return Ok(vec![]);
    }

    let shift = (n_h - 1) / 2;
    let n_edge = n_h - 1;

    let x_ext = reflect_limited_pad(x, n_edge);
    let n_ext = x_ext.len();
    let n_fft = (n_ext + n_h - 1).next_power_of_two();

    let mut planner: FftPlanner<f32> = FftPlanner::new();
    let fwd = planner.plan_fft_forward(n_fft);
    let inv = planner.plan_fft_inverse(n_fft);

    let mut buf: Vec<Complex<f32>> = x_ext
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n_fft)
        .collect();
    let mut h_buf: Vec<Complex<f32>> = h
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n_fft)
        .collect();

    fwd.process(&mut buf);
    fwd.process(&mut h_buf);
    for (b, hf) in buf.iter_mut().zip(&h_buf) {
        *b *= hf;
    }
    inv.process(&mut buf);

    let scale = 1.0 / n_fft as f32;
    // x_ext[j] sits at convolution index j + shift once the phase shift is
    // undone; the original signal starts at x_ext index n_edge.
    let start = n_edge + shift;
    Ok(buf[start..start + n_x].iter().map(|c| c.re * scale).collect())
}

/// Reflect-limited padding: odd reflection around the end samples, zeros
/// once the requested padding exceeds the signal.
fn reflect_limited_pad(x: &[f32], n_pad: usize) -> Vec<f32> {
    let n = x.len();
    let k = n_pad.min(n - 1);
    let mut out = Vec::with_capacity(n + 2 * n_pad);

    out.extend(std::iter::repeat(0.0).take(n_pad - k));
    out.extend((1..=k).rev().map(|i| 2.0 * x[0] - x[i]));
    out.extend_from_slice(x);
    let last = x[n - 1];
    out.extend((1..=k).map(|i| 2.0 * last - x[n - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(n_pad - k));
    out
}

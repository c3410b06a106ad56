//! FIR band-pass and notch filtering.
//!
//! - [`design`]: Hamming-windowed sinc kernels for band-pass and band-stop
//!   (notch) responses.
//! - [`apply`]: zero-phase application via FFT convolution with
//!   reflect-limited edge padding.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d};
pub use design::{auto_filter_length, auto_trans_bandwidth, design_bandpass, design_notch, firwin, hamming};

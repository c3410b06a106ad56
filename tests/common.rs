/// Shared helpers: synthetic recordings and denoiser stubs.
use eegseg::artifact::Denoise;
use eegseg::{Annotation, Gender, Recording, SubjectInfo};
use ndarray::Array2;

/// Multi-channel recording filled with in-band sine tones (volts), one
/// slightly detuned tone per channel so no channel is flat.
#[allow(unused)]
pub fn synthetic_recording(
    id: &str,
    n_ch: usize,
    secs: f64,
    sfreq: f64,
    annotations: Vec<Annotation>,
) -> Recording {
    let n_t = (secs * sfreq) as usize;
    let data = Array2::from_shape_fn((n_ch, n_t), |(c, t)| {
        let freq = 8.0 + c as f64 * 0.5;
        let phase = 2.0 * std::f64::consts::PI * freq * t as f64 / sfreq;
        (20e-6 * phase.sin()) as f32
    });
    Recording {
        id: id.into(),
        ch_names: (0..n_ch).map(|c| format!("EEG{c:02}")).collect(),
        units: vec!["uV".into(); n_ch],
        sfreq,
        data,
        annotations,
        subject: Some(SubjectInfo { gender: Gender::Female, age: Some(23) }),
        meas_date: None,
    }
}

/// Denoiser stub that zeroes whatever it is given, making corrected
/// windows visible in the output.
#[allow(unused)]
pub struct Zeroing;

impl Denoise for Zeroing {
    fn denoise(&self, window: &[f32]) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.0; window.len()])
    }
}

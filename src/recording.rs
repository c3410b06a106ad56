//! Recording data model: the multi-channel sample matrix, its annotation
//! timeline and subject demographics.
//!
//! All pipeline stages operate on copies or views of a [`Recording`]; none of
//! them mutates a caller's recording across a stage boundary.
use chrono::{DateTime, Utc};
use ndarray::{s, Array2};
use thiserror::Error;

/// A timestamped textual event marker embedded in a recording.
///
/// Onsets are recording-relative seconds. Annotations are immutable once
/// read from the source file; [`Recording::crop`] produces shifted copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub onset: f64,
    pub duration: f64,
    pub label: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: f64, label: impl Into<String>) -> Self {
        Self { onset, duration, label: label.into() }
    }
}

/// Subject sex as encoded in clinical recording headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// Map the header sex code (1 = male, 2 = female, anything else unknown).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Gender::Male,
            2 => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    /// Single-letter code used in dataset metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Unknown => "N",
        }
    }
}

/// Demographics attached to a recording, used for dataset metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubjectInfo {
    pub gender: Gender,
    /// Age in whole years at measurement time, if known.
    pub age: Option<u32>,
}

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("invalid crop span {start:.3}..{end:.3} s for a {duration:.3} s recording")]
    BadCropSpan { start: f64, end: f64, duration: f64 },

    #[error("channel {0} has zero dynamic range, normalisation impossible")]
    ZeroRangeChannel(String),
}

/// One multi-channel biomedical time-series capture with annotations.
///
/// `data` is `[C, T]`: one row per channel, one column per sample.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Stable identifier, normally the source file stem (e.g. `"004520"`).
    pub id: String,
    pub ch_names: Vec<String>,
    /// Physical unit per channel (e.g. `"uV"`), parallel to `ch_names`.
    pub units: Vec<String>,
    /// Sampling rate in Hz.
    pub sfreq: f64,
    pub data: Array2<f32>,
    pub annotations: Vec<Annotation>,
    pub subject: Option<SubjectInfo>,
    pub meas_date: Option<DateTime<Utc>>,
}

impl Recording {
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Total duration in seconds (`n_samples / sfreq`).
    pub fn duration(&self) -> f64 {
        self.n_samples() as f64 / self.sfreq
    }

    /// Copy out the span `[start, end)` seconds.
    ///
    /// Annotation onsets are shifted by `-start` so they stay aligned to the
    /// cropped timeline; annotations whose shifted onset falls outside the
    /// kept span are dropped.
    pub fn crop(&self, start: f64, end: f64) -> Result<Recording, RecordingError> {
        let duration = self.duration();
        if !(0.0..=duration).contains(&start) || end <= start || end > duration + 1e-9 {
            return Err(RecordingError::BadCropSpan { start, end, duration });
        }

        let a = (start * self.sfreq).round() as usize;
        let b = ((end * self.sfreq).round() as usize).min(self.n_samples());
        let data = self.data.slice(s![.., a..b]).to_owned();
        let new_duration = data.ncols() as f64 / self.sfreq;

        let annotations = self
            .annotations
            .iter()
            .filter_map(|ann| {
                let onset = ann.onset - start;
                (onset >= 0.0 && onset < new_duration).then(|| Annotation {
                    onset,
                    duration: ann.duration,
                    label: ann.label.clone(),
                })
            })
            .collect();

        Ok(Recording {
            id: self.id.clone(),
            ch_names: self.ch_names.clone(),
            units: self.units.clone(),
            sfreq: self.sfreq,
            data,
            annotations,
            subject: self.subject.clone(),
            meas_date: self.meas_date,
        })
    }

    /// Drop `span` seconds from both ends of the recording.
    ///
    /// This is the edge trim applied before any cleaning; recordings shorter
    /// than `2 * span` cannot be trimmed.
    pub fn crop_edges(&self, span: f64) -> Result<Recording, RecordingError> {
        self.crop(span, self.duration() - span)
    }

    /// Scale every channel to `[0, 1]` via `(x - min) / (max - min)`.
    ///
    /// Unlike the masking fallbacks, a zero-range channel here is a hard
    /// error: the caller explicitly asked for normalisation and a constant
    /// channel cannot provide one.
    pub fn normalize_min_max(&mut self) -> Result<(), RecordingError> {
        for (c, mut row) in self.data.rows_mut().into_iter().enumerate() {
            let min = row.iter().copied().fold(f32::INFINITY, f32::min);
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let range = max - min;
            if range == 0.0 {
                let name = self
                    .ch_names
                    .get(c)
                    .cloned()
                    .unwrap_or_else(|| c.to_string());
                return Err(RecordingError::ZeroRangeChannel(name));
            }
            row.mapv_inplace(|v| (v - min) / range);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn rec_with(annotations: Vec<Annotation>) -> Recording {
        Recording {
            id: "r1".into(),
            ch_names: vec!["Fp1".into(), "Fp2".into()],
            units: vec!["uV".into(); 2],
            sfreq: 100.0,
            data: Array2::from_shape_fn((2, 1000), |(c, t)| (c * 1000 + t) as f32),
            annotations,
            subject: None,
            meas_date: None,
        }
    }

    #[test]
    fn crop_shifts_annotation_onsets() {
        let rec = rec_with(vec![
            Annotation::new(1.0, 0.0, "early"),
            Annotation::new(5.0, 0.0, "kept"),
            Annotation::new(9.5, 0.0, "late"),
        ]);
        let cropped = rec.crop(3.0, 8.0).unwrap();
        assert_eq!(cropped.n_samples(), 500);
        assert_eq!(cropped.annotations.len(), 1);
        approx::assert_abs_diff_eq!(cropped.annotations[0].onset, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn crop_edges_trims_both_sides() {
        let rec = rec_with(vec![]);
        let cropped = rec.crop_edges(2.0).unwrap();
        assert_eq!(cropped.n_samples(), 600);
        // First kept sample is the one at t = 2.0 s.
        assert_eq!(cropped.data[[0, 0]], 200.0);
    }

    #[test]
    fn crop_rejects_inverted_span() {
        let rec = rec_with(vec![]);
        assert!(rec.crop(5.0, 3.0).is_err());
    }

    #[test]
    fn min_max_normalisation_spans_unit_interval() {
        let mut rec = rec_with(vec![]);
        rec.normalize_min_max().unwrap();
        for row in rec.data.rows() {
            let min = row.iter().copied().fold(f32::INFINITY, f32::min);
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            approx::assert_abs_diff_eq!(min, 0.0, epsilon = 1e-6_f32);
            approx::assert_abs_diff_eq!(max, 1.0, epsilon = 1e-6_f32);
        }
    }

    #[test]
    fn min_max_rejects_flat_channel() {
        let mut rec = rec_with(vec![]);
        rec.data.row_mut(1).fill(3.0);
        let err = rec.normalize_min_max().unwrap_err();
        assert!(matches!(err, RecordingError::ZeroRangeChannel(ref ch) if ch == "Fp2"));
    }

    #[test]
    fn gender_codes() {
        assert_eq!(Gender::from_code(1).as_str(), "M");
        assert_eq!(Gender::from_code(2).as_str(), "F");
        assert_eq!(Gender::from_code(0).as_str(), "N");
    }
}

//! Per-recording pipeline driver and batch loop.
//!
//! One recording runs sequentially to completion: crop → notch → band-pass
//! → per-pre-segment outlier masking and window correction → (optional)
//! min-max normalisation → annotation segmentation → block splitting →
//! label lookup → store append. The unit of retry and of failure is one
//! whole recording; a failed recording is logged and the batch continues.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use ndarray::s;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::artifact::{correct_windows, Denoise};
use crate::block::{block_samples, split_blocks, stack_blocks};
use crate::config::PipelineConfig;
use crate::filter::{apply_fir_zero_phase, design_bandpass, design_notch};
use crate::io;
use crate::label::{age_category, LabelLookup};
use crate::mask::suppress_outliers;
use crate::recording::{Recording, SubjectInfo};
use crate::segment::{Segment, Segmenter};
use crate::store::{BlockSink, GroupAttrs, GroupKey, RecordingMeta};

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input-integrity failure: the recording is skipped and its local
    /// artifact removed; the batch continues.
    #[error("integrity check failed for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch { path: PathBuf, expected: String, actual: String },

    /// No label class for a recording id: the store step is skipped for
    /// that recording, not fatal to the batch.
    #[error("no label mapping for recording {0}")]
    MissingLabel(String),
}

/// Result of cleaning one recording.
pub struct CleanReport {
    pub recording: Recording,
    /// Windows handed to the denoising primitive.
    pub corrected_windows: usize,
}

/// What one recording contributed, for batch accounting.
pub struct RecordingSummary {
    pub id: String,
    pub segments: Vec<Segment>,
    pub blocks_appended: usize,
    pub corrected_windows: usize,
    /// False when the label lookup came up empty and the store was skipped.
    pub stored: bool,
}

/// Crop, filter and clean one recording.
///
/// The masker and window corrector run per *pre-segment*: the spans fenced
/// by the recording edges and the onsets of non-excluded annotations, so
/// artifact statistics never straddle a protocol event.
pub fn clean_recording<D: Denoise>(
    rec: &Recording,
    cfg: &PipelineConfig,
    denoiser: &D,
) -> Result<CleanReport> {
    cfg.validate()?;
    let mut rec = if cfg.crop_secs > 0.0 {
        rec.crop_edges(cfg.crop_secs)?
    } else {
        rec.clone()
    };

    let nyquist = rec.sfreq / 2.0;
    for &freq in &cfg.notch_freqs {
        if freq + 1.0 >= nyquist {
            warn!("notch at {freq} Hz skipped: too close to Nyquist ({nyquist} Hz)");
            continue;
        }
        let h = design_notch(freq, rec.sfreq);
        apply_fir_zero_phase(&mut rec.data, &h)?;
    }
    let h = design_bandpass(cfg.bandpass[0], cfg.bandpass[1], rec.sfreq);
    apply_fir_zero_phase(&mut rec.data, &h)?;

    let segmenter = cfg.segmenter();
    let bounds = pre_segment_bounds(&segmenter, &rec);
    let window_cfg = cfg.window_config();
    let mut corrected = 0;
    for w in bounds.windows(2) {
        let a = (w[0] * rec.sfreq).round() as usize;
        let b = (((w[1] * rec.sfreq).round()) as usize).min(rec.n_samples());
        if b <= a {
            continue;
        }
        let span = rec.data.slice(s![.., a..b]).to_owned();
        let (mut cleaned, _) = suppress_outliers(&span, cfg.sigma);
        corrected += correct_windows(&mut cleaned, rec.sfreq, &window_cfg, denoiser)?;
        rec.data.slice_mut(s![.., a..b]).assign(&cleaned);
    }

    if cfg.normalize {
        rec.normalize_min_max()?;
    }

    Ok(CleanReport { recording: rec, corrected_windows: corrected })
}

/// Cleaning spans: recording edges plus every non-excluded annotation
/// onset strictly inside the recording.
fn pre_segment_bounds(segmenter: &Segmenter, rec: &Recording) -> Vec<f64> {
    let duration = rec.duration();
    let mut bounds = vec![0.0];
    let mut onsets: Vec<f64> = rec
        .annotations
        .iter()
        .filter(|a| segmenter.canonical_label(&a.label).is_some())
        .map(|a| a.onset)
        .filter(|&t| t > 0.0 && t < duration)
        .collect();
    onsets.sort_by(f64::total_cmp);
    bounds.extend(onsets);
    bounds.push(duration);
    bounds
}

/// Run the full pipeline for one already-loaded recording and append its
/// blocks to `store`.
///
/// `source_file` is the provenance name recorded with every append.
pub fn process_recording<D: Denoise, S: BlockSink>(
    rec: &Recording,
    source_file: &str,
    cfg: &PipelineConfig,
    denoiser: &D,
    labels: &dyn LabelLookup,
    store: &mut S,
) -> Result<RecordingSummary> {
    let report = clean_recording(rec, cfg, denoiser)?;
    let clean = &report.recording;

    let segmenter = cfg.segmenter();
    let segments = segmenter.segments(&clean.annotations, clean.duration());
    info!(
        "{}: {} segments, {} corrected windows",
        rec.id,
        segments.len(),
        report.corrected_windows
    );

    let Some(label_class) = labels.lookup(&rec.id) else {
        warn!("{}; skipping store step", PipelineError::MissingLabel(rec.id.clone()));
        return Ok(RecordingSummary {
            id: rec.id.clone(),
            segments,
            blocks_appended: 0,
            corrected_windows: report.corrected_windows,
            stored: false,
        });
    };

    let subject = clean.subject.clone().unwrap_or_else(SubjectInfo::default);
    let meta_gender = subject.gender.as_str().to_string();
    let meta_age = age_category(subject.age).to_string();
    let block_len = block_samples(cfg.block_secs, clean.sfreq);

    let mut appended = 0;
    for segment in &segments {
        let a = (segment.start * clean.sfreq).round() as usize;
        let b = (((segment.start + segment.duration) * clean.sfreq).round() as usize)
            .min(clean.n_samples());
        if b <= a {
            continue;
        }
        let span = clean.data.slice(s![.., a..b]).to_owned();
        let blocks = split_blocks(&span, clean.sfreq, cfg.block_secs, &segment.name, &clean.id);
        if blocks.is_empty() {
            continue;
        }

        let stacked = stack_blocks(&blocks);
        let key = GroupKey::new(label_class.clone(), segment.name.clone());
        let meta = RecordingMeta {
            gender: meta_gender.clone(),
            age_category: meta_age.clone(),
            source_file: source_file.to_string(),
        };
        let attrs = GroupAttrs {
            label_class: label_class.clone(),
            block_type: segment.name.clone(),
            sample_rate: clean.sfreq,
            channel_names: clean.ch_names.clone(),
            block_length_secs: block_len as f64 / clean.sfreq,
            last_write: chrono::Utc::now(),
        };
        store
            .append(&key, &clean.id, &stacked, &meta, &attrs)
            .with_context(|| format!("appending {} blocks to {}", blocks.len(), key.file_name()))?;
        appended += blocks.len();
    }

    Ok(RecordingSummary {
        id: rec.id.clone(),
        segments,
        blocks_appended: appended,
        corrected_windows: report.corrected_windows,
        stored: true,
    })
}

// ── Batch driver ─────────────────────────────────────────────────────────

/// One batch entry: a recording file and, optionally, its expected digest.
pub struct BatchTarget {
    pub path: PathBuf,
    pub sha256: Option<String>,
}

#[derive(Default)]
pub struct BatchSummary {
    pub processed: Vec<RecordingSummary>,
    pub skipped: usize,
}

/// Streamed SHA-256 of a file, lowercase hex.
pub fn sha256_hex(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a file against its expected digest; on mismatch the corrupt
/// local artifact is removed.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_hex(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        std::fs::remove_file(path)
            .with_context(|| format!("removing corrupt file {}", path.display()))?;
        return Err(PipelineError::IntegrityMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}

/// Process recordings one after another; a failed recording is logged and
/// skipped, never fatal to the batch.
pub fn process_batch<D: Denoise, S: BlockSink>(
    targets: &[BatchTarget],
    cfg: &PipelineConfig,
    denoiser: &D,
    labels: &dyn LabelLookup,
    store: &mut S,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for target in targets {
        match process_target(target, cfg, denoiser, labels, store) {
            Ok(rec) => summary.processed.push(rec),
            Err(err) => {
                log::error!("{}: {err:#}", target.path.display());
                summary.skipped += 1;
            }
        }
    }
    info!(
        "batch done: {} processed, {} skipped",
        summary.processed.len(),
        summary.skipped
    );
    summary
}

fn process_target<D: Denoise, S: BlockSink>(
    target: &BatchTarget,
    cfg: &PipelineConfig,
    denoiser: &D,
    labels: &dyn LabelLookup,
    store: &mut S,
) -> Result<RecordingSummary> {
    if let Some(expected) = &target.sha256 {
        verify_checksum(&target.path, expected)?;
    }
    let rec = io::read_recording(&target.path)?;
    let source_file = target
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| rec.id.clone());
    process_recording(&rec, &source_file, cfg, denoiser, labels, store)
}

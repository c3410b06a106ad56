//! # eegseg — EEG cleaning, segmentation and dataset assembly
//!
//! `eegseg` takes annotated multi-channel EEG recordings, removes
//! measurement artifacts, re-partitions each recording into labeled
//! fixed-duration blocks and accumulates those blocks into grouped
//! on-disk datasets.
//!
//! ## Pipeline overview
//!
//! ```text
//! recording (.rec)
//!   │
//!   ├─ crop                 trim crop_secs from both ends, shift annotations
//!   ├─ notch + band-pass    FIR, zero-phase (default 50/60 Hz, 0.5–45 Hz)
//!   ├─ outlier mask         per-channel 3σ flag → mean → interpolate
//!   ├─ window correction    1 s windows; ≥80 % channels over 100 µV
//!   │                       → external denoiser on every channel
//!   ├─ segmentation         annotation timeline → named segments
//!   ├─ block split          fixed 5 s blocks, remainder dropped
//!   └─ aggregate store      one container per (diagnosis, segment name),
//!                           append-only, provenance deduplicated
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eegseg::{process_recording, PipelineConfig};
//! use eegseg::artifact::Passthrough;
//! use eegseg::store::MemoryStore;
//! use std::collections::HashMap;
//!
//! let rec = eegseg::io::read_recording("data/004520.rec".as_ref()).unwrap();
//!
//! let cfg = PipelineConfig::default();
//! let labels: HashMap<String, String> =
//!     [("004520".to_string(), "F32".to_string())].into();
//! let mut store = MemoryStore::new();
//!
//! let summary = process_recording(
//!     &rec, "004520.rec", &cfg, &Passthrough, &labels, &mut store,
//! ).unwrap();
//! println!("{} blocks from {} segments", summary.blocks_appended, summary.segments.len());
//! ```
//!
//! ## Running individual stages
//!
//! Every stage is also exposed on its own:
//!
//! ```
//! use eegseg::mask::suppress_outliers;
//! use eegseg::segment::Segmenter;
//! use eegseg::block::split_blocks;
//! use eegseg::recording::Annotation;
//! use ndarray::Array2;
//!
//! let data: Array2<f32> = Array2::zeros((19, 2560));
//!
//! // 3σ mask + interpolation
//! let (cleaned, _mask) = suppress_outliers(&data, 3.0);
//!
//! // Annotations → named segments
//! let anns = vec![Annotation::new(0.0, 0.0, "Фоновая запись")];
//! let segments = Segmenter::default().segments(&anns, 10.0);
//!
//! // Fixed-duration blocks
//! let blocks = split_blocks(&cleaned, 256.0, 5.0, &segments[0].name, "004520");
//! assert_eq!(blocks.len(), 2);
//! ```

pub mod artifact;
pub mod block;
pub mod config;
pub mod filter;
pub mod io;
pub mod label;
pub mod mask;
pub mod pipeline;
pub mod recording;
pub mod segment;
pub mod store;

// ── Crate-root re-exports ────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `eegseg::Foo` without knowing the internal module layout.

// config
pub use config::PipelineConfig;

// recording
pub use recording::{Annotation, Gender, Recording, RecordingError, SubjectInfo};

// mask
pub use mask::{outlier_mask, suppress_outliers, ArtifactMask};

// artifact
pub use artifact::{correct_windows, Denoise, WindowConfig};

// filter
pub use filter::{apply_fir_zero_phase, design_bandpass, design_notch, filter_1d};

// segment
pub use segment::{Segment, Segmenter};

// block
pub use block::{block_samples, split_blocks, stack_blocks, Block, BLOCK_EPSILON_SECS};

// io
pub use io::{read_recording, write_recording, Container, ContainerWriter};

// store
pub use store::{BlockSink, FileStore, GroupAttrs, GroupKey, MemoryStore, RecordingMeta};

// label
pub use label::{age_category, CsvLabelMap, LabelLookup};

// pipeline
pub use pipeline::{
    clean_recording, process_batch, process_recording, sha256_hex, verify_checksum,
    BatchSummary, BatchTarget, CleanReport, PipelineError, RecordingSummary,
};

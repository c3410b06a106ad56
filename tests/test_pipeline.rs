mod common;

use common::{synthetic_recording, Zeroing};
use eegseg::artifact::Passthrough;
use eegseg::{
    process_batch, process_recording, BatchTarget, GroupKey, MemoryStore, PipelineConfig,
};
use eegseg::{io, sha256_hex};
use ndarray::s;
use std::collections::HashMap;

fn labels() -> HashMap<String, String> {
    [("r1".to_string(), "F32".to_string())].into()
}

fn annotated() -> eegseg::Recording {
    synthetic_recording(
        "r1",
        19,
        80.0,
        128.0,
        vec![
            eegseg::Annotation::new(10.0, 0.0, "Фоновая запись"),
            eegseg::Annotation::new(40.0, 0.0, "Артефакт"),
            eegseg::Annotation::new(45.0, 0.0, "Открывание глаз"),
        ],
    )
}

#[test]
fn full_run_segments_and_stores_blocks() {
    let rec = annotated();
    let cfg = PipelineConfig::default();
    let mut store = MemoryStore::new();

    let summary =
        process_recording(&rec, "r1.rec", &cfg, &Passthrough, &labels(), &mut store).unwrap();

    // 5 s edge crop leaves 70 s; onsets shift to 5 / 35 / 40 and the
    // excluded marker neither starts nor ends a segment.
    assert_eq!(summary.segments.len(), 2);
    assert_eq!(summary.segments[0].name, "Baseline");
    approx::assert_abs_diff_eq!(summary.segments[0].start, 5.0, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(summary.segments[0].duration, 35.0, epsilon = 1e-9);
    assert_eq!(summary.segments[1].name, "EyesOpen");
    approx::assert_abs_diff_eq!(summary.segments[1].duration, 30.0, epsilon = 1e-9);

    // 5 s blocks at 128 Hz are 640 samples: 35 s → 7 blocks, 30 s → 6.
    assert!(summary.stored);
    assert_eq!(summary.blocks_appended, 13);

    let baseline = store.group(&GroupKey::new("F32", "Baseline")).unwrap();
    let rec_group = &baseline.recordings["r1"];
    assert_eq!(rec_group.blocks.len(), 7);
    assert_eq!(rec_group.blocks.block_shape(), (19, 640));
    assert_eq!(rec_group.gender, "F");
    assert_eq!(rec_group.age_category, "18-25 years");
    assert_eq!(rec_group.source_files, vec!["r1.rec"]);

    let eyes = store.group(&GroupKey::new("F32", "EyesOpen")).unwrap();
    assert_eq!(eyes.recordings["r1"].blocks.len(), 6);
    assert_eq!(eyes.attrs.sample_rate, 128.0);
    approx::assert_abs_diff_eq!(eyes.attrs.block_length_secs, 5.0, epsilon = 0.01);
}

#[test]
fn reprocessing_grows_blocks_but_not_provenance() {
    let rec = annotated();
    let cfg = PipelineConfig::default();
    let mut store = MemoryStore::new();

    for _ in 0..2 {
        process_recording(&rec, "r1.rec", &cfg, &Passthrough, &labels(), &mut store).unwrap();
    }

    let baseline = store.group(&GroupKey::new("F32", "Baseline")).unwrap();
    let rec_group = &baseline.recordings["r1"];
    assert_eq!(rec_group.blocks.len(), 14);
    assert_eq!(rec_group.source_files.len(), 1);
}

#[test]
fn missing_label_skips_store_not_recording() {
    let rec = annotated();
    let cfg = PipelineConfig::default();
    let mut store = MemoryStore::new();
    let empty: HashMap<String, String> = HashMap::new();

    let summary =
        process_recording(&rec, "r1.rec", &cfg, &Passthrough, &empty, &mut store).unwrap();
    assert!(!summary.stored);
    assert_eq!(summary.blocks_appended, 0);
    assert_eq!(summary.segments.len(), 2);
    assert_eq!(store.keys().count(), 0);
}

#[test]
fn global_artifact_window_is_denoised_end_to_end() {
    let mut rec = annotated();
    // One full second of 300 µV in-band tone on every channel, well inside
    // the first segment (t = 20 s on the original timeline).
    let sfreq = rec.sfreq;
    let a = (20.0 * sfreq) as usize;
    let b = a + sfreq as usize;
    for c in 0..rec.data.nrows() {
        for t in a..b {
            let phase = 2.0 * std::f64::consts::PI * 10.0 * t as f64 / sfreq;
            rec.data[[c, t]] = (300e-6 * phase.sin()) as f32;
        }
    }

    // Sigma loose enough that the per-channel mask leaves the burst to the
    // window scan, which is what this test exercises.
    let cfg = PipelineConfig {
        normalize: false,
        sigma: 10.0,
        ..PipelineConfig::default()
    };
    let report = eegseg::clean_recording(&rec, &cfg, &Zeroing).unwrap();
    assert!(report.corrected_windows >= 1, "burst window not corrected");

    // The burst second (shifted by the 5 s crop) was zeroed by the stub.
    let a2 = (15.0 * sfreq) as usize;
    let window = sfreq as usize;
    let peak = report
        .recording
        .data
        .slice(s![.., a2..a2 + window])
        .iter()
        .map(|v| v.abs())
        .fold(0.0_f32, f32::max);
    assert!(peak < 1e-6, "burst samples survived: peak {peak}");
}

#[test]
fn batch_skips_corrupt_files_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("r1.rec");
    let bad = dir.path().join("r2.rec");

    io::write_recording(&annotated(), &good).unwrap();
    let mut other = annotated();
    other.id = "r2".into();
    io::write_recording(&other, &bad).unwrap();

    let good_sum = sha256_hex(&good).unwrap();
    let targets = vec![
        BatchTarget { path: good.clone(), sha256: Some(good_sum) },
        BatchTarget { path: bad.clone(), sha256: Some("0".repeat(64)) },
    ];

    let cfg = PipelineConfig::default();
    let mut store = MemoryStore::new();
    let summary = process_batch(&targets, &cfg, &Passthrough, &labels(), &mut store);

    assert_eq!(summary.processed.len(), 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed[0].id, "r1");
    // The corrupt local artifact was removed.
    assert!(good.exists());
    assert!(!bad.exists());
}

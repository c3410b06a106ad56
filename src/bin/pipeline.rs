//! pipeline: batch-process a directory of recordings into block datasets.
//!
//! Recordings are cleaned (crop, notch, band-pass, 3σ mask, window scan),
//! segmented by their annotations, split into fixed blocks and appended to
//! one store container per (diagnosis, segment name). Window correction
//! runs in detection-only mode here; plug a real denoiser through the
//! library API to rewrite flagged windows.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use eegseg::artifact::Passthrough;
use eegseg::{process_batch, BatchTarget, CsvLabelMap, FileStore, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "pipeline", about = "EEG cleaning and dataset assembly pipeline")]
struct Args {
    /// Directory containing .rec recordings.
    #[arg(long)]
    input: PathBuf,

    /// Aggregate-store output directory.
    #[arg(long)]
    store: PathBuf,

    /// Diagnosis mapping CSV ('New Name', 'Diag_Code' columns).
    #[arg(long)]
    mapping: PathBuf,

    /// Pipeline configuration JSON; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optional manifest CSV ('file_name', 'file_checksum' columns);
    /// listed files are checked against their digests before processing.
    #[arg(long)]
    targets: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let labels = CsvLabelMap::from_csv(&args.mapping)?;
    let mut store = FileStore::open(&args.store)?;

    let targets = match &args.targets {
        Some(path) => manifest_targets(path, &args.input)?,
        None => scan_targets(&args.input)?,
    };
    eprintln!("{} recordings queued", targets.len());

    let summary = process_batch(&targets, &cfg, &Passthrough, &labels, &mut store);

    let blocks: usize = summary.processed.iter().map(|r| r.blocks_appended).sum();
    let unstored = summary.processed.iter().filter(|r| !r.stored).count();
    eprintln!(
        "done: {} processed ({unstored} without label), {} skipped, {blocks} blocks written",
        summary.processed.len(),
        summary.skipped
    );
    Ok(())
}

/// All .rec files in `dir`, sorted for a stable processing order.
fn scan_targets(dir: &PathBuf) -> Result<Vec<BatchTarget>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "rec"))
        .collect();
    paths.sort();
    Ok(paths
        .into_iter()
        .map(|path| BatchTarget { path, sha256: None })
        .collect())
}

/// Targets from a manifest CSV, joined against the input directory.
fn manifest_targets(manifest: &PathBuf, dir: &PathBuf) -> Result<Vec<BatchTarget>> {
    let mut reader = csv::Reader::from_path(manifest)
        .with_context(|| format!("opening manifest {}", manifest.display()))?;
    let headers = reader.headers()?.clone();
    let name_col = headers
        .iter()
        .position(|h| h == "file_name")
        .context("manifest has no 'file_name' column")?;
    let sum_col = headers.iter().position(|h| h == "file_checksum");

    let mut targets = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(name) = row.get(name_col).filter(|n| !n.is_empty()) else {
            continue;
        };
        targets.push(BatchTarget {
            path: dir.join(name),
            sha256: sum_col
                .and_then(|c| row.get(c))
                .filter(|s| !s.is_empty())
                .map(String::from),
        });
    }
    Ok(targets)
}

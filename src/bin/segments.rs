//! segments: dump a recording's segment table as CSV.
//!
//! Columns: canonical name, start and duration as MM:SS.mmm — the same
//! table the pipeline derives internally before block splitting.
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use eegseg::segment::seconds_to_min_sec_ms;
use eegseg::{io, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "segments", about = "Dump a recording's segment table as CSV")]
struct Args {
    /// Input recording (.rec).
    #[arg(long)]
    input: PathBuf,

    /// Output CSV path; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pipeline configuration JSON (for custom exclusion/translation
    /// tables); defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let rec = io::read_recording(&args.input)?;
    let segments = cfg.segmenter().segments(&rec.annotations, rec.duration());
    eprintln!("{}: {} segments over {:.1} s", rec.id, segments.len(), rec.duration());

    let mut writer: csv::Writer<Box<dyn std::io::Write>> = match &args.output {
        Some(path) => csv::Writer::from_writer(Box::new(std::fs::File::create(path)?)),
        None => csv::Writer::from_writer(Box::new(std::io::stdout())),
    };
    writer.write_record(["name", "start", "duration"])?;
    for s in &segments {
        writer.write_record([
            s.name.as_str(),
            &seconds_to_min_sec_ms(s.start),
            &seconds_to_min_sec_ms(s.duration),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

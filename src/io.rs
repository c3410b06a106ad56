//! Tensor-container I/O for recordings and aggregate-store group files.
//!
//! Format: an 8-byte little-endian header length, a JSON header mapping
//! tensor names to `{dtype, shape, data_offsets}` (plus a `__metadata__`
//! string map), then the raw tensor payload. Write-then-read reproduces
//! sample values and annotation onsets exactly.
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Array3};

use crate::recording::{Annotation, Gender, Recording, SubjectInfo};
use crate::store::{GroupAttrs, GroupData, GrowableBlocks, RecordingGroup};

// ── Generic container writer ─────────────────────────────────────────────

pub struct ContainerWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: BTreeMap<String, String>,
}

impl Default for ContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new(), metadata: BTreeMap::new() }
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    /// Store a list of strings as a newline-joined UTF-8 tensor.
    pub fn add_str_lines(&mut self, name: &str, lines: &[String]) {
        let joined = lines.join("\n");
        let bytes = joined.into_bytes();
        let n = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![n]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header = serde_json::Map::new();
        let mut offset = 0usize;
        for (name, data, dtype, shape) in &self.entries {
            header.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        if !self.metadata.is_empty() {
            header.insert("__metadata__".into(), serde_json::json!(self.metadata));
        }

        let hdr = serde_json::to_vec(&header)?;
        let pad = (8 - hdr.len() % 8) % 8;
        let padded: Vec<u8> = hdr.into_iter().chain(std::iter::repeat(b' ').take(pad)).collect();

        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Generic container reader ─────────────────────────────────────────────

pub struct Container {
    header: serde_json::Map<String, serde_json::Value>,
    bytes: Vec<u8>,
    data_start: usize,
}

impl Container {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        if bytes.len() < 8 {
            bail!("{}: container too small", path.display());
        }
        let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
        ensure!(bytes.len() >= 8 + n, "{}: truncated header", path.display());
        let header: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&bytes[8..8 + n])
                .with_context(|| format!("parsing header of {}", path.display()))?;
        Ok(Self { header, bytes, data_start: 8 + n })
    }

    pub fn has(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    /// Tensor names in the container, metadata excluded.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.header.keys().map(String::as_str).filter(|k| *k != "__metadata__")
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.header.get("__metadata__")?.get(key)?.as_str()
    }

    fn entry(&self, name: &str) -> Result<(&serde_json::Value, &[u8])> {
        let entry = self
            .header
            .get(name)
            .with_context(|| format!("missing tensor {name:?}"))?;
        let offsets = entry["data_offsets"]
            .as_array()
            .with_context(|| format!("tensor {name:?}: bad data_offsets"))?;
        let s = offsets[0].as_u64().context("bad offset")? as usize;
        let e = offsets[1].as_u64().context("bad offset")? as usize;
        let raw = self
            .bytes
            .get(self.data_start + s..self.data_start + e)
            .with_context(|| format!("tensor {name:?}: payload out of range"))?;
        Ok((entry, raw))
    }

    fn shape(entry: &serde_json::Value) -> Result<Vec<usize>> {
        entry["shape"]
            .as_array()
            .context("missing shape")?
            .iter()
            .map(|v| v.as_u64().map(|n| n as usize).context("bad shape entry"))
            .collect()
    }

    pub fn f32_tensor(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let (entry, raw) = self.entry(name)?;
        ensure!(entry["dtype"] == "F32", "tensor {name:?} is not F32");
        let values = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect();
        Ok((values, Self::shape(entry)?))
    }

    pub fn f64_tensor(&self, name: &str) -> Result<(Vec<f64>, Vec<usize>)> {
        let (entry, raw) = self.entry(name)?;
        ensure!(entry["dtype"] == "F64", "tensor {name:?} is not F64");
        let values = raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        Ok((values, Self::shape(entry)?))
    }

    pub fn str_lines(&self, name: &str) -> Result<Vec<String>> {
        let (_, raw) = self.entry(name)?;
        let text = std::str::from_utf8(raw)
            .with_context(|| format!("tensor {name:?} is not UTF-8"))?;
        if text.is_empty() {
            return Ok(vec![]);
        }
        Ok(text.split('\n').map(String::from).collect())
    }
}

// ── Recording files ──────────────────────────────────────────────────────

/// Write a recording (samples, annotations, demographics) to `path`.
pub fn write_recording(rec: &Recording, path: &Path) -> Result<()> {
    let mut w = ContainerWriter::new();

    let data: Vec<f32> = rec.data.iter().copied().collect();
    w.add_f32("data", &data, &[rec.data.nrows(), rec.data.ncols()]);

    let onsets: Vec<f64> = rec.annotations.iter().map(|a| a.onset).collect();
    let durations: Vec<f64> = rec.annotations.iter().map(|a| a.duration).collect();
    let labels: Vec<String> = rec.annotations.iter().map(|a| a.label.clone()).collect();
    w.add_f64("annotations/onset", &onsets, &[onsets.len()]);
    w.add_f64("annotations/duration", &durations, &[durations.len()]);
    w.add_str_lines("annotations/label", &labels);
    w.add_str_lines("ch_names", &rec.ch_names);
    w.add_str_lines("units", &rec.units);

    w.set_meta("id", &rec.id);
    w.set_meta("sfreq", rec.sfreq.to_string());
    if let Some(subject) = &rec.subject {
        w.set_meta("gender", subject.gender.as_str());
        if let Some(age) = subject.age {
            w.set_meta("age", age.to_string());
        }
    }
    if let Some(date) = rec.meas_date {
        w.set_meta("meas_date", date.to_rfc3339());
    }

    w.write(path)
}

/// Read a recording written by [`write_recording`].
pub fn read_recording(path: &Path) -> Result<Recording> {
    let c = Container::open(path)?;

    let (data, shape) = c.f32_tensor("data")?;
    ensure!(shape.len() == 2, "data tensor must be 2-D, got {shape:?}");
    let data = Array2::from_shape_vec((shape[0], shape[1]), data)?;

    let (onsets, _) = c.f64_tensor("annotations/onset")?;
    let (durations, _) = c.f64_tensor("annotations/duration")?;
    let labels = c.str_lines("annotations/label")?;
    ensure!(
        onsets.len() == durations.len() && onsets.len() == labels.len(),
        "annotation arrays disagree: {} onsets, {} durations, {} labels",
        onsets.len(),
        durations.len(),
        labels.len()
    );
    let annotations = onsets
        .into_iter()
        .zip(durations)
        .zip(labels)
        .map(|((onset, duration), label)| Annotation { onset, duration, label })
        .collect();

    let sfreq: f64 = c
        .meta("sfreq")
        .context("missing 'sfreq'")?
        .parse()
        .context("bad 'sfreq'")?;
    let id = c.meta("id").context("missing 'id'")?.to_string();

    let subject = c.meta("gender").map(|g| SubjectInfo {
        gender: match g {
            "M" => Gender::Male,
            "F" => Gender::Female,
            _ => Gender::Unknown,
        },
        age: c.meta("age").and_then(|a| a.parse().ok()),
    });
    let meas_date = c
        .meta("meas_date")
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc));

    Ok(Recording {
        id,
        ch_names: c.str_lines("ch_names")?,
        units: c.str_lines("units")?,
        sfreq,
        data,
        annotations,
        subject,
        meas_date,
    })
}

// ── Aggregate-store group files ──────────────────────────────────────────
//
// Layout: one `data/<recording_id>` tensor ([blocks, channels, samples],
// filled prefix only) and one `sources/<recording_id>` string tensor per
// recording, `channel_names` group-wide, everything scalar in metadata.
// Block data is laid out ahead of provenance in the payload.

pub fn write_group(path: &Path, group: &GroupData) -> Result<()> {
    let mut w = ContainerWriter::new();

    for (id, rec) in &group.recordings {
        let view = rec.blocks.view();
        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();
        w.add_f32(&format!("data/{id}"), &data, &shape);
    }
    for (id, rec) in &group.recordings {
        w.add_str_lines(&format!("sources/{id}"), &rec.source_files);
        w.set_meta(&format!("gender/{id}"), &rec.gender);
        w.set_meta(&format!("age_category/{id}"), &rec.age_category);
    }
    w.add_str_lines("channel_names", &group.attrs.channel_names);

    w.set_meta("label_class", &group.attrs.label_class);
    w.set_meta("block_type", &group.attrs.block_type);
    w.set_meta("sample_rate", group.attrs.sample_rate.to_string());
    w.set_meta("block_length_secs", group.attrs.block_length_secs.to_string());
    w.set_meta("last_write", group.attrs.last_write.to_rfc3339());

    w.write(path)
}

pub fn read_group(path: &Path) -> Result<GroupData> {
    let c = Container::open(path)?;

    let attrs = GroupAttrs {
        label_class: c.meta("label_class").context("missing 'label_class'")?.to_string(),
        block_type: c.meta("block_type").context("missing 'block_type'")?.to_string(),
        sample_rate: c
            .meta("sample_rate")
            .context("missing 'sample_rate'")?
            .parse()
            .context("bad 'sample_rate'")?,
        channel_names: c.str_lines("channel_names")?,
        block_length_secs: c
            .meta("block_length_secs")
            .context("missing 'block_length_secs'")?
            .parse()
            .context("bad 'block_length_secs'")?,
        last_write: c
            .meta("last_write")
            .context("missing 'last_write'")
            .and_then(|d| DateTime::parse_from_rfc3339(d).context("bad 'last_write'"))?
            .with_timezone(&Utc),
    };

    let ids: Vec<String> = c
        .names()
        .filter_map(|n| n.strip_prefix("data/"))
        .map(String::from)
        .collect();

    let mut recordings = BTreeMap::new();
    for id in ids {
        let (data, shape) = c.f32_tensor(&format!("data/{id}"))?;
        ensure!(shape.len() == 3, "group data for {id:?} must be 3-D, got {shape:?}");
        let blocks = Array3::from_shape_vec((shape[0], shape[1], shape[2]), data)?;
        recordings.insert(
            id.clone(),
            RecordingGroup {
                blocks: GrowableBlocks::with_blocks(&blocks),
                gender: c.meta(&format!("gender/{id}")).unwrap_or("N").to_string(),
                age_category: c
                    .meta(&format!("age_category/{id}"))
                    .unwrap_or("Unknown")
                    .to_string(),
                source_files: c.str_lines(&format!("sources/{id}"))?,
            },
        );
    }

    Ok(GroupData { recordings, attrs })
}

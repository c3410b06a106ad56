//! Durable, append-only block repository.
//!
//! Blocks are grouped by `(label_class, block_type)` — one container per
//! key — and inside a container by recording id. Appends only ever grow the
//! data; group-wide attributes are overwritten on every write
//! (last-writer-wins, acceptable under the single-writer discipline:
//! callers must never point two concurrent writers at the same key).
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use ndarray::{s, Array3, ArrayView3};

use crate::io;

/// File key: one on-disk container per `(label_class, block_type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub label_class: String,
    pub block_type: String,
}

impl GroupKey {
    pub fn new(label_class: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self { label_class: label_class.into(), block_type: block_type.into() }
    }

    /// Container file name under the store's base directory. Pass-through
    /// segment names may carry spaces or separators; both are replaced.
    pub fn file_name(&self) -> String {
        let safe = |s: &str| s.replace(' ', "_").replace(['/', '\\'], "-");
        format!("{}_{}.ebd", safe(&self.label_class), safe(&self.block_type))
    }
}

/// Per-recording metadata carried with an append.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMeta {
    pub gender: String,
    pub age_category: String,
    /// Provenance: the file this batch of blocks came from.
    pub source_file: String,
}

/// Group-wide attributes, overwritten unconditionally on every append.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAttrs {
    pub label_class: String,
    pub block_type: String,
    pub sample_rate: f64,
    pub channel_names: Vec<String>,
    pub block_length_secs: f64,
    pub last_write: DateTime<Utc>,
}

/// Growable 3-D block array with explicit `(capacity, len)` bookkeeping.
///
/// Appends land at the tail in call order; capacity doubles when exhausted.
/// The resulting logical shape after any append sequence is therefore
/// reproducible regardless of backend.
#[derive(Debug, Clone)]
pub struct GrowableBlocks {
    data: Array3<f32>,
    len: usize,
}

impl GrowableBlocks {
    /// Initial array sized exactly to the first batch.
    pub fn with_blocks(blocks: &Array3<f32>) -> Self {
        Self { data: blocks.clone(), len: blocks.shape()[0] }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.shape()[0]
    }

    /// `[channels, samples]` of each stored block.
    pub fn block_shape(&self) -> (usize, usize) {
        (self.data.shape()[1], self.data.shape()[2])
    }

    /// Resize the leading axis as needed and write `blocks` at the tail.
    /// Never moves or overwrites existing rows.
    pub fn grow_and_append(&mut self, blocks: &Array3<f32>) -> Result<()> {
        let n_new = blocks.shape()[0];
        if n_new == 0 {
            return Ok(());
        }
        ensure!(
            blocks.shape()[1..] == self.data.shape()[1..],
            "block shape {:?} does not match stored shape {:?}",
            &blocks.shape()[1..],
            &self.data.shape()[1..]
        );

        let needed = self.len + n_new;
        if needed > self.capacity() {
            let new_cap = needed.max(self.capacity() * 2);
            let (_, n_ch, n_t) = self.data.dim();
            let mut grown = Array3::zeros((new_cap, n_ch, n_t));
            grown
                .slice_mut(s![..self.len, .., ..])
                .assign(&self.data.slice(s![..self.len, .., ..]));
            self.data = grown;
        }
        self.data.slice_mut(s![self.len..needed, .., ..]).assign(blocks);
        self.len = needed;
        Ok(())
    }

    /// View of the filled prefix; the only part that is ever persisted.
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.slice(s![..self.len, .., ..])
    }
}

/// One recording's slot inside a container: its block array plus metadata.
#[derive(Debug, Clone)]
pub struct RecordingGroup {
    pub blocks: GrowableBlocks,
    pub gender: String,
    pub age_category: String,
    /// Deduplicated, insertion-ordered provenance set.
    pub source_files: Vec<String>,
}

/// In-memory image of one container file.
#[derive(Debug, Clone)]
pub struct GroupData {
    pub recordings: BTreeMap<String, RecordingGroup>,
    pub attrs: GroupAttrs,
}

impl GroupData {
    fn new(attrs: GroupAttrs) -> Self {
        Self { recordings: BTreeMap::new(), attrs }
    }

    /// The append contract shared by every backend.
    ///
    /// First write for a recording id creates its group and initialises
    /// metadata; later writes grow the block array at the tail and add the
    /// source file to the provenance set only if it is not already present
    /// (re-appending the same source file grows data, not provenance).
    /// Attributes are overwritten unconditionally.
    pub fn append(
        &mut self,
        recording_id: &str,
        blocks: &Array3<f32>,
        meta: &RecordingMeta,
        attrs: &GroupAttrs,
    ) -> Result<()> {
        match self.recordings.get_mut(recording_id) {
            None => {
                self.recordings.insert(
                    recording_id.to_string(),
                    RecordingGroup {
                        blocks: GrowableBlocks::with_blocks(blocks),
                        gender: meta.gender.clone(),
                        age_category: meta.age_category.clone(),
                        source_files: vec![meta.source_file.clone()],
                    },
                );
            }
            Some(group) => {
                group.blocks.grow_and_append(blocks)?;
                if !group.source_files.contains(&meta.source_file) {
                    group.source_files.push(meta.source_file.clone());
                }
            }
        }
        self.attrs = attrs.clone();
        Ok(())
    }
}

/// Append-only sink for split blocks.
///
/// Implementations are **not** safe for concurrent writers on one key;
/// callers shard work so no two pipeline instances target the same
/// `(label_class, block_type)` at once.
pub trait BlockSink {
    fn append(
        &mut self,
        key: &GroupKey,
        recording_id: &str,
        blocks: &Array3<f32>,
        meta: &RecordingMeta,
        attrs: &GroupAttrs,
    ) -> Result<()>;
}

/// In-memory store implementing the same append contract as [`FileStore`].
/// The test double for anything that writes blocks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    groups: HashMap<GroupKey, GroupData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupData> {
        self.groups.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }
}

impl BlockSink for MemoryStore {
    fn append(
        &mut self,
        key: &GroupKey,
        recording_id: &str,
        blocks: &Array3<f32>,
        meta: &RecordingMeta,
        attrs: &GroupAttrs,
    ) -> Result<()> {
        self.groups
            .entry(key.clone())
            .or_insert_with(|| GroupData::new(attrs.clone()))
            .append(recording_id, blocks, meta, attrs)
    }
}

/// On-disk store: one container file per key under `base_dir`.
///
/// Each append loads the container (if present), applies the shared append
/// contract and rewrites it via a temp file + rename, block data ahead of
/// provenance and attributes in the payload.
#[derive(Debug)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open (creating `base_dir` if needed).
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("creating store directory {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    pub fn path_for(&self, key: &GroupKey) -> PathBuf {
        self.base_dir.join(key.file_name())
    }

    /// Load a container for inspection. Safe to call concurrently with
    /// other readers as long as no writer is active.
    pub fn load(&self, key: &GroupKey) -> Result<Option<GroupData>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        io::read_group(&path).map(Some)
    }
}

impl BlockSink for FileStore {
    fn append(
        &mut self,
        key: &GroupKey,
        recording_id: &str,
        blocks: &Array3<f32>,
        meta: &RecordingMeta,
        attrs: &GroupAttrs,
    ) -> Result<()> {
        let path = self.path_for(key);
        let mut group = if path.exists() {
            io::read_group(&path)?
        } else {
            GroupData::new(attrs.clone())
        };
        group.append(recording_id, blocks, meta, attrs)?;

        let tmp = path.with_extension("ebd.tmp");
        io::write_group(&tmp, &group)?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replacing {}", path.display()))?;
        debug!(
            "appended {} blocks for {recording_id} → {}",
            blocks.shape()[0],
            path.display()
        );
        Ok(())
    }
}

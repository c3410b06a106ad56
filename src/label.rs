//! Diagnosis lookup and demographic metadata.
//!
//! The aggregate store keys its containers by label class (a diagnosis
//! code). The mapping from recording id to diagnosis lives outside this
//! crate; here is the seam plus a CSV-backed implementation for the batch
//! CLI, and the age banding used in group metadata.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

/// Maps a recording id to its label class (diagnosis code).
///
/// A `None` result is not fatal: the caller skips the store step for that
/// recording and logs the reason.
pub trait LabelLookup {
    fn lookup(&self, recording_id: &str) -> Option<String>;
}

impl LabelLookup for HashMap<String, String> {
    fn lookup(&self, recording_id: &str) -> Option<String> {
        self.get(recording_id).cloned()
    }
}

/// Diagnosis mapping loaded from a CSV with `New Name` (source file name)
/// and `Diag_Code` columns.
#[derive(Debug, Clone, Default)]
pub struct CsvLabelMap {
    map: HashMap<String, String>,
}

impl CsvLabelMap {
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening mapping {}", path.display()))?;
        let headers = reader.headers()?.clone();
        let name_col = headers
            .iter()
            .position(|h| h == "New Name")
            .context("mapping CSV has no 'New Name' column")?;
        let diag_col = headers
            .iter()
            .position(|h| h == "Diag_Code")
            .context("mapping CSV has no 'Diag_Code' column")?;

        let mut map = HashMap::new();
        for row in reader.records() {
            let row = row?;
            match (row.get(name_col), row.get(diag_col)) {
                (Some(name), Some(diag)) if !name.is_empty() && !diag.is_empty() => {
                    map.insert(name.to_string(), diag.to_string());
                }
                _ => warn!("mapping row {:?} is incomplete, skipped", row.position()),
            }
        }
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl LabelLookup for CsvLabelMap {
    /// Mapping files key by full source file name; accept the bare
    /// recording id as well.
    fn lookup(&self, recording_id: &str) -> Option<String> {
        self.map
            .get(recording_id)
            .or_else(|| self.map.get(&format!("{recording_id}.edf")))
            .or_else(|| self.map.get(&format!("{recording_id}.rec")))
            .cloned()
    }
}

/// Age bands used in dataset metadata; `None` maps to `"Unknown"`.
pub fn age_category(age: Option<u32>) -> &'static str {
    let Some(age) = age else { return "Unknown" };
    match age {
        0..=2 => "0-3 years",
        3..=5 => "3-6 years",
        6..=8 => "6-9 years",
        9..=11 => "9-12 years",
        12..=13 => "12-14 years",
        14..=17 => "14-18 years",
        18..=24 => "18-25 years",
        25..=29 => "25-30 years",
        30..=39 => "30-40 years",
        _ => "40+ years",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn age_bands() {
        assert_eq!(age_category(Some(0)), "0-3 years");
        assert_eq!(age_category(Some(3)), "3-6 years");
        assert_eq!(age_category(Some(17)), "14-18 years");
        assert_eq!(age_category(Some(18)), "18-25 years");
        assert_eq!(age_category(Some(64)), "40+ years");
        assert_eq!(age_category(None), "Unknown");
    }

    #[test]
    fn csv_lookup_accepts_bare_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "New Name,Diag_Code").unwrap();
        writeln!(f, "004520.edf,F32").unwrap();
        writeln!(f, "085574.edf,G40").unwrap();
        drop(f);

        let map = CsvLabelMap::from_csv(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("004520").as_deref(), Some("F32"));
        assert_eq!(map.lookup("085574.edf").as_deref(), Some("G40"));
        assert_eq!(map.lookup("missing"), None);
    }
}

//! Crawl progress bookkeeping.
//!
//! Both the per-county record file and the global county mapping are full
//! snapshots, rewritten after every record. A crash loses at most the record
//! being worked on.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::model::{CrawlUnit, Record};
use crate::{Result, MAPPING_FILE};

/// `processed / total * 100` rounded half-to-even at two places, or 0 for an empty county.
pub fn completion_percentage(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percentage = processed as f64 / total as f64 * 100.0;
    (percentage * 100.0).round_ties_even() / 100.0
}

pub fn records_file_name(unit: &CrawlUnit) -> String {
    format!("{}_{}_records.json", unit.state_abbr, unit.county_id)
}

/// Records file, relative to the output directory.
pub fn records_rel_path(unit: &CrawlUnit) -> String {
    format!("json/{}/{}", unit.state_abbr, records_file_name(unit))
}

/// Image directory, relative to the output directory.
pub fn images_rel_dir(unit: &CrawlUnit) -> String {
    format!("images/{}/{}", unit.state_abbr, unit.county_id)
}

/// One entry of the county mapping file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyProgress {
    pub state: String,
    pub state_abbreviation: String,
    pub county_id: String,
    pub county_name: String,
    pub file_path: String,
    pub images_directory: String,
    pub total_records: usize,
    pub processed_records: usize,
    pub completion_percentage: f64,
    pub last_updated: String,
}

impl CountyProgress {
    pub fn new(unit: &CrawlUnit, total_records: usize, processed_records: usize) -> Self {
        Self {
            state: unit.state_name.clone(),
            state_abbreviation: unit.state_abbr.clone(),
            county_id: unit.county_id.clone(),
            county_name: unit.county_name.clone(),
            file_path: records_rel_path(unit),
            images_directory: images_rel_dir(unit),
            total_records,
            processed_records,
            completion_percentage: completion_percentage(processed_records, total_records),
            last_updated: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Entries are keyed by (state abbreviation, county id).
    pub fn same_unit(&self, other: &CountyProgress) -> bool {
        self.state_abbreviation == other.state_abbreviation && self.county_id == other.county_id
    }
}

/// Records collected so far for one county, mirrored to its records file.
#[derive(Debug)]
pub struct UnitOutput {
    unit: CrawlUnit,
    path: PathBuf,
    images_dir: PathBuf,
    total_records: usize,
    records: Vec<Record>,
}

impl UnitOutput {
    pub fn unit(&self) -> &CrawlUnit {
        &self.unit
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn progress(&self) -> CountyProgress {
        CountyProgress::new(&self.unit, self.total_records, self.records.len())
    }

    /// Appends a record and rewrites the whole records file.
    pub async fn push(&mut self, record: Record) -> Result<()> {
        self.records.push(record);
        write_json_snapshot(&self.path, &self.records).await
    }
}

/// Owns the county mapping and hands out per-county outputs.
#[derive(Debug)]
pub struct ProgressTracker {
    base_dir: PathBuf,
    mapping: Vec<CountyProgress>,
}

impl ProgressTracker {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            mapping: Vec::new(),
        }
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.base_dir.join(MAPPING_FILE)
    }

    pub fn entries(&self) -> &[CountyProgress] {
        &self.mapping
    }

    /// Creates the county's json and image directories and an empty output for it.
    pub async fn open_unit(&self, unit: &CrawlUnit, total_records: usize) -> Result<UnitOutput> {
        let json_dir = self.base_dir.join("json").join(&unit.state_abbr);
        let images_dir = self.base_dir.join(images_rel_dir(unit));
        fs::create_dir_all(&json_dir).await?;
        fs::create_dir_all(&images_dir).await?;

        Ok(UnitOutput {
            unit: unit.clone(),
            path: json_dir.join(records_file_name(unit)),
            images_dir,
            total_records,
            records: Vec::new(),
        })
    }

    /// Replaces the entry for the same county in place, or appends it.
    pub fn upsert(&mut self, entry: CountyProgress) {
        match self.mapping.iter_mut().find(|e| e.same_unit(&entry)) {
            Some(existing) => *existing = entry,
            None => self.mapping.push(entry),
        }
    }

    /// Adds a finished record to the county output, then refreshes the mapping.
    /// Both files are on disk when this returns.
    pub async fn commit(&mut self, output: &mut UnitOutput, record: Record) -> Result<CountyProgress> {
        output.push(record).await?;
        let progress = output.progress();
        self.upsert(progress.clone());
        write_json_snapshot(&self.mapping_path(), &self.mapping).await?;
        Ok(progress)
    }
}

/// Writes pretty JSON next to `path` and renames it over `path`.
pub async fn write_json_snapshot<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let result: Result<()> = async {
        fs::write(&temp_path, &json).await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
    }
    debug!(path = %path.display(), bytes = json.len(), "wrote snapshot");
    result
}

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::merge;
use crate::types::{AttachSummary, Record};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed dataset {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Owner of the canonical dataset.
pub trait DatasetStore {
    /// Every record on file for `location`, sorted by date.
    fn load(&self, location: &str) -> Result<Vec<Record>, StoreError>;

    /// Merges `records` over the stored dataset and persists the result.
    /// Incoming records replace stored ones with the same `(location, date)`.
    fn attach(&mut self, records: Vec<Record>) -> Result<AttachSummary, StoreError>;

    /// Latest date on file for `location`, `None` when there is no history.
    fn load_watermark(&self, location: &str) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.load(location)?.iter().map(|r| r.date).max())
    }
}

/// In-process dataset, mostly useful for embedding and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    records: Vec<Record>,
}

impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: merge::reconcile(Vec::new(), Vec::new(), records),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl DatasetStore for MemoryStore {
    fn load(&self, location: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.location == location)
            .cloned()
            .collect())
    }

    fn attach(&mut self, records: Vec<Record>) -> Result<AttachSummary, StoreError> {
        let (merged, summary) = merge::attach(std::mem::take(&mut self.records), records);
        self.records = merged;
        Ok(summary)
    }
}

/// One pretty-printed JSON array per location: `<dir>/<location>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, location: &str) -> PathBuf {
        self.dir.join(format!("{location}.json"))
    }

    fn write_atomic(&self, path: &Path, records: &[Record]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let content = serde_json::to_string_pretty(records).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = path.with_file_name(format!(".{file_name}.tmp"));

        {
            let mut file = File::create(&temp).map_err(io_err)?;
            file.write_all(content.as_bytes()).map_err(io_err)?;
            file.write_all(b"\n").map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }

        #[cfg(target_os = "windows")]
        if path.exists() {
            fs::remove_file(path).map_err(io_err)?;
        }

        fs::rename(&temp, path).map_err(io_err)
    }
}

impl DatasetStore for JsonFileStore {
    fn load(&self, location: &str) -> Result<Vec<Record>, StoreError> {
        let path = self.path_for(location);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let records: Vec<Record> =
            serde_json::from_str(&text).map_err(|source| StoreError::Json { path, source })?;

        Ok(records
            .into_iter()
            .filter(|r| r.location == location)
            .collect())
    }

    fn attach(&mut self, records: Vec<Record>) -> Result<AttachSummary, StoreError> {
        let mut by_location: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for record in records {
            by_location
                .entry(record.location.clone())
                .or_default()
                .push(record);
        }

        // merge everything before the first write
        let mut pending = Vec::new();
        let mut summary = AttachSummary::default();
        for (location, incoming) in by_location {
            let prior = self.load(&location)?;
            let (merged, s) = merge::attach(prior, incoming);
            summary.inserted += s.inserted;
            summary.replaced += s.replaced;
            summary.total += s.total;
            pending.push((self.path_for(&location), merged));
        }

        if !pending.is_empty() {
            fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
        }

        for (path, merged) in pending {
            self.write_atomic(&path, &merged)?;
            log::info!("Wrote {} record(s) to {}", merged.len(), path.display());
        }

        Ok(summary)
    }
}

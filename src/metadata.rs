//! In-memory crawl metadata, flushed to a JSON file on shutdown
//!
//! Workers record one [`CrawlRecord`] per finished URL under a single map
//! lock. The completion monitor reads aggregate counts; the persistence step
//! serializes the whole map. The flush is best-effort and runs on normal
//! completion, stall termination, and SIGINT alike.

use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Final status of a crawled URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Success,
    Failed,
    Skipped,
}

/// Outcome record for one URL, immutable once stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    pub title: Option<String>,
    /// Local file the page content was written to, when any
    pub local_path: Option<String>,
    pub depth: u32,
    #[serde(default)]
    pub image_refs: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    pub status: CrawlStatus,
    /// Failure or skip reason, for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Serialized form of the metadata file
#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    /// Hash of the configuration that produced this run
    config_hash: String,
    written_at: DateTime<Utc>,
    pages: HashMap<String, CrawlRecord>,
}

/// URL → crawl record map behind a single lock
pub struct MetadataStore {
    records: Mutex<HashMap<String, CrawlRecord>>,
    config_hash: String,
}

impl MetadataStore {
    pub fn new(config_hash: &str) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            config_hash: config_hash.to_string(),
        }
    }

    /// Stores the record for a finished URL, overwriting any earlier entry
    /// for the same URL (not expected within one run)
    pub fn record(&self, record: CrawlRecord) {
        let mut records = self.records.lock().expect("metadata lock poisoned");
        records.insert(record.url.clone(), record);
    }

    /// Number of records with the given status
    pub fn count_status(&self, status: CrawlStatus) -> usize {
        let records = self.records.lock().expect("metadata lock poisoned");
        records.values().filter(|r| r.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("metadata lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the record for a URL, if present
    pub fn get(&self, url: &str) -> Option<CrawlRecord> {
        let records = self.records.lock().expect("metadata lock poisoned");
        records.get(url).cloned()
    }

    /// URLs of all successfully mirrored pages (used by `--resume`)
    pub fn successful_urls(&self) -> Vec<String> {
        let records = self.records.lock().expect("metadata lock poisoned");
        records
            .values()
            .filter(|r| r.status == CrawlStatus::Success)
            .map(|r| r.url.clone())
            .collect()
    }

    /// Serializes all records to pretty JSON at `path`
    pub fn flush(&self, path: &Path) -> Result<()> {
        let pages = {
            let records = self.records.lock().expect("metadata lock poisoned");
            records.clone()
        };

        let file = MetadataFile {
            config_hash: self.config_hash.clone(),
            written_at: Utc::now(),
            pages,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json)?;
        tracing::info!("Wrote metadata for {} pages to {}", file.pages.len(), path.display());
        Ok(())
    }

    /// Loads records from a previous run's metadata file
    ///
    /// Best-effort: a missing file is an error the caller may ignore, and a
    /// hash mismatch only logs a warning.
    pub fn load(&self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let file: MetadataFile = serde_json::from_str(&content)
            .map_err(|e| MirrorError::Metadata(format!("unreadable metadata file: {}", e)))?;

        if file.config_hash != self.config_hash {
            tracing::warn!(
                "Metadata file was produced by a different configuration (hash {} vs {})",
                file.config_hash,
                self.config_hash
            );
        }

        let count = file.pages.len();
        let mut records = self.records.lock().expect("metadata lock poisoned");
        records.extend(file.pages);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(url: &str, status: CrawlStatus) -> CrawlRecord {
        CrawlRecord {
            url: url.to_string(),
            title: Some("Title".to_string()),
            local_path: Some("index.html".to_string()),
            depth: 0,
            image_refs: vec![],
            fetched_at: Utc::now(),
            status,
            reason: None,
        }
    }

    #[test]
    fn test_record_and_count() {
        let store = MetadataStore::new("hash");
        store.record(record("https://docs.example.com/", CrawlStatus::Success));
        store.record(record("https://docs.example.com/a", CrawlStatus::Failed));

        assert_eq!(store.len(), 2);
        assert_eq!(store.count_status(CrawlStatus::Success), 1);
        assert_eq!(store.count_status(CrawlStatus::Failed), 1);
        assert_eq!(store.count_status(CrawlStatus::Skipped), 0);
    }

    #[test]
    fn test_flush_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page_metadata.json");

        let store = MetadataStore::new("hash");
        store.record(record("https://docs.example.com/", CrawlStatus::Success));
        store.flush(&path).unwrap();

        let restored = MetadataStore::new("hash");
        let loaded = restored.load(&path).unwrap();
        assert_eq!(loaded, 1);
        assert!(restored.get("https://docs.example.com/").is_some());
    }

    #[test]
    fn test_successful_urls_filters_failures() {
        let store = MetadataStore::new("hash");
        store.record(record("https://docs.example.com/ok", CrawlStatus::Success));
        store.record(record("https://docs.example.com/bad", CrawlStatus::Failed));

        let urls = store.successful_urls();
        assert_eq!(urls, vec!["https://docs.example.com/ok".to_string()]);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let store = MetadataStore::new("hash");
        assert!(store.load(Path::new("/nonexistent/metadata.json")).is_err());
    }

    #[test]
    fn test_flush_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/page_metadata.json");

        let store = MetadataStore::new("hash");
        store.record(record("https://docs.example.com/", CrawlStatus::Success));
        store.flush(&path).unwrap();
        assert!(path.exists());
    }
}

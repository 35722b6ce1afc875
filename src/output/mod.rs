//! Disk writer for crawl artifacts
//!
//! Pages land in three sibling directories under the configured output root:
//! raw HTML as fetched, the extracted content subtree, and downloaded
//! images. Filenames come from [`crate::url::file_name_for`], so the same
//! URL always maps to the same file across runs.

use crate::url::file_name_for;
use crate::{MirrorError, Result};
use std::path::{Path, PathBuf};
use url::Url;

const RAW_HTML_DIR: &str = "html_full";
const CONTENT_DIR: &str = "html";
const IMAGES_DIR: &str = "images";

/// Writes pages and images under the output directory tree
pub struct DiskWriter {
    raw_dir: PathBuf,
    content_dir: PathBuf,
    images_dir: PathBuf,
}

impl DiskWriter {
    /// Creates the writer and its directory tree up front
    pub fn new(output_dir: &Path) -> Result<Self> {
        let raw_dir = output_dir.join(RAW_HTML_DIR);
        let content_dir = output_dir.join(CONTENT_DIR);
        let images_dir = output_dir.join(IMAGES_DIR);

        for dir in [&raw_dir, &content_dir, &images_dir] {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            raw_dir,
            content_dir,
            images_dir,
        })
    }

    /// Persists the raw page and its extracted content
    ///
    /// Returns the content file path recorded in the page's metadata.
    pub fn write_page(&self, url: &Url, raw_html: &[u8], content_html: &str) -> Result<PathBuf> {
        let stem = file_name_for(url);

        let raw_path = self.raw_dir.join(format!("{}.html", stem));
        std::fs::write(&raw_path, raw_html)
            .map_err(|e| MirrorError::Output(format!("{}: {}", raw_path.display(), e)))?;

        let content_path = self.content_dir.join(format!("{}.html", stem));
        std::fs::write(&content_path, content_html)
            .map_err(|e| MirrorError::Output(format!("{}: {}", content_path.display(), e)))?;

        Ok(content_path)
    }

    /// Deterministic local destination for an image URL
    pub fn image_path_for(&self, url: &Url) -> PathBuf {
        self.images_dir.join(file_name_for(url))
    }

    /// Writes image bytes to the given destination
    pub fn write_image(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        std::fs::write(path, bytes)
            .map_err(|e| MirrorError::Output(format!("{}: {}", path.display(), e)))
    }
}

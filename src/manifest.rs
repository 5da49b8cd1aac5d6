//! COCO annotation manifests
//!
//! Only the `images` array is read. Annotations and categories are left to
//! serde's unknown-field handling and never materialised.

use crate::error::{FetchError, Result};
use crate::tracing_config::{events, spans};
use crate::types::DownloadTask;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// One entry of a COCO `images` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: u64,
    pub file_name: String,
    #[serde(default)]
    pub coco_url: Option<String>,
    #[serde(default)]
    pub flickr_url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl CocoImage {
    /// Preferred source URL, falling back to `flickr_url`
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.coco_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| self.flickr_url.as_deref().filter(|url| !url.is_empty()))
    }
}

/// A COCO-formatted annotation file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CocoManifest {
    pub images: Vec<CocoImage>,
}

/// Download tasks derived from a manifest, plus what had to be dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestTasks {
    pub tasks: Vec<DownloadTask>,
    /// Records dropped because an earlier record had the same file name
    pub duplicates: usize,
    /// Records with no usable URL
    pub missing_url: usize,
}

impl CocoManifest {
    /// Load a manifest from a JSON file
    ///
    /// # Errors
    /// - The file cannot be opened
    /// - The content is not a COCO manifest
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let _guard = spans::manifest(path).entered();

        let file = std::fs::File::open(path)
            .map_err(|e| FetchError::file_io_error("open manifest", path, &e))?;
        let manifest = Self::from_reader(std::io::BufReader::new(file))?;

        tracing::info!(images = manifest.images.len(), "Loaded manifest");
        Ok(manifest)
    }

    /// Parse a manifest from any reader
    ///
    /// # Errors
    /// - The content is not a COCO manifest
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(Self::parse_error)
    }

    /// Parse a manifest from bytes
    ///
    /// # Errors
    /// - The content is not a COCO manifest
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Self::parse_error)
    }

    fn parse_error(error: serde_json::Error) -> FetchError {
        if error.is_data() {
            FetchError::invalid_manifest(format!("not a COCO annotation file: {}", error))
        } else {
            FetchError::Json(error)
        }
    }

    /// Map images to download tasks
    ///
    /// Records keep manifest order. A repeated file name keeps the first
    /// record; records without a URL are dropped.
    #[must_use]
    pub fn tasks(&self) -> ManifestTasks {
        let mut seen = HashSet::with_capacity(self.images.len());
        let mut result = ManifestTasks {
            tasks: Vec::with_capacity(self.images.len()),
            ..ManifestTasks::default()
        };

        for image in &self.images {
            let Some(url) = image.url() else {
                tracing::warn!(id = image.id, file_name = %image.file_name, "Image has no URL, skipping");
                result.missing_url += 1;
                continue;
            };

            if !seen.insert(image.file_name.as_str()) {
                result.duplicates += 1;
                continue;
            }

            result
                .tasks
                .push(DownloadTask::new(image.file_name.clone(), url));
        }

        if result.duplicates > 0 {
            events::warning_with_recommendation(
                &format!(
                    "Dropped {} records whose file name was already listed",
                    result.duplicates
                ),
                "Check the manifest for repeated file_name entries",
            );
        }

        result
    }
}

//! `img_manifest.json`, written next to the images of each topic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::summary::TopicSummary;

pub const MANIFEST_FILE: &str = "img_manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// header stamp, ns
    pub msg_timestamp: u64,
    /// bag record time, ns
    pub rosbag_timestamp: u64,
    pub path: String,
    pub msg_index: u64,
    pub img_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageManifest {
    pub images: BTreeMap<String, ManifestEntry>,
    pub topic: Option<TopicSummary>,
}

impl ImageManifest {
    pub fn read(folder: &Path) -> Result<Self> {
        let path = folder.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid manifest {}", path.display()))
    }

    /// Writes the manifest unless one already exists. Returns whether it wrote.
    pub fn write_if_absent(&self, folder: &Path) -> Result<bool> {
        let path = folder.join(MANIFEST_FILE);
        if path.exists() {
            tracing::info!("manifest {} already exists; leaving it untouched", path.display());
            return Ok(false);
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(true)
    }

    /// Topic frequency rounded to two decimals.
    pub fn frame_rate(&self) -> Option<f64> {
        self.topic
            .as_ref()
            .and_then(|t| t.frequency)
            .filter(|f| *f > 0.0)
            .map(|f| (f * 100.0).round() / 100.0)
    }
}

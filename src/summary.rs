//! JSON metadata summaries of one bag or a folder of bags.

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::bag_io::{self, BagIndex, BagStats, ns_to_secs};

pub const DEFAULT_SUMMARY_FILE: &str = "rosbag_metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: String,
    pub msg_type: String,
    pub message_count: u64,
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BagSummary {
    pub file_name: String,
    /// seconds, bag clock
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub file_size_mb: f64,
    pub topics: Vec<TopicSummary>,
}

impl BagSummary {
    /// Summary of already collected stats for the bag at `path`.
    pub fn from_stats(path: &Path, stats: &BagStats) -> Result<Self> {
        let size = fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let start_time = stats.start_ns.map(ns_to_secs).unwrap_or(0.0);
        let end_time = stats.end_ns.map(ns_to_secs).unwrap_or(0.0);
        Ok(Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            start_time,
            end_time,
            duration: end_time - start_time,
            file_size_mb: size as f64 / (1024.0 * 1024.0),
            topics: stats
                .topics
                .values()
                .map(|t| TopicSummary {
                    topic: t.topic.clone(),
                    msg_type: t.msg_type.clone(),
                    message_count: t.count,
                    frequency: t.frequency,
                })
                .collect(),
        })
    }

    pub fn topic_dict(&self) -> BTreeMap<String, TopicSummary> {
        self.topics
            .iter()
            .map(|t| (t.topic.clone(), t.clone()))
            .collect()
    }

    pub fn topics_of_type(&self, types: &[&str]) -> Vec<String> {
        self.topics
            .iter()
            .filter(|t| types.contains(&t.msg_type.as_str()))
            .map(|t| t.topic.clone())
            .collect()
    }
}

fn is_bag(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "bag")
}

/// Summarize one bag. Missing files and non-`.bag` paths are errors; a bag
/// that cannot be parsed is logged and yields `None`.
pub fn bag_info_from_file(path: &Path) -> Result<Option<BagSummary>> {
    if !path.exists() {
        bail!("{} does not exist.", path.display());
    }
    if !is_bag(path) {
        bail!("{} is not a rosbag.", path.display());
    }

    match summarize(path) {
        Ok(summary) => Ok(Some(summary)),
        Err(e) => {
            tracing::error!("Couldn't open rosbag {} due to error: {:#}. Skipping...", path.display(), e);
            Ok(None)
        }
    }
}

fn summarize(path: &Path) -> Result<BagSummary> {
    let bag = bag_io::open_bag(path)?;
    let index = BagIndex::load(&bag)?;
    let stats = bag_io::collect_stats(&bag, &index)?;
    BagSummary::from_stats(path, &stats)
}

/// All `.bag` files below `dir`, sorted.
pub fn find_bags(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).with_context(|| format!("failed to read {}", current.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_bag(&path) {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Bags to process for an input that is either a bag file or a directory.
pub fn input_bags(input: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        find_bags(input, recursive)
    } else {
        Ok(vec![input.to_path_buf()])
    }
}

/// Summaries keyed by absolute bag path. `None` marks bags that failed to open.
pub fn bag_info_from_file_or_folder(input: &Path) -> Result<BTreeMap<PathBuf, Option<BagSummary>>> {
    let bags = if is_bag(input) {
        vec![input.to_path_buf()]
    } else {
        find_bags(input, true)?
    };

    bags.par_iter()
        .map(|path| -> Result<(PathBuf, Option<BagSummary>)> {
            let abs = std::path::absolute(path)?;
            Ok((abs, bag_info_from_file(path)?))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub file_name: String,
    /// one JSON file per bag instead of a single combined file
    pub split: bool,
    /// prefix written file names with '.'
    pub hidden: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            file_name: DEFAULT_SUMMARY_FILE.to_string(),
            split: false,
            hidden: false,
        }
    }
}

fn summary_json(summary: &Option<BagSummary>) -> Result<serde_json::Value> {
    Ok(match summary {
        Some(s) => serde_json::to_value(s)?,
        None => serde_json::Value::Object(Default::default()),
    })
}

fn save_json(value: &serde_json::Value, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// Write summaries as configured; returns the written JSON paths.
pub fn write_summary(options: &SummaryOptions) -> Result<Vec<PathBuf>> {
    let infos = bag_info_from_file_or_folder(&options.input)?;
    let prefix = if options.hidden { "." } else { "" };
    let mut written = Vec::new();

    if options.split {
        let input_root = std::path::absolute(&options.input)?;
        for (bag_path, info) in &infos {
            let bag_dir = bag_path.parent().unwrap_or(Path::new(""));
            let name = format!(
                "{prefix}{}.json",
                bag_path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
            let out_dir = match &options.output {
                Some(out) => {
                    let relative = bag_dir.strip_prefix(&input_root).unwrap_or(Path::new(""));
                    let dir = out.join(relative);
                    fs::create_dir_all(&dir)?;
                    dir
                }
                None => bag_dir.to_path_buf(),
            };
            let path = out_dir.join(name);
            save_json(&summary_json(info)?, &path)?;
            written.push(path);
        }
        return Ok(written);
    }

    let Some(output) = &options.output else {
        bail!("an output directory or JSON path is required unless --split is used");
    };
    let path = if output.is_dir() {
        output.join(format!("{prefix}{}", options.file_name))
    } else if output.is_file() || output.extension().is_some_and(|e| e == "json") {
        output.clone()
    } else {
        bail!("Invalid output path provided: {}", output.display());
    };

    let mut combined = serde_json::Map::new();
    for (bag_path, info) in &infos {
        combined.insert(bag_path.display().to_string(), summary_json(info)?);
    }
    save_json(&serde_json::Value::Object(combined), &path)?;
    written.push(path);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bag_is_an_error() {
        let err = bag_info_from_file(Path::new("/nonexistent/x.bag")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn non_bag_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.txt");
        fs::write(&p, "x").unwrap();
        let err = bag_info_from_file(&p).unwrap_err();
        assert!(err.to_string().contains("is not a rosbag"));
    }

    #[test]
    fn corrupt_bag_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("broken.bag");
        fs::write(&p, b"definitely not a bag").unwrap();
        assert_eq!(bag_info_from_file(&p).unwrap(), None);
    }

    #[test]
    fn finds_bags_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.bag"), "").unwrap();
        fs::write(dir.path().join("sub/a.bag"), "").unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();

        let all = find_bags(dir.path(), true).unwrap();
        assert_eq!(all.len(), 2);
        let flat = find_bags(dir.path(), false).unwrap();
        assert_eq!(flat, vec![dir.path().join("b.bag")]);
    }

    #[test]
    fn topic_helpers() {
        let summary = BagSummary {
            file_name: "a.bag".into(),
            start_time: 0.0,
            end_time: 1.0,
            duration: 1.0,
            file_size_mb: 0.1,
            topics: vec![
                TopicSummary {
                    topic: "/cam".into(),
                    msg_type: "sensor_msgs/Image".into(),
                    message_count: 3,
                    frequency: Some(3.0),
                },
                TopicSummary {
                    topic: "/imu".into(),
                    msg_type: "sensor_msgs/Imu".into(),
                    message_count: 9,
                    frequency: None,
                },
            ],
        };
        assert_eq!(summary.topics_of_type(&["sensor_msgs/Image"]), vec!["/cam".to_string()]);
        assert_eq!(summary.topic_dict()["/imu"].message_count, 9);
    }
}

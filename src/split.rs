//! Cut a bag into consecutive parts of equal duration.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::bag_io::{self, BagIndex};
use crate::bag_writer::BagWriter;
use crate::summary::input_bags;

#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    /// A bag file or a directory holding bags (not searched recursively)
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub chunks: u32,
}

pub fn part_name(stem: &str, part: u32) -> String {
    format!("{stem}_part{part:04}.bag")
}

/// Index of the part holding `time_ns`. Parts are half-open except the
/// last, which keeps the final message.
pub fn part_index(time_ns: u64, start_ns: u64, end_ns: u64, chunks: u32) -> usize {
    let last = chunks.saturating_sub(1) as usize;
    let span = end_ns.saturating_sub(start_ns) as f64 / chunks as f64;
    if span <= 0.0 {
        return 0;
    }
    let idx = (time_ns.saturating_sub(start_ns) as f64 / span) as usize;
    idx.min(last)
}

/// Split every input bag into `chunks` parts; returns the written part paths.
pub fn split_rosbag(options: &SplitOptions) -> Result<Vec<PathBuf>> {
    if options.chunks == 0 {
        bail!("number of chunks must be at least 1");
    }
    fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("failed to create {}", options.output_dir.display()))?;

    let mut written = Vec::new();
    for bag_path in input_bags(&options.input, false)? {
        written.extend(split_bag(&bag_path, &options.output_dir, options.chunks)?);
    }
    Ok(written)
}

fn split_bag(bag_path: &Path, output_dir: &Path, chunks: u32) -> Result<Vec<PathBuf>> {
    let bag = bag_io::open_bag(bag_path)?;
    let index = BagIndex::load(&bag)?;
    let stats = bag_io::collect_stats(&bag, &index)?;
    let (Some(start_ns), Some(end_ns)) = (stats.start_ns, stats.end_ns) else {
        tracing::warn!("{} holds no messages; nothing to split", bag_path.display());
        return Ok(Vec::new());
    };

    let stem = bag_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bag".to_string());
    tracing::info!(bag = %bag_path.display(), parts = chunks, "splitting {:.3}s", stats.duration_secs());

    let mut parts = Vec::with_capacity(chunks as usize);
    for part in 1..=chunks {
        parts.push(BagWriter::create(output_dir.join(part_name(&stem, part)))?);
    }
    // (part, source connection id) -> id in the part
    let mut ids: HashMap<(usize, u32), u32> = HashMap::new();
    let mut counts = vec![0u64; parts.len()];

    bag_io::for_each_message(&bag, |msg| {
        let Some(conn) = index.get(msg.conn_id) else {
            return Ok(());
        };
        let part = part_index(msg.time_ns, start_ns, end_ns, chunks);
        let writer = &mut parts[part];
        let id = *ids
            .entry((part, msg.conn_id))
            .or_insert_with(|| writer.add_connection_like(conn));
        writer.write(id, msg.time_ns, msg.data)?;
        counts[part] += 1;
        Ok(())
    })?;

    let mut written = Vec::with_capacity(parts.len());
    for (writer, count) in parts.into_iter().zip(counts) {
        let path = writer.finish()?;
        tracing::info!(messages = count, "wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

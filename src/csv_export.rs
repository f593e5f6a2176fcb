//! One CSV table per topic, columns taken from the message definition.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::bag_io::{self, BagIndex, ns_to_secs};
use crate::ros1::MsgDefinition;
use crate::summary::input_bags;

#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    /// A bag file or a directory holding bags (not searched recursively)
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Only these topics; None exports every topic
    pub topics: Option<Vec<String>>,
}

/// `/alphasense/cam0/image_raw` → `alphasense-cam0-image_raw.csv`
pub fn csv_file_name(topic: &str) -> String {
    format!("{}.csv", topic.replace('/', "-").trim_start_matches('-'))
}

/// Quote a cell when it holds a separator, quote or line break.
pub fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

struct TopicTable {
    definition: MsgDefinition,
    writer: BufWriter<File>,
    path: PathBuf,
    columns: Option<Vec<String>>,
    rows: u64,
}

/// Export every selected topic of every input bag. Returns the written CSV paths.
pub fn export_csv(options: &CsvOptions) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for bag_path in input_bags(&options.input, false)? {
        written.extend(export_bag(&bag_path, &options.output_dir, options.topics.as_deref())?);
    }
    Ok(written)
}

fn export_bag(bag_path: &Path, output_dir: &Path, topics: Option<&[String]>) -> Result<Vec<PathBuf>> {
    let bag = bag_io::open_bag(bag_path)?;
    let index = BagIndex::load(&bag)?;

    let stem = bag_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bag".to_string());
    let bag_dir = output_dir.join(stem);
    fs::create_dir_all(&bag_dir).with_context(|| format!("failed to create {}", bag_dir.display()))?;

    // topic -> table; connections of the same topic share a table
    let mut tables: BTreeMap<String, TopicTable> = BTreeMap::new();
    let mut conn_topic: HashMap<u32, String> = HashMap::new();
    for conn in index.connections.values() {
        if let Some(wanted) = topics
            && !wanted.contains(&conn.topic)
        {
            continue;
        }
        conn_topic.insert(conn.id, conn.topic.clone());
        if tables.contains_key(&conn.topic) {
            continue;
        }
        let definition = match MsgDefinition::parse(&conn.msg_type, &conn.message_definition) {
            Ok(def) => def,
            Err(e) => {
                tracing::warn!(topic = %conn.topic, "cannot parse message definition: {}; skipping topic", e);
                continue;
            }
        };
        tracing::debug!(
            topic = %conn.topic,
            msg_type = definition.root(),
            fields = definition.fields(definition.root()).map_or(0, <[_]>::len),
            "exporting topic"
        );
        let path = bag_dir.join(csv_file_name(&conn.topic));
        let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        tables.insert(
            conn.topic.clone(),
            TopicTable {
                definition,
                writer: BufWriter::new(file),
                path,
                columns: None,
                rows: 0,
            },
        );
    }

    bag_io::for_each_message(&bag, |msg| {
        let Some(topic) = conn_topic.get(&msg.conn_id) else {
            return Ok(());
        };
        let Some(table) = tables.get_mut(topic) else {
            return Ok(());
        };
        let value = match table.definition.decode(msg.data) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%topic, "failed to decode message: {}; skipping", e);
                return Ok(());
            }
        };
        let flat = value.flatten();

        if table.columns.is_none() {
            let columns: Vec<String> = flat.iter().map(|(k, _)| k.clone()).collect();
            let mut header = vec!["Time".to_string()];
            header.extend(columns.iter().map(|c| escape_cell(c)));
            writeln!(table.writer, "{}", header.join(","))?;
            table.columns = Some(columns);
        }

        let mut row = Vec::with_capacity(flat.len() + 1);
        row.push(format!("{:.9}", ns_to_secs(msg.time_ns)));
        row.extend(flat.iter().map(|(_, v)| escape_cell(v)));
        writeln!(table.writer, "{}", row.join(","))?;
        table.rows += 1;
        Ok(())
    })?;

    let mut written = Vec::new();
    for (topic, mut table) in tables {
        table.writer.flush()?;
        if table.rows == 0 {
            tracing::info!(%topic, "no messages decoded; removing empty table");
            drop(table.writer);
            fs::remove_file(&table.path)?;
            continue;
        }
        tracing::info!(%topic, rows = table.rows, "wrote {}", table.path.display());
        written.push(table.path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_topic() {
        assert_eq!(csv_file_name("/alphasense/cam0/image_raw"), "alphasense-cam0-image_raw.csv");
        assert_eq!(csv_file_name("odom"), "odom.csv");
    }

    #[test]
    fn cells_are_quoted_when_needed() {
        assert_eq!(escape_cell("plain"), "plain");
        assert_eq!(escape_cell("[1,2]"), "\"[1,2]\"");
        assert_eq!(escape_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}

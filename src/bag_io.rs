use anyhow::{Context, Result};
use prettytable::{Table, format, row};
use rosbag::{ChunkRecord, IndexRecord, MessageRecord, RosBag};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata of one connection record (topic + message type).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub id: u32,
    pub topic: String,
    pub msg_type: String,
    pub md5sum: String,
    pub message_definition: String,
}

/// A message record borrowed from the current chunk.
#[derive(Debug, Clone, Copy)]
pub struct RawMessage<'a> {
    pub conn_id: u32,
    pub time_ns: u64,
    pub data: &'a [u8],
}

pub fn open_bag(path: impl AsRef<Path>) -> Result<RosBag> {
    let path = path.as_ref();
    RosBag::new(path).with_context(|| format!("failed to open bag: {}", path.display()))
}

/// Connections of a bag keyed by connection id.
#[derive(Debug, Clone, Default)]
pub struct BagIndex {
    pub connections: BTreeMap<u32, ConnectionInfo>,
}

impl BagIndex {
    pub fn load(bag: &RosBag) -> Result<Self> {
        let mut connections = BTreeMap::new();

        for record in bag.index_records() {
            if let IndexRecord::Connection(conn) = record? {
                connections.entry(conn.id).or_insert_with(|| connection_info(&conn));
            }
        }

        if !connections.is_empty() {
            return Ok(Self { connections });
        }

        // bags without an index section still carry connections inside chunks
        for record in bag.chunk_records() {
            if let ChunkRecord::Chunk(chunk) = record? {
                for msg in chunk.messages() {
                    if let MessageRecord::Connection(conn) = msg? {
                        connections.entry(conn.id).or_insert_with(|| connection_info(&conn));
                    }
                }
            }
        }

        Ok(Self { connections })
    }

    pub fn get(&self, conn_id: u32) -> Option<&ConnectionInfo> {
        self.connections.get(&conn_id)
    }
}

fn connection_info(conn: &rosbag::record_types::Connection<'_>) -> ConnectionInfo {
    ConnectionInfo {
        id: conn.id,
        topic: conn.topic.to_string(),
        msg_type: conn.tp.to_string(),
        md5sum: md5_hex(conn.md5sum),
        message_definition: conn.message_definition.to_string(),
    }
}

/// Normalise an md5 to lowercase hex whether it comes as raw digest bytes
/// or already hex encoded.
fn md5_hex(md5: impl AsRef<[u8]>) -> String {
    let bytes = md5.as_ref();
    if bytes.len() == 32 && bytes.iter().all(|b| b.is_ascii_hexdigit()) {
        return String::from_utf8_lossy(bytes).to_ascii_lowercase();
    }
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Visit every message record in file order.
pub fn for_each_message<F>(bag: &RosBag, mut f: F) -> Result<()>
where
    F: FnMut(RawMessage<'_>) -> Result<()>,
{
    for record in bag.chunk_records() {
        if let ChunkRecord::Chunk(chunk) = record? {
            for msg in chunk.messages() {
                if let MessageRecord::MessageData(msg_data) = msg? {
                    f(RawMessage {
                        conn_id: msg_data.conn_id,
                        time_ns: msg_data.time,
                        data: msg_data.data,
                    })?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicStats {
    pub topic: String,
    pub msg_type: String,
    pub count: u64,
    pub first_ns: u64,
    pub last_ns: u64,
    /// 1 / median period, `None` with fewer than two messages
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BagStats {
    pub start_ns: Option<u64>,
    pub end_ns: Option<u64>,
    pub total: u64,
    pub topics: BTreeMap<String, TopicStats>,
}

impl BagStats {
    pub fn start_secs(&self) -> f64 {
        self.start_ns.map(ns_to_secs).unwrap_or(0.0)
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ns.map(ns_to_secs).unwrap_or(0.0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs() - self.start_secs()
    }
}

pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

pub fn collect_stats(bag: &RosBag, index: &BagIndex) -> Result<BagStats> {
    let mut stats = BagStats::default();
    let mut times: BTreeMap<String, Vec<u64>> = BTreeMap::new();

    for_each_message(bag, |msg| {
        stats.total += 1;
        stats.start_ns = Some(stats.start_ns.map_or(msg.time_ns, |s| s.min(msg.time_ns)));
        stats.end_ns = Some(stats.end_ns.map_or(msg.time_ns, |e| e.max(msg.time_ns)));

        let Some(conn) = index.get(msg.conn_id) else {
            tracing::warn!(conn_id = msg.conn_id, "message references unknown connection");
            return Ok(());
        };
        let entry = stats.topics.entry(conn.topic.clone()).or_insert_with(|| TopicStats {
            topic: conn.topic.clone(),
            msg_type: conn.msg_type.clone(),
            count: 0,
            first_ns: msg.time_ns,
            last_ns: msg.time_ns,
            frequency: None,
        });
        entry.count += 1;
        entry.first_ns = entry.first_ns.min(msg.time_ns);
        entry.last_ns = entry.last_ns.max(msg.time_ns);
        times.entry(conn.topic.clone()).or_default().push(msg.time_ns);
        Ok(())
    })?;

    for (topic, ts) in times.iter_mut() {
        if let Some(entry) = stats.topics.get_mut(topic) {
            entry.frequency = median_frequency(ts);
        }
    }

    Ok(stats)
}

fn median_frequency(times: &mut [u64]) -> Option<f64> {
    if times.len() < 2 {
        return None;
    }
    times.sort_unstable();
    let mut periods: Vec<u64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    periods.sort_unstable();
    let mid = periods.len() / 2;
    let median_ns = if periods.len() % 2 == 0 {
        (periods[mid - 1] as f64 + periods[mid] as f64) / 2.0
    } else {
        periods[mid] as f64
    };
    if median_ns <= 0.0 {
        None
    } else {
        Some(1_000_000_000.0 / median_ns)
    }
}

pub fn inspect_bag(path: &str) -> Result<()> {
    let bag = open_bag(path)?;
    let index = BagIndex::load(&bag)?;
    let stats = collect_stats(&bag, &index)?;

    let bag_start = stats.start_secs();
    println!("Bag: {}", path);
    println!(
        "Start (s): {:.6}, End (s): {:.6}, Duration (s): {:.6}, Total messages: {}\n",
        0.0,
        stats.duration_secs(),
        stats.duration_secs(),
        stats.total
    );

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row!["Topic", "Type", "Count", "Freq(Hz)", "Start(s)", "End(s)"]);
    for st in stats.topics.values() {
        let freq = st
            .frequency
            .map(|f| format!("{f:.2}"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(row![
            st.topic,
            st.msg_type,
            r->st.count,
            r->freq,
            r->format!("{:.6}", ns_to_secs(st.first_ns) - bag_start),
            r->format!("{:.6}", ns_to_secs(st.last_ns) - bag_start)
        ]);
    }
    table.printstd();

    Ok(())
}

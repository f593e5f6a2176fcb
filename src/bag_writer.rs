//! Writer for ROS bag v2.0 files with uncompressed chunks.
//!
//! Layout: version line, bag header record padded to 4096 bytes, then chunk
//! records each followed by their index data records, and finally the index
//! section (connection records and chunk info records) that the bag header
//! points at.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::bag_io::ConnectionInfo;

const VERSION_LINE: &[u8] = b"#ROSBAG V2.0\n";
const BAG_HEADER_LEN: usize = 4096;
const DEFAULT_CHUNK_THRESHOLD: usize = 768 * 1024;

const OP_MSG_DATA: u8 = 0x02;
const OP_BAG_HEADER: u8 = 0x03;
const OP_INDEX_DATA: u8 = 0x04;
const OP_CHUNK: u8 = 0x05;
const OP_CHUNK_INFO: u8 = 0x06;
const OP_CONNECTION: u8 = 0x07;

struct ChunkInfo {
    pos: u64,
    start_ns: u64,
    end_ns: u64,
    counts: BTreeMap<u32, u32>,
}

#[derive(Default)]
struct OpenChunk {
    data: Vec<u8>,
    start_ns: Option<u64>,
    end_ns: Option<u64>,
    /// conn id -> (time, offset in chunk data)
    index: BTreeMap<u32, Vec<(u64, u32)>>,
}

pub struct BagWriter {
    path: PathBuf,
    out: BufWriter<File>,
    pos: u64,
    connections: Vec<ConnectionInfo>,
    connection_written: Vec<bool>,
    chunk: OpenChunk,
    chunk_infos: Vec<ChunkInfo>,
    chunk_threshold: usize,
}

impl BagWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).with_context(|| format!("failed to create bag: {}", path.display()))?;
        let mut writer = Self {
            path,
            out: BufWriter::new(file),
            pos: 0,
            connections: Vec::new(),
            connection_written: Vec::new(),
            chunk: OpenChunk::default(),
            chunk_infos: Vec::new(),
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        };
        writer.emit(VERSION_LINE)?;
        // placeholder, rewritten by finish()
        let header = bag_header_record(0, 0, 0);
        writer.emit(&header)?;
        Ok(writer)
    }

    pub fn with_chunk_threshold(mut self, bytes: usize) -> Self {
        self.chunk_threshold = bytes.max(1);
        self
    }

    /// Register a connection; returns its id in this bag.
    pub fn add_connection(&mut self, topic: &str, msg_type: &str, md5sum: &str, message_definition: &str) -> u32 {
        let id = self.connections.len() as u32;
        self.connections.push(ConnectionInfo {
            id,
            topic: topic.to_string(),
            msg_type: msg_type.to_string(),
            md5sum: md5sum.to_string(),
            message_definition: message_definition.to_string(),
        });
        self.connection_written.push(false);
        id
    }

    pub fn add_connection_like(&mut self, conn: &ConnectionInfo) -> u32 {
        self.add_connection(&conn.topic, &conn.msg_type, &conn.md5sum, &conn.message_definition)
    }

    pub fn write(&mut self, conn_id: u32, time_ns: u64, data: &[u8]) -> Result<()> {
        let idx = conn_id as usize;
        if idx >= self.connections.len() {
            anyhow::bail!("unknown connection id {conn_id} for {}", self.path.display());
        }
        if !self.connection_written[idx] {
            let conn_record = connection_record(&self.connections[idx]);
            self.chunk.data.extend_from_slice(&conn_record);
            self.connection_written[idx] = true;
        }

        let offset = self.chunk.data.len() as u32;
        let msg_record = record(
            &[
                ("op", vec![OP_MSG_DATA]),
                ("conn", conn_id.to_le_bytes().to_vec()),
                ("time", time_bytes(time_ns).to_vec()),
            ],
            data,
        );
        self.chunk.data.extend_from_slice(&msg_record);
        self.chunk.index.entry(conn_id).or_default().push((time_ns, offset));
        self.chunk.start_ns = Some(self.chunk.start_ns.map_or(time_ns, |s| s.min(time_ns)));
        self.chunk.end_ns = Some(self.chunk.end_ns.map_or(time_ns, |e| e.max(time_ns)));

        if self.chunk.data.len() >= self.chunk_threshold {
            self.flush_chunk()?;
        }
        Ok(())
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let chunk = std::mem::take(&mut self.chunk);
        let (Some(start_ns), Some(end_ns)) = (chunk.start_ns, chunk.end_ns) else {
            return Ok(());
        };

        let chunk_pos = self.pos;
        let chunk_record = record(
            &[
                ("op", vec![OP_CHUNK]),
                ("compression", b"none".to_vec()),
                ("size", (chunk.data.len() as u32).to_le_bytes().to_vec()),
            ],
            &chunk.data,
        );
        self.emit(&chunk_record)?;

        let mut counts = BTreeMap::new();
        for (conn_id, entries) in &chunk.index {
            let mut data = Vec::with_capacity(entries.len() * 12);
            for (time_ns, offset) in entries {
                data.extend_from_slice(&time_bytes(*time_ns));
                data.extend_from_slice(&offset.to_le_bytes());
            }
            let index_record = record(
                &[
                    ("op", vec![OP_INDEX_DATA]),
                    ("ver", 1u32.to_le_bytes().to_vec()),
                    ("conn", conn_id.to_le_bytes().to_vec()),
                    ("count", (entries.len() as u32).to_le_bytes().to_vec()),
                ],
                &data,
            );
            self.emit(&index_record)?;
            counts.insert(*conn_id, entries.len() as u32);
        }

        self.chunk_infos.push(ChunkInfo {
            pos: chunk_pos,
            start_ns,
            end_ns,
            counts,
        });
        Ok(())
    }

    /// Flush the open chunk, write the index section and patch the bag header.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.flush_chunk()?;

        let index_pos = self.pos;
        let mut index = Vec::new();
        for conn in &self.connections {
            index.extend_from_slice(&connection_record(conn));
        }
        for info in &self.chunk_infos {
            let mut data = Vec::with_capacity(info.counts.len() * 8);
            for (conn_id, count) in &info.counts {
                data.extend_from_slice(&conn_id.to_le_bytes());
                data.extend_from_slice(&count.to_le_bytes());
            }
            index.extend_from_slice(&record(
                &[
                    ("op", vec![OP_CHUNK_INFO]),
                    ("ver", 1u32.to_le_bytes().to_vec()),
                    ("chunk_pos", info.pos.to_le_bytes().to_vec()),
                    ("start_time", time_bytes(info.start_ns).to_vec()),
                    ("end_time", time_bytes(info.end_ns).to_vec()),
                    ("count", (info.counts.len() as u32).to_le_bytes().to_vec()),
                ],
                &data,
            ));
        }
        self.emit(&index)?;

        let header = bag_header_record(index_pos, self.connections.len() as u32, self.chunk_infos.len() as u32);
        self.out.seek(SeekFrom::Start(VERSION_LINE.len() as u64))?;
        self.out.write_all(&header)?;
        self.out.flush()?;
        tracing::debug!(
            path = %self.path.display(),
            connections = self.connections.len(),
            chunks = self.chunk_infos.len(),
            "bag written"
        );
        Ok(self.path)
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}

fn time_bytes(time_ns: u64) -> [u8; 8] {
    let sec = (time_ns / 1_000_000_000) as u32;
    let nsec = (time_ns % 1_000_000_000) as u32;
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&sec.to_le_bytes());
    out[4..].copy_from_slice(&nsec.to_le_bytes());
    out
}

fn header_fields(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in fields {
        let len = (name.len() + 1 + value.len()) as u32;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value);
    }
    out
}

fn record(fields: &[(&str, Vec<u8>)], data: &[u8]) -> Vec<u8> {
    record_with_header(&header_fields(fields), data)
}

fn connection_record(conn: &ConnectionInfo) -> Vec<u8> {
    let data = header_fields(&[
        ("topic", conn.topic.as_bytes().to_vec()),
        ("type", conn.msg_type.as_bytes().to_vec()),
        ("md5sum", conn.md5sum.as_bytes().to_vec()),
        ("message_definition", conn.message_definition.as_bytes().to_vec()),
    ]);
    record(
        &[
            ("op", vec![OP_CONNECTION]),
            ("conn", conn.id.to_le_bytes().to_vec()),
            ("topic", conn.topic.as_bytes().to_vec()),
        ],
        &data,
    )
}

fn bag_header_record(index_pos: u64, conn_count: u32, chunk_count: u32) -> Vec<u8> {
    let header = header_fields(&[
        ("op", vec![OP_BAG_HEADER]),
        ("index_pos", index_pos.to_le_bytes().to_vec()),
        ("conn_count", conn_count.to_le_bytes().to_vec()),
        ("chunk_count", chunk_count.to_le_bytes().to_vec()),
    ]);
    let padding = BAG_HEADER_LEN - 8 - header.len();
    record_with_header(&header, &vec![b' '; padding])
}

fn record_with_header(header: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + header.len() + data.len());
    out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

use anyhow::{Context, Result, anyhow};
use flume::{Receiver, Sender};
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use crate::bag_io::{self, BagIndex};
use crate::image_decode::{self, ImageFileFormat};
use crate::manifest::{ImageManifest, ManifestEntry};
use crate::ros1;
use crate::summary::{BagSummary, TopicSummary};
use crate::timefilter::{filter_fraction, is_message_within_time_range, offset_s_to_rosbag_ns};
use crate::video;

/// How extracted image files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Naming {
    /// zero-padded per-topic message index
    #[default]
    Sequential,
    /// bag record time in ns
    RosbagTimestamp,
    /// message header stamp in ns
    MsgTimestamp,
}

impl FromStr for Naming {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sequential" => Ok(Naming::Sequential),
            "rosbag_timestamp" => Ok(Naming::RosbagTimestamp),
            "msg_timestamp" => Ok(Naming::MsgTimestamp),
            other => Err(anyhow!(
                "Invalid naming '{}'. Use 'sequential', 'rosbag_timestamp' or 'msg_timestamp'",
                other
            )),
        }
    }
}

/// Options for extracting images from a ROS bag
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Path to the input .bag file
    pub bag_path: PathBuf,
    /// Root folder; one sub-folder is created per topic
    pub output_folder: PathBuf,
    pub file_format: ImageFileFormat,
    /// Topics to extract (None means every image topic)
    pub topics: Option<Vec<String>>,
    /// Write img_manifest.json per topic folder
    pub create_manifest: bool,
    pub naming: Naming,
    /// Resize every image to (width, height)
    pub resize: Option<(u32, u32)>,
    /// Keep one message out of every `sample` per topic
    pub sample: Option<u64>,
    /// Start offset in seconds from the beginning of the bag
    pub start_time: Option<f64>,
    /// End offset in seconds from the beginning of the bag
    pub end_time: Option<f64>,
    pub show_progress: bool,
    /// Number of threads encoding and writing image files
    pub write_workers: usize,
    /// Encode each topic folder into video.mp4 afterwards
    pub make_video: bool,
    /// Keep the .jpg frames after the video was created
    pub keep_images: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            bag_path: PathBuf::new(),
            output_folder: PathBuf::new(),
            file_format: ImageFileFormat::Jpg,
            topics: None,
            create_manifest: true,
            naming: Naming::Sequential,
            resize: None,
            sample: None,
            start_time: None,
            end_time: None,
            show_progress: true,
            write_workers: 2,
            make_video: false,
            keep_images: true,
        }
    }
}

pub fn image_name_from_index(index: u64, file_format: &str, zero_padding: usize) -> String {
    format!("{index:0zero_padding$}.{file_format}")
}

pub fn image_name_from_timestamp(timestamp: u64, file_format: &str) -> String {
    format!("{timestamp}.{file_format}")
}

/// `/alphasense/cam0/image_raw` → `alphasense_cam0_image_raw`
pub fn replace_ros_topic_name(topic: &str, replace_character: char) -> String {
    topic
        .replace('/', &replace_character.to_string())
        .trim_start_matches(replace_character)
        .to_string()
}

/// Parse `W,H`.
pub fn parse_resize(arg: &str) -> Result<(u32, u32), crate::error::BagError> {
    let invalid = || crate::error::BagError::InvalidResize(arg.to_string());
    let parts: Vec<&str> = arg.split(',').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid());
    }
    let width = parts[0].trim().parse::<u32>().map_err(|_| invalid())?;
    let height = parts[1].trim().parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

struct WriteJob {
    image: DynamicImage,
    path: PathBuf,
    resize: Option<(u32, u32)>,
    format: ImageFileFormat,
}

/// Extract images from a bag. Returns the per-topic output folders.
pub fn extract_images(options: &ExtractOptions) -> Result<Vec<PathBuf>> {
    if options.write_workers == 0 {
        anyhow::bail!("write-workers must be >= 1");
    }
    if options.sample == Some(0) {
        anyhow::bail!("sample must be > 0");
    }

    let bag = bag_io::open_bag(&options.bag_path)?;
    let index = BagIndex::load(&bag)?;
    let stats = bag_io::collect_stats(&bag, &index)?;
    let bag_summary = BagSummary::from_stats(&options.bag_path, &stats)?;
    let topic_dict = bag_summary.topic_dict();

    let requested: Vec<String> = match &options.topics {
        Some(t) if !t.is_empty() => t.clone(),
        _ => bag_summary.topics_of_type(ros1::image_topic_types()),
    };

    let mut selected: BTreeMap<String, TopicSummary> = BTreeMap::new();
    for topic in requested {
        match topic_dict.get(&topic) {
            Some(summary) if ros1::image_topic_types().contains(&summary.msg_type.as_str()) => {
                selected.insert(topic, summary.clone());
            }
            Some(summary) => {
                tracing::warn!("{} has type {}, not an image type..skipping.", topic, summary.msg_type);
            }
            None => tracing::warn!("{} not in bag..skipping.", topic),
        }
    }
    if selected.is_empty() {
        tracing::warn!("no image topics to extract in {}", options.bag_path.display());
        return Ok(Vec::new());
    }

    let total: u64 = selected.values().map(|t| t.message_count).sum();
    let mut estimate = total as f64;
    if options.start_time.is_some() || options.end_time.is_some() {
        let fraction = filter_fraction(options.start_time, options.end_time, 0.0, stats.duration_secs())
            .unwrap_or(1.0)
            .max(0.0);
        estimate *= fraction.min(1.0);
    }
    if let Some(n) = options.sample {
        estimate /= n as f64;
    }
    tracing::info!(
        "iterating over {} images to extract: {} images",
        total,
        estimate.floor() as u64
    );

    let folders: BTreeMap<String, PathBuf> = selected
        .keys()
        .map(|t| (t.clone(), topic_folder(&options.output_folder, t)))
        .collect();
    for folder in folders.values() {
        std::fs::create_dir_all(folder).with_context(|| format!("failed to create {}", folder.display()))?;
    }

    // bounded so decoding cannot run far ahead of encoding
    let (job_tx, job_rx): (Sender<WriteJob>, Receiver<WriteJob>) = flume::bounded(options.write_workers * 4);
    let (result_tx, result_rx): (Sender<Result<PathBuf>>, Receiver<Result<PathBuf>>) = flume::unbounded();
    let workers: Vec<_> = (0..options.write_workers)
        .map(|i| {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            std::thread::spawn(move || write_worker(i, rx, tx))
        })
        .collect();
    drop(job_rx);
    drop(result_tx);

    let pb = if options.show_progress {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} msgs {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(pb)
    } else {
        None
    };

    let log_every = std::env::var("BAG2MEDIA_LOG_EVERY")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|v| *v > 0);
    let started = Instant::now();
    let bag_start_ns = stats.start_ns.unwrap_or(0);
    let start_ns = options.start_time.map(|s| offset_s_to_rosbag_ns(s, bag_start_ns));
    let end_ns = options.end_time.map(|e| offset_s_to_rosbag_ns(e, bag_start_ns));
    let ext = options.file_format.extension();

    let mut counters: HashMap<String, u64> = selected.keys().map(|t| (t.clone(), 0)).collect();
    let mut manifests: BTreeMap<String, ImageManifest> = BTreeMap::new();
    let mut dispatched: u64 = 0;
    let mut decode_failures: u64 = 0;
    let mut after_window: u64 = 0;

    let iteration = bag_io::for_each_message(&bag, |msg| {
        let Some(conn) = index.get(msg.conn_id) else {
            return Ok(());
        };
        let Some(counter) = counters.get_mut(&conn.topic) else {
            return Ok(());
        };
        let msg_index = *counter;
        *counter += 1;
        if let Some(pb) = &pb {
            pb.inc(1);
        }

        let (in_range, past_end) = is_message_within_time_range(msg.time_ns, start_ns, end_ns);
        if past_end {
            after_window += 1;
        }
        if !in_range {
            return Ok(());
        }
        if let Some(n) = options.sample
            && msg_index % n != 0
        {
            return Ok(());
        }

        let (image, stamp) = match image_decode::decode_image_message(&conn.msg_type, msg.data) {
            Ok(decoded) => decoded,
            Err(e) => {
                decode_failures += 1;
                tracing::warn!(topic = %conn.topic, index = msg_index, "failed to decode image: {}; skipping", e);
                return Ok(());
            }
        };

        let topic_folder_name = replace_ros_topic_name(&conn.topic, '_');
        let name = match options.naming {
            Naming::Sequential => image_name_from_index(msg_index, ext, 6),
            Naming::RosbagTimestamp => image_name_from_timestamp(msg.time_ns, ext),
            Naming::MsgTimestamp => image_name_from_timestamp(stamp.as_nanos(), ext),
        };
        let img_name = format!("{topic_folder_name}_{name}");
        let path = folders[&conn.topic].join(&img_name);

        if options.create_manifest {
            manifests.entry(conn.topic.clone()).or_default().images.insert(
                img_name.clone(),
                ManifestEntry {
                    msg_timestamp: stamp.as_nanos(),
                    rosbag_timestamp: msg.time_ns,
                    path: path.display().to_string(),
                    msg_index,
                    img_name,
                },
            );
        }

        job_tx
            .send(WriteJob {
                image,
                path,
                resize: options.resize,
                format: options.file_format,
            })
            .map_err(|_| anyhow!("image writer workers stopped unexpectedly"))?;
        dispatched += 1;

        if let Some(n) = log_every
            && dispatched % n == 0
        {
            tracing::info!(dispatched, elapsed = ?started.elapsed(), "extraction progress");
        }
        Ok(())
    });

    // let the workers drain before reporting anything
    drop(job_tx);
    let mut written: u64 = 0;
    let mut first_error: Option<anyhow::Error> = None;
    for result in result_rx.iter() {
        match result {
            Ok(_) => written += 1,
            Err(e) => {
                tracing::error!("failed to write image: {:#}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    for worker in workers {
        if worker.join().is_err() {
            first_error.get_or_insert(anyhow!("image writer worker panicked"));
        }
    }
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    iteration?;
    if let Some(e) = first_error {
        return Err(e);
    }

    tracing::info!(
        written,
        decode_failures,
        after_window,
        topics = selected.len(),
        elapsed = ?started.elapsed(),
        "extracted images from {}",
        options.bag_path.display()
    );

    if options.create_manifest {
        for (topic, summary) in &selected {
            let mut manifest = manifests.remove(topic).unwrap_or_default();
            manifest.topic = Some(summary.clone());
            manifest.write_if_absent(&folders[topic])?;
        }
    }

    let out: Vec<PathBuf> = folders.into_values().collect();
    if options.make_video {
        for folder in &out {
            video::video_from_image_folder(folder, options.keep_images, None)?;
        }
    }
    Ok(out)
}

fn write_worker(id: usize, rx: Receiver<WriteJob>, tx: Sender<Result<PathBuf>>) {
    while let Ok(job) = rx.recv() {
        let res = (|| -> Result<PathBuf> {
            let image = match job.resize {
                Some((w, h)) => image_decode::resize(&job.image, w, h),
                None => job.image,
            };
            image_decode::save_image(&image, &job.path, job.format)
                .with_context(|| format!("failed to write {}", job.path.display()))?;
            Ok(job.path)
        })();
        if tx.send(res).is_err() {
            break;
        }
    }
    tracing::trace!(worker = id, "image writer finished");
}

/// Folder that `extract_images` uses for `topic` below `output_folder`.
pub fn topic_folder(output_folder: &Path, topic: &str) -> PathBuf {
    output_folder.join(replace_ros_topic_name(topic, '_'))
}

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bag2media",
    about = "Extract images, videos, CSV tables and metadata from ROS1 bag files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List topics, types, message counts and time span of a bag
    Inspect {
        /// Path to the .bag file
        bag: String,
    },

    /// Write a JSON metadata summary of a bag or of every bag in a folder
    Summary {
        /// A .bag file or a folder searched recursively
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
        /// Output folder or .json path (optional with --split)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
        /// File name used when the output is a folder
        #[arg(short = 'f', long = "file-name", default_value = "rosbag_metadata.json")]
        file_name: String,
        /// One JSON file per bag instead of a single combined file
        #[arg(short = 's', long = "split")]
        split: bool,
        /// Prefix written file names with '.'
        #[arg(long = "hidden")]
        hidden: bool,
    },

    /// Extract images from the image topics of a bag
    Images {
        /// Path to the .bag file
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
        /// Output folder; one sub-folder per topic
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Image file format: jpg or png
        #[arg(long = "format", default_value = "jpg")]
        format: String,
        /// Comma separated topics (default: every image topic)
        #[arg(long = "topics", value_delimiter = ',')]
        topics: Option<Vec<String>>,
        /// File naming: sequential, rosbag_timestamp or msg_timestamp
        #[arg(long = "naming", default_value = "sequential")]
        naming: String,
        /// Resize every image to width,height (e.g. 800,600)
        #[arg(long = "resize")]
        resize: Option<String>,
        /// Keep one image out of every N per topic
        #[arg(long = "sample")]
        sample: Option<u64>,
        /// Start offset in seconds from the beginning of the bag
        #[arg(long = "start")]
        start: Option<f64>,
        /// End offset in seconds from the beginning of the bag
        #[arg(long = "end")]
        end: Option<f64>,
        /// Do not write img_manifest.json
        #[arg(long = "no-manifest")]
        no_manifest: bool,
        /// Encode each topic folder into video.mp4 (requires ffmpeg)
        #[arg(long = "video")]
        video: bool,
        /// Keep the frames after the video was written
        #[arg(long = "keep-images", action = ArgAction::Set, default_value_t = true)]
        keep_images: bool,
        /// Number of threads encoding and writing image files
        #[arg(long = "write-workers", default_value_t = 2)]
        write_workers: usize,
        /// Hide the progress bar
        #[arg(long = "no-progress")]
        no_progress: bool,
    },

    /// Encode a folder of extracted images into video.mp4 (requires ffmpeg)
    Video {
        /// Folder holding the frames and usually an img_manifest.json
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
        /// Scale factor applied to every frame (e.g. 0.5)
        #[arg(long = "resize")]
        resize: Option<f64>,
        /// Keep the frames after the video was written
        #[arg(long = "keep-images", action = ArgAction::Set, default_value_t = true)]
        keep_images: bool,
    },

    /// Export every topic of a bag (or of the bags in a folder) to CSV
    Csv {
        /// A .bag file or a folder of bags
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
        /// Output folder; one sub-folder per bag
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Comma separated topics (default: every topic)
        #[arg(short = 't', long = "topics", value_delimiter = ',')]
        topics: Option<Vec<String>>,
    },

    /// Split a bag (or the bags in a folder) into parts of equal duration
    Split {
        /// A .bag file or a folder of bags
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
        /// Output folder for the parts
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Number of parts per bag
        #[arg(short = 'c', long = "chunks")]
        chunks: u32,
    },

    /// Show supported message types, image encodings and outputs
    Schema {},
}

/// Trim topic names and drop empty entries; `None` when nothing is left.
pub fn clean_topics(topics: Option<Vec<String>>) -> Option<Vec<String>> {
    let topics: Vec<String> = topics?
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    (!topics.is_empty()).then_some(topics)
}

//! bag2media - Extract images, videos, CSV tables and metadata from ROS1 bags
//!
//! This library reads ROS1 `.bag` files (format 2.0) and turns their content
//! into files that are easy to use outside of ROS.
//!
//! # Features
//!
//! - **Images**: `sensor_msgs/Image` (rgb8, bgr8, rgba8, bgra8, mono8, mono16,
//!   8UC1, 8UC3, 16UC1) and `sensor_msgs/CompressedImage` including
//!   `compressedDepth`, written as jpg/png with a per-topic manifest
//! - **Videos**: extracted image folders encoded to mp4 through ffmpeg
//! - **Summaries**: topics, counts, frequencies and time span as JSON
//! - **CSV**: any message type flattened using its embedded definition
//! - **Split**: cut bags into parts of equal duration
//! - **Parallel processing**: background workers encode and write images
//!
//! # Example
//!
//! ```rust,no_run
//! use bag2media::{extract_images, ExtractOptions, Naming};
//!
//! let options = ExtractOptions {
//!     bag_path: "input.bag".into(),
//!     output_folder: "frames".into(),
//!     topics: Some(vec!["/camera/image_raw".to_string()]),
//!     naming: Naming::RosbagTimestamp,
//!     sample: Some(5),
//!     ..Default::default()
//! };
//!
//! let folders = extract_images(&options)?;
//! println!("wrote {} topic folder(s)", folders.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod bag_io;
pub mod bag_writer;
pub mod cli;
pub mod csv_export;
pub mod error;
pub mod extract;
pub mod image_decode;
pub mod manifest;
pub mod ros1;
pub mod schema;
pub mod split;
pub mod summary;
pub mod timefilter;
pub mod video;

// Re-export main types for convenience
pub use bag_writer::BagWriter;
pub use csv_export::{CsvOptions, export_csv};
pub use error::{BagError, BagResult};
pub use extract::{ExtractOptions, Naming, extract_images};
pub use image_decode::ImageFileFormat;
pub use split::{SplitOptions, split_rosbag};
pub use summary::{BagSummary, SummaryOptions, TopicSummary, write_summary};
pub use video::{VideoOptions, make_video};

//! Schema command - Print supported message types and outputs

use anyhow::Result;

use crate::ros1::{COMPRESSED_IMAGE_TYPE, IMAGE_TYPE};

pub const RAW_ENCODINGS: &[&str] = &[
    "rgb8", "bgr8", "8UC3", "rgba8", "bgra8", "mono8", "8UC1", "mono16", "16UC1",
];

pub fn outputs() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        (IMAGE_TYPE, "images", "jpg/png per topic + img_manifest.json"),
        (COMPRESSED_IMAGE_TYPE, "images", "jpg/png per topic + img_manifest.json"),
        ("compressedDepth", "images", "JET colour mapped depth"),
        ("image folder", "video", "video.mp4 (ffmpeg, libx264)"),
        ("any type", "csv", "<topic>.csv with flattened fields"),
        ("any type", "summary", "rosbag_metadata.json"),
        ("any type", "split", "<stem>_partNNNN.bag"),
    ]
}

/// Print supported message types, raw image encodings and outputs
pub fn print_schema() -> Result<()> {
    println!("Supported inputs → outputs:");
    println!("---------------------------------------------------------------");
    for (input, command, output) in outputs() {
        println!("{:<30} {:<10} → {}", input, command, output);
    }
    println!();
    println!("Raw image encodings: {}", RAW_ENCODINGS.join(", "));
    Ok(())
}

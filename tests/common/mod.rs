#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bag2media::BagWriter;
use bag2media::ros1::sensor_msgs::{Image, compressed_image_definition, image_definition};
use bag2media::ros1::{CompressedImage, Header, RosTime};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, RgbImage};
use std::io::Cursor;

pub const CAMERA_TOPIC: &str = "/camera/image_raw";
pub const COUNTER_TOPIC: &str = "/counter";
pub const COMPRESSED_TOPIC: &str = "/camera/compressed";
pub const DEPTH_TOPIC: &str = "/depth/compressedDepth";
pub const BAG_START_NS: u64 = 1_600_000_000_000_000_000;

/// Frame `i` of a small gradient test pattern.
pub fn test_image(i: u32, width: u32, height: u32) -> Image {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x * 40) as u8, (y * 40) as u8, (i * 20) as u8]);
        }
    }
    Image {
        header: header(i),
        height,
        width,
        encoding: "rgb8".to_string(),
        is_bigendian: false,
        step: width * 3,
        data,
    }
}

/// A bag with `frames` camera images at 10 Hz and a uint32 counter at 20 Hz.
pub fn write_fixture_bag(dir: &Path, name: &str, frames: u32) -> PathBuf {
    let path = dir.join(name);
    let mut writer = BagWriter::create(&path).unwrap();
    let camera = writer.add_connection(
        CAMERA_TOPIC,
        "sensor_msgs/Image",
        "060021388200f6f0f447d0fcd9c64743",
        &image_definition(),
    );
    let counter = writer.add_connection(
        COUNTER_TOPIC,
        "std_msgs/UInt32",
        "304a39449588c7f8ce2df6e8001c5fce",
        "uint32 data\n",
    );
    for i in 0..frames {
        let t = BAG_START_NS + i as u64 * 100_000_000;
        writer.write(camera, t, &test_image(i, 4, 3).serialize()).unwrap();
        writer.write(counter, t, &(2 * i).to_le_bytes()).unwrap();
        writer.write(counter, t + 50_000_000, &(2 * i + 1).to_le_bytes()).unwrap();
    }
    writer.finish().unwrap()
}

fn png_bytes(img: DynamicImage) -> Vec<u8> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
    out
}

fn header(i: u32) -> Header {
    Header {
        seq: i,
        stamp: RosTime { sec: 100 + i, nsec: 0 },
        frame_id: "camera".to_string(),
    }
}

/// A bag with `frames` compressed colour images (PNG bytes under a "jpeg"
/// label, as some drivers publish them) and compressedDepth frames, at 10 Hz.
pub fn write_compressed_bag(dir: &Path, name: &str, frames: u32) -> PathBuf {
    let path = dir.join(name);
    let mut writer = BagWriter::create(&path).unwrap();
    let colour = writer.add_connection(
        COMPRESSED_TOPIC,
        "sensor_msgs/CompressedImage",
        "8f7a12909da2c9d3332d540a0977563f",
        &compressed_image_definition(),
    );
    let depth = writer.add_connection(
        DEPTH_TOPIC,
        "sensor_msgs/CompressedImage",
        "8f7a12909da2c9d3332d540a0977563f",
        &compressed_image_definition(),
    );
    for i in 0..frames {
        let t = BAG_START_NS + i as u64 * 100_000_000;
        let rgb = RgbImage::from_fn(4, 3, |x, y| image::Rgb([(x * 50) as u8, (y * 80) as u8, (i * 10) as u8]));
        let colour_msg = CompressedImage {
            header: header(i),
            format: "jpeg".to_string(),
            data: png_bytes(DynamicImage::ImageRgb8(rgb)),
        };
        writer.write(colour, t, &colour_msg.serialize()).unwrap();

        let values: Vec<u16> = (0..12).map(|v| v * 100 + i as u16).collect();
        let depth_img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(4, 3, values).unwrap();
        let mut data = vec![0u8; 12];
        data.extend_from_slice(&png_bytes(DynamicImage::ImageLuma16(depth_img)));
        let depth_msg = CompressedImage {
            header: header(i),
            format: "16UC1; compressedDepth png".to_string(),
            data,
        };
        writer.write(depth, t, &depth_msg.serialize()).unwrap();
    }
    writer.finish().unwrap()
}

/// Executable stand-in for ffmpeg: drains stdin and writes its last argument.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-ffmpeg.sh");
    std::fs::write(&path, "#!/bin/sh\nfor last; do :; done\ncat > /dev/null\necho video > \"$last\"\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

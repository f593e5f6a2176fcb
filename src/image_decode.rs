//! sensor_msgs/Image and sensor_msgs/CompressedImage → `image::DynamicImage`

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use std::path::Path;
use std::str::FromStr;

use crate::error::{BagError, BagResult};
use crate::ros1::{COMPRESSED_IMAGE_TYPE, CompressedImage, IMAGE_TYPE, Image, RosTime};

/// Size of the `ConfigHeader` prepended to compressedDepth payloads
/// (compression format + two depth quantization floats).
const DEPTH_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFileFormat {
    Jpg,
    Png,
}

impl ImageFileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFileFormat::Jpg => "jpg",
            ImageFileFormat::Png => "png",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            ImageFileFormat::Jpg => ImageFormat::Jpeg,
            ImageFileFormat::Png => ImageFormat::Png,
        }
    }
}

impl FromStr for ImageFileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFileFormat::Jpg),
            "png" => Ok(ImageFileFormat::Png),
            other => Err(format!("unsupported image format '{other}' (expected jpg or png)")),
        }
    }
}

/// Decode an image message payload. Returns the image and its header stamp.
pub fn decode_image_message(msg_type: &str, payload: &[u8]) -> BagResult<(DynamicImage, RosTime)> {
    match msg_type {
        IMAGE_TYPE => {
            let msg = Image::parse(payload)?;
            Ok((decode_raw(&msg)?, msg.header.stamp))
        }
        COMPRESSED_IMAGE_TYPE => {
            let msg = CompressedImage::parse(payload)?;
            let img = if msg.format.contains("compressedDepth") {
                decode_compressed_depth(&msg)?
            } else {
                decode_compressed(&msg)?
            };
            Ok((img, msg.header.stamp))
        }
        other => Err(BagError::UnsupportedEncoding(other.to_string())),
    }
}

pub fn decode_raw(msg: &Image) -> BagResult<DynamicImage> {
    let (width, height) = (msg.width, msg.height);
    if width == 0 || height == 0 {
        return Err(BagError::InvalidDimensions { width, height });
    }
    let bytes_per_pixel = match msg.encoding.as_str() {
        "rgb8" | "bgr8" | "8UC3" => 3,
        "rgba8" | "bgra8" => 4,
        "mono8" | "8UC1" => 1,
        "mono16" | "16UC1" => 2,
        other => return Err(BagError::UnsupportedEncoding(other.to_string())),
    };
    let packed = packed_rows(msg, bytes_per_pixel)?;

    let img = match msg.encoding.as_str() {
        "rgb8" => RgbImage::from_raw(width, height, packed).map(DynamicImage::ImageRgb8),
        "bgr8" | "8UC3" => {
            let mut buf = packed;
            for px in buf.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        "rgba8" => RgbaImage::from_raw(width, height, packed).map(DynamicImage::ImageRgba8),
        "bgra8" => {
            let mut buf = packed;
            for px in buf.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        "mono8" | "8UC1" => GrayImage::from_raw(width, height, packed).map(DynamicImage::ImageLuma8),
        _ => {
            let values: Vec<u16> = packed
                .chunks_exact(2)
                .map(|c| {
                    if msg.is_bigendian {
                        u16::from_be_bytes([c[0], c[1]])
                    } else {
                        u16::from_le_bytes([c[0], c[1]])
                    }
                })
                .collect();
            normalize_u16(&values, width, height).map(DynamicImage::ImageLuma8)
        }
    };
    img.ok_or(BagError::InvalidDimensions { width, height })
}

/// Copy rows out of a possibly padded buffer (`step` > `width * bpp`).
fn packed_rows(msg: &Image, bytes_per_pixel: usize) -> BagResult<Vec<u8>> {
    let row = msg.width as usize * bytes_per_pixel;
    let step = (msg.step as usize).max(row);
    let height = msg.height as usize;
    let expected = step * (height - 1) + row;
    if msg.data.len() < expected {
        return Err(BagError::ShortImageData {
            encoding: msg.encoding.clone(),
            width: msg.width,
            height: msg.height,
            expected,
            actual: msg.data.len(),
        });
    }
    if step == row {
        return Ok(msg.data[..row * height].to_vec());
    }
    let mut out = Vec::with_capacity(row * height);
    for y in 0..height {
        out.extend_from_slice(&msg.data[y * step..y * step + row]);
    }
    Ok(out)
}

/// The payload bytes decide the codec; the `format` label is not trusted.
pub fn decode_compressed(msg: &CompressedImage) -> BagResult<DynamicImage> {
    Ok(image::load_from_memory(&msg.data)?)
}

/// compressedDepth: strip the config header, decode the 16-bit PNG, stretch
/// to 8 bits and colourize with a jet map.
pub fn decode_compressed_depth(msg: &CompressedImage) -> BagResult<DynamicImage> {
    let (_depth_fmt, compression) = msg
        .format
        .split_once(';')
        .ok_or_else(|| BagError::CompressedDepth(format!("malformed format '{}'", msg.format)))?;
    let compression = compression.trim().replace(" png", "");
    if compression != "compressedDepth" {
        return Err(BagError::CompressedDepth(format!(
            "compression type is '{compression}', not 'compressedDepth'"
        )));
    }
    if msg.data.len() <= DEPTH_HEADER_SIZE {
        return Err(BagError::CompressedDepth("payload shorter than depth header".into()));
    }

    let raw = image::load_from_memory_with_format(&msg.data[DEPTH_HEADER_SIZE..], ImageFormat::Png)
        .map_err(|e| BagError::CompressedDepth(format!("could not decode depth png: {e}")))?;
    let depth = raw.into_luma16();
    let (width, height) = depth.dimensions();
    let gray = normalize_u16(depth.as_raw(), width, height)
        .ok_or(BagError::InvalidDimensions { width, height })?;

    let mut rgb = RgbImage::new(width, height);
    for (dst, src) in rgb.pixels_mut().zip(gray.pixels()) {
        dst.0 = jet(src.0[0]);
    }
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Min-max stretch to 0..=255.
fn normalize_u16(values: &[u16], width: u32, height: u32) -> Option<GrayImage> {
    let min = values.iter().copied().min().unwrap_or(0) as f32;
    let max = values.iter().copied().max().unwrap_or(0) as f32;
    let range = max - min;
    let buf = values
        .iter()
        .map(|&v| {
            if range <= 0.0 {
                0
            } else {
                ((v as f32 - min) * 255.0 / range).round() as u8
            }
        })
        .collect();
    GrayImage::from_raw(width, height, buf)
}

fn jet(v: u8) -> [u8; 3] {
    let x = v as f32 / 255.0;
    let channel = |offset: f32| ((1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(3.0), channel(2.0), channel(1.0)]
}

pub fn resize(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    img.resize_exact(width, height, FilterType::Lanczos3)
}

pub fn scale(img: &DynamicImage, factor: f64) -> DynamicImage {
    let width = ((img.width() as f64 * factor).round() as u32).max(1);
    let height = ((img.height() as f64 * factor).round() as u32).max(1);
    resize(img, width, height)
}

/// Encode to `path`. JPEG drops alpha and deep channels first.
pub fn save_image(img: &DynamicImage, path: &Path, format: ImageFileFormat) -> BagResult<()> {
    match format {
        ImageFileFormat::Jpg => match img {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => {
                img.save_with_format(path, format.image_format())?
            }
            _ => DynamicImage::ImageRgb8(img.to_rgb8()).save_with_format(path, format.image_format())?,
        },
        ImageFileFormat::Png => img.save_with_format(path, format.image_format())?,
    }
    Ok(())
}

//! `std_msgs/Header`, `sensor_msgs/Image` and `sensor_msgs/CompressedImage`.

use super::reader::{MsgReader, RosTime};
use crate::error::{BagError, BagResult};

pub const IMAGE_TYPE: &str = "sensor_msgs/Image";
pub const COMPRESSED_IMAGE_TYPE: &str = "sensor_msgs/CompressedImage";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub seq: u32,
    pub stamp: RosTime,
    pub frame_id: String,
}

impl Header {
    pub fn read(r: &mut MsgReader<'_>) -> BagResult<Self> {
        Ok(Self {
            seq: r.read_u32("header seq")?,
            stamp: r.read_time("header stamp")?,
            frame_id: r.read_string("header frame_id")?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.seq.to_le_bytes());
        out.extend_from_slice(&self.stamp.sec.to_le_bytes());
        out.extend_from_slice(&self.stamp.nsec.to_le_bytes());
        write_bytes(out, self.frame_id.as_bytes());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    pub is_bigendian: bool,
    pub step: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub fn parse(payload: &[u8]) -> BagResult<Self> {
        tracing::trace!(len = payload.len(), "parsing sensor_msgs/Image");
        let mut r = MsgReader::new(payload);
        let header = Header::read(&mut r)?;
        let height = r.read_u32("height")?;
        let width = r.read_u32("width")?;
        let encoding = r.read_string("encoding")?;
        let is_bigendian = r.read_u8("is_bigendian")? != 0;
        let step = r.read_u32("step")?;
        let data = r.read_bytes("data")?.to_vec();

        if height == 0 || width == 0 {
            return Err(BagError::InvalidDimensions { width, height });
        }

        Ok(Self {
            header,
            height,
            width,
            encoding,
            is_bigendian,
            step,
            data,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 64);
        self.header.write(&mut out);
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        write_bytes(&mut out, self.encoding.as_bytes());
        out.push(self.is_bigendian as u8);
        out.extend_from_slice(&self.step.to_le_bytes());
        write_bytes(&mut out, &self.data);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub header: Header,
    pub format: String,
    pub data: Vec<u8>,
}

impl CompressedImage {
    pub fn parse(payload: &[u8]) -> BagResult<Self> {
        let mut r = MsgReader::new(payload);
        let header = Header::read(&mut r)?;
        let format = r.read_string("format")?;
        let data = r.read_bytes("data")?.to_vec();
        Ok(Self {
            header,
            format,
            data,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 64);
        self.header.write(&mut out);
        write_bytes(&mut out, self.format.as_bytes());
        write_bytes(&mut out, &self.data);
        out
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Message definitions stored in the connection records of bags we write.
pub const HEADER_DEFINITION: &str = "uint32 seq\ntime stamp\nstring frame_id\n";

pub fn image_definition() -> String {
    format!(
        "std_msgs/Header header\nuint32 height\nuint32 width\nstring encoding\nuint8 is_bigendian\nuint32 step\nuint8[] data\n\
         ================================================================================\n\
         MSG: std_msgs/Header\n{HEADER_DEFINITION}"
    )
}

pub fn compressed_image_definition() -> String {
    format!(
        "std_msgs/Header header\nstring format\nuint8[] data\n\
         ================================================================================\n\
         MSG: std_msgs/Header\n{HEADER_DEFINITION}"
    )
}

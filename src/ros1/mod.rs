//! ROS1 message serialization: a byte cursor, the typed image messages and a
//! definition-driven decoder for everything else.

pub mod msgdef;
pub mod reader;
pub mod sensor_msgs;

pub use msgdef::{MsgDefinition, Value};
pub use reader::{MsgReader, RosTime};
pub use sensor_msgs::{COMPRESSED_IMAGE_TYPE, CompressedImage, Header, IMAGE_TYPE, Image};

/// Message types that carry images.
pub fn image_topic_types() -> &'static [&'static str] {
    &[COMPRESSED_IMAGE_TYPE, IMAGE_TYPE]
}

//! Domain errors raised while decoding bag payloads and arguments.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BagError {
    #[error("payload too short for {field} (need {needed} bytes at offset {offset}, have {len})")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("image data holds {actual} bytes but {expected} are required for {width}x{height} {encoding}")]
    ShortImageData {
        encoding: String,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported image encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("compressed depth image: {0}")]
    CompressedDepth(String),

    #[error("{0} is not a valid resize format. Use width,height: e.g. 800,600")]
    InvalidResize(String),

    #[error("message definition for {msg_type}: {reason}")]
    MsgDefinition { msg_type: String, reason: String },

    #[error("unknown message type referenced: {0}")]
    UnknownType(String),

    #[error("image codec: {0}")]
    Codec(#[from] image::ImageError),
}

pub type BagResult<T> = Result<T, BagError>;

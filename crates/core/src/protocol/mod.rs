pub mod channel;
pub mod messages;
pub mod wire;

use thiserror::Error;

use crate::pipeline::detect_frame_use_case::FrameProcessingError;
use crate::shared::frame::FrameError;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("incomplete message: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("message of {0} bytes exceeds the length prefix")]
    Oversized(usize),
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("cannot encode result: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("invalid request: missing frame_data, width, or height")]
    MissingFrameFields,
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
    #[error("frame processing failed: {0}")]
    Processing(#[from] FrameProcessingError),
}

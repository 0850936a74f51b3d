use std::io;
use thiserror::Error;

/// The primary error type for the `powershades-rs` library.
#[derive(Error, Debug)]
pub enum ShadeError {
    #[error("frame too short for header: got {0} bytes, need 8")]
    Malformed(usize),

    #[error("frame truncated: header announces {expected} payload bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("position out of range: {0} (valid 0-100)")]
    InvalidPosition(u8),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out waiting for device reply")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("protocol error: {0}")]
    Protocol(String),
}

// Error handling for the Blackrock reader

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrkError>;

#[derive(Error, Debug)]
pub enum BrkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected {expected:?}, got {got:?}")]
    InvalidMagic { expected: Vec<u8>, got: Vec<u8> },

    #[error("Short read: needed {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("Corrupt file: {0}")]
    CorruptFile(String),

    #[error("Unsupported layout: {0}")]
    UnsupportedLayout(String),

    #[error("Unknown analog unit: {0:?}")]
    UnknownUnit(String),
}

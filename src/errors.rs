use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("CRC validation failed")]
    Crc,
    #[error("command timeout: {0}")]
    Timeout(String),
    #[error("mode conflict: {0}")]
    ModeConflict(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;

use std::fmt;

#[derive(Debug)]
pub enum LoopError {
    Decode(String),
    Connection(String),
    InvalidIndex(usize),
    Audio(String),
    Config(String),
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoopError::Decode(msg) => write!(f, "Decode error: {}", msg),
            LoopError::Connection(msg) => write!(f, "Connection error: {}", msg),
            LoopError::InvalidIndex(index) => write!(f, "No track at index {}", index),
            LoopError::Audio(msg) => write!(f, "Audio error: {}", msg),
            LoopError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for LoopError {}

pub type Result<T> = std::result::Result<T, LoopError>;

// Conversion helpers
impl From<std::io::Error> for LoopError {
    fn from(err: std::io::Error) -> Self {
        LoopError::Connection(err.to_string())
    }
}

impl From<anyhow::Error> for LoopError {
    fn from(err: anyhow::Error) -> Self {
        LoopError::Audio(err.to_string())
    }
}

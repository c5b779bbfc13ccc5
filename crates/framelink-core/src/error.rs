use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Codec errors
    #[error("Body underflow: requested {requested} bytes, {available} available")]
    BodyUnderflow { requested: usize, available: usize },

    #[error("Frame body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },

    #[error("Unknown message id: {0}")]
    UnknownMessageId(u32),

    // Handshake errors
    #[error("Handshake rejected: expected {expected:#018x}, got {actual:#018x}")]
    HandshakeRejected { expected: u64, actual: u64 },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

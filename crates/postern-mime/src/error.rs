//! Error types for MIME operations.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading a message from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The header block could not be parsed.
    #[error("Invalid header block: {0}")]
    Header(String),

    /// Multipart framing is broken (missing boundary parameter or delimiters).
    #[error("Malformed multipart framing: {0}")]
    Framing(String),

    /// A message without parts cannot be serialized.
    #[error("Message without content")]
    EmptyMessage,

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid transfer or header encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Invalid address or address list.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message decoding or encoding failed.
    #[error("MIME error: {0}")]
    Mime(#[from] postern_mime::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file is not valid TOML for the expected layout.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Unknown maildir flag letter.
    #[error("Invalid maildir flag: {0:?}")]
    InvalidFlag(char),

    /// A maildir file name that does not follow the naming scheme.
    #[error("Invalid maildir filename: {0}")]
    InvalidFilename(String),

    /// No file in the maildir carries the key.
    #[error("Unknown maildir key: {0}")]
    UnknownKey(String),

    /// More than one file in the maildir carries the key.
    #[error("Duplicate maildir key: {0}")]
    DuplicateKey(String),

    /// The mail index rejected an operation.
    #[error("Index error: {0}")]
    Index(String),

    /// The edited message text is malformed.
    #[error("Invalid edit: {0}")]
    EditFormat(String),

    /// An external command failed.
    #[error("Command failed: {0}")]
    Command(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A sample log line could not be decoded
    #[error("Invalid sample at line {line}: {message}")]
    InvalidSample { line: usize, message: String },

    /// A sample names a stream missing from the configuration
    #[error("Unknown stream '{name}' at line {line}")]
    UnknownStream { line: usize, name: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_sample(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidSample {
            line,
            message: message.into(),
        }
    }

    pub fn unknown_stream(line: usize, name: impl Into<String>) -> Self {
        Self::UnknownStream {
            line,
            name: name.into(),
        }
    }
}

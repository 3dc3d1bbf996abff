//! Layered error definitions
//!
//! Categorized by source: aligner (slot table / snapshot) / config / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum AlignerError {
    // ===== Aligner Errors =====
    /// Slot out of range or currently unregistered
    #[error("invalid stream index: {index}")]
    InvalidIndex { index: usize },

    /// Fixed slot table has no free slot
    #[error("stream table full: capacity={capacity}")]
    CapacityExceeded { capacity: usize },

    /// Snapshot source and target are laid out differently
    #[error("stream setup mismatch: {message}")]
    StructuralMismatch { message: String },

    /// Element type does not match the type the stream was registered with
    #[error("stream {index} does not carry elements of type {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
    },

    // ===== Configuration Errors =====
    /// Configuration validation error
    #[error("invalid config at '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlignerError {
    /// Create invalid index error
    pub fn invalid_index(index: usize) -> Self {
        Self::InvalidIndex { index }
    }

    /// Create structural mismatch error
    pub fn structural_mismatch(message: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            message: message.into(),
        }
    }

    /// Create type mismatch error for element type `T`
    pub fn type_mismatch<T>(index: usize) -> Self {
        Self::TypeMismatch {
            index,
            expected: std::any::type_name::<T>(),
        }
    }

    /// Create configuration validation error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AlignerError::invalid_index(3).to_string(),
            "invalid stream index: 3"
        );
        assert_eq!(
            AlignerError::CapacityExceeded { capacity: 4 }.to_string(),
            "stream table full: capacity=4"
        );
        let err = AlignerError::type_mismatch::<u32>(1);
        assert!(err.to_string().contains("u32"));
    }
}

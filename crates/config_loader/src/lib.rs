//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce an `AlignerSetup` (aligner parameters + streams in slot order)
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let setup = ConfigLoader::load_from_path(Path::new("aligner.toml")).unwrap();
//! println!("Streams: {}", setup.streams.len());
//! ```

mod parser;
mod validator;

pub use contracts::AlignerSetup;
pub use parser::ConfigFormat;

use contracts::AlignerError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<AlignerSetup, AlignerError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<AlignerSetup, AlignerError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already constructed setup
    pub fn validate(setup: &AlignerSetup) -> Result<(), AlignerError> {
        validator::validate(setup)
    }

    /// Serialize AlignerSetup to TOML string
    pub fn to_toml(setup: &AlignerSetup) -> Result<String, AlignerError> {
        toml::to_string_pretty(setup)
            .map_err(|e| AlignerError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize AlignerSetup to JSON string
    pub fn to_json(setup: &AlignerSetup) -> Result<String, AlignerError> {
        serde_json::to_string_pretty(setup)
            .map_err(|e| AlignerError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, AlignerError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            AlignerError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            AlignerError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, AlignerError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<AlignerSetup, AlignerError> {
        let setup = parser::parse(content, format)?;
        validator::validate(&setup)?;
        Ok(setup)
    }
}

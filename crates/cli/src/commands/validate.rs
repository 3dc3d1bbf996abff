//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::AlignerSetup;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    name: String,
    timeout_s: f64,
    max_streams: usize,
    stream_count: usize,
    streams: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(setup) => {
            let warnings = collect_warnings(&setup);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    name: setup.aligner.name.clone(),
                    timeout_s: setup.aligner.timeout_s,
                    max_streams: setup.aligner.max_streams,
                    stream_count: setup.streams.len(),
                    streams: setup.streams.iter().map(|s| s.name.clone()).collect(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(setup: &AlignerSetup) -> Vec<String> {
    let mut warnings = Vec::new();

    if setup.streams.is_empty() {
        warnings.push("No streams configured - nothing will be aligned".to_string());
    }

    // A buffer shorter than one timeout of samples overwrites data while waiting
    for stream in &setup.streams {
        if stream.period_s > 0.0 {
            let needed = (setup.aligner.timeout_s / stream.period_s).ceil() as usize;
            if stream.buffer_size < needed {
                warnings.push(format!(
                    "Stream '{}' buffer_size {} holds less than one timeout of samples ({} needed)",
                    stream.name, stream.buffer_size, needed
                ));
            }
        }
    }

    if setup.aligner.timeout_s == 0.0 {
        warnings.push(
            "aligner.timeout_s is 0 - samples are emitted without waiting for other streams"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            if !summary.name.is_empty() {
                println!("\n  Aligner: {}", summary.name);
            }
            println!("  Timeout: {}s", summary.timeout_s);
            println!("  Max streams: {}", summary.max_streams);
            println!(
                "  Streams: {} [{}]",
                summary.stream_count,
                summary.streams.join(", ")
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_validate_valid_config() {
        let file = write_config(
            r#"
            [aligner]
            name = "fusion"
            timeout_s = 1.0

            [[streams]]
            name = "imu"
            period_s = 0.1
            buffer_size = 4
            "#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };

        let result = validate_config(&args);
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.name, "fusion");
        assert_eq!(summary.streams, vec!["imu"]);

        // 1.0 / 0.1 = 10 samples needed, 4 configured
        let warnings = result.warnings.unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("imu"));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let file = write_config(
            r#"
            [[streams]]
            name = "imu"
            period_s = 0.1

            [[streams]]
            name = "imu"
            period_s = 0.2
            "#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_validate_missing_file() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/aligner.toml"),
            json: false,
        };

        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_warnings_for_empty_setup() {
        let warnings = collect_warnings(&AlignerSetup::default());
        assert!(warnings.iter().any(|w| w.contains("No streams")));
    }
}

//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stream Aligner - time-ordered merging of recorded sample streams
#[derive(Parser, Debug)]
#[command(
    name = "stream-aligner",
    author,
    version,
    about = "Replay recorded sample streams through a stream aligner",
    long_about = "Merges several timestamped sample streams into one globally ordered stream.\n\n\
                  Streams are declared in a configuration file, samples are read from a \n\
                  JSON-lines log and emitted in timestamp order on stdout."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STREAM_ALIGNER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "STREAM_ALIGNER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Prometheus metrics port (disabled when not set)
    #[arg(long, global = true, env = "STREAM_ALIGNER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines sample log through the configured aligner
    Replay(ReplayArgs),

    /// Validate configuration file without replaying
    Validate(ValidateArgs),
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "aligner.toml",
        env = "STREAM_ALIGNER_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines sample log ("-" reads stdin)
    #[arg(short, long, default_value = "-", env = "STREAM_ALIGNER_SAMPLES")]
    pub samples: PathBuf,

    /// At end of input, disable all streams and drain what is buffered
    #[arg(long)]
    pub flush: bool,

    /// Print emitted samples as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Override the aligner timeout from configuration (seconds)
    #[arg(long, env = "STREAM_ALIGNER_TIMEOUT")]
    pub timeout: Option<f64>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "aligner.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replay() {
        let cli = Cli::try_parse_from([
            "stream-aligner",
            "-v",
            "replay",
            "--config",
            "fusion.toml",
            "--samples",
            "log.jsonl",
            "--flush",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.config, PathBuf::from("fusion.toml"));
                assert_eq!(args.samples, PathBuf::from("log.jsonl"));
                assert!(args.flush);
                assert!(!args.json);
                assert_eq!(args.timeout, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["stream-aligner", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_format_mapping() {
        assert_eq!(
            observability::LogFormat::from(LogFormat::Json),
            observability::LogFormat::Json
        );
    }
}

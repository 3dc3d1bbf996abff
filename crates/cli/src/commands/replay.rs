//! `replay` command implementation.
//!
//! Reads a JSON-lines sample log, pushes every sample into an aligner built
//! from the configuration and writes the emitted samples in aligned order.
//! Timeouts are measured in the log's own timestamps, so a replay reproduces
//! the live alignment exactly.

use std::io::Write;
use std::sync::mpsc::{self, Receiver};

use anyhow::{Context, Result};
use contracts::{AlignerSetup, AlignerStatus, IdentityEstimator, Timestamp, TimestampEstimator};
use observability::{AlignmentMetricsAggregator, MetricsSummary};
use serde::Deserialize;
use stream_aligner::StreamAligner;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::ReplayArgs;
use crate::error::CliError;

/// One line of the sample log
#[derive(Debug, Deserialize)]
struct SampleRecord {
    stream: String,
    t: f64,
    #[serde(default)]
    index: Option<i64>,
    #[serde(default)]
    value: serde_json::Value,
}

/// A sample handed out by the aligner
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedSample {
    pub stream: String,
    pub ts: Timestamp,
    pub value: serde_json::Value,
}

/// How emitted samples are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `<seconds>\t<stream>\t<value>`
    Text,
    /// `{"stream": .., "t": .., "value": ..}`
    Json,
}

/// Result of a finished replay
#[derive(Debug)]
pub struct ReplayOutcome {
    pub samples_read: u64,
    pub status: AlignerStatus,
    pub summary: MetricsSummary,
    pub lost_samples: u64,
}

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut setup = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load configuration: {}", args.config.display()))?;

    if let Some(timeout) = args.timeout {
        setup.aligner.timeout_s = timeout;
        config_loader::ConfigLoader::validate(&setup).context("Invalid --timeout override")?;
    }

    info!(
        config = %args.config.display(),
        samples = %args.samples.display(),
        streams = setup.streams.len(),
        timeout_s = setup.aligner.timeout_s,
        "Starting replay"
    );

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let outcome = if args.samples.as_os_str() == "-" {
        replay(&setup, BufReader::new(tokio::io::stdin()), args.flush, format, &mut out).await?
    } else {
        let file = tokio::fs::File::open(&args.samples)
            .await
            .map_err(CliError::from)
            .with_context(|| format!("Failed to open sample log: {}", args.samples.display()))?;
        replay(&setup, BufReader::new(file), args.flush, format, &mut out).await?
    };
    out.flush().context("Failed to flush output")?;

    eprintln!("{}", outcome.status);
    eprintln!("{}", outcome.summary);
    if outcome.lost_samples > 0 {
        eprintln!("Lost samples (index gaps): {}", outcome.lost_samples);
    }

    info!(
        samples_read = outcome.samples_read,
        emitted = outcome.summary.total_emitted,
        "Replay finished"
    );

    Ok(())
}

/// Replay every sample from `reader` through an aligner built from `setup`
pub async fn replay<R, W>(
    setup: &AlignerSetup,
    reader: R,
    flush: bool,
    format: OutputFormat,
    out: &mut W,
) -> Result<ReplayOutcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (tx, rx) = mpsc::channel();
    let mut aligner = StreamAligner::new(setup.aligner.clone());
    let mut estimators = Vec::with_capacity(setup.streams.len());

    for config in &setup.streams {
        let name = config.name.clone();
        let tx = tx.clone();
        aligner.register_stream(config.clone(), move |ts, value: &serde_json::Value| {
            // receiver outlives the aligner
            let _ = tx.send(EmittedSample {
                stream: name.clone(),
                ts,
                value: value.clone(),
            });
        })?;
        estimators.push(IdentityEstimator::new(config.period()));
    }
    drop(tx);

    let mut aggregator = AlignmentMetricsAggregator::new();
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut samples_read = 0u64;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(CliError::from)
        .context("Failed to read sample log")?
    {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: SampleRecord = serde_json::from_str(line)
            .map_err(|e| CliError::invalid_sample(line_no, e.to_string()))?;
        if !record.t.is_finite() {
            return Err(CliError::invalid_sample(line_no, "timestamp is not finite").into());
        }
        let idx = setup
            .stream_index(&record.stream)
            .ok_or_else(|| CliError::unknown_stream(line_no, &record.stream))?;

        let ts = estimators[idx].estimate(Timestamp::from_seconds(record.t), record.index);
        aligner.push(idx, ts, record.value)?;
        samples_read += 1;

        drain(&mut aligner, &rx, &mut aggregator, format, out)?;
    }

    if flush {
        debug!(streams = setup.streams.len(), "Flushing remaining samples");
        for idx in 0..setup.streams.len() {
            aligner.disable_stream(idx)?;
        }
        drain(&mut aligner, &rx, &mut aggregator, format, out)?;
    }

    let status = aligner.status();
    observability::record_aligner_status(&status);

    let buffered: usize = status.streams.iter().map(|s| s.buffer_fill).sum();
    if buffered > 0 {
        warn!(buffered, "Samples left in buffers at end of input (use --flush)");
    }

    Ok(ReplayOutcome {
        samples_read,
        status,
        summary: aggregator.summary(),
        lost_samples: estimators.iter().map(IdentityEstimator::lost_samples).sum(),
    })
}

/// Step the aligner until it defers, writing everything it emits
fn drain<W: Write>(
    aligner: &mut StreamAligner,
    rx: &Receiver<EmittedSample>,
    aggregator: &mut AlignmentMetricsAggregator,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    while aligner.step() {
        let latest = aligner.latest_time().unwrap_or_default();
        for sample in rx.try_iter() {
            let latency = latest - sample.ts;
            aggregator.record_emitted(&sample.stream, latency);
            observability::record_sample_latency(&sample.stream, latency);
            write_sample(out, &sample, format)?;
        }
    }
    Ok(())
}

fn write_sample<W: Write>(out: &mut W, sample: &EmittedSample, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(
            out,
            "{:.6}\t{}\t{}",
            sample.ts.as_seconds(),
            sample.stream,
            sample.value
        )?,
        OutputFormat::Json => {
            let line = serde_json::json!({
                "stream": sample.stream,
                "t": sample.ts.as_seconds(),
                "value": sample.value,
            });
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

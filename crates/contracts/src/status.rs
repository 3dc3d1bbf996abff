//! Aligner status model
//!
//! Per-stream counters and an aggregate snapshot, used both for diagnostics
//! and by the aligner itself (drop accounting, data-time window).

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Status of a single stream in an aligner
///
/// Intended relationship between the counters:
///
/// ```text
/// samples_received == samples_processed
///                   + samples_dropped_buffer_full
///                   + samples_dropped_late_arriving
/// ```
///
/// `samples_backward_in_time` is counted on its own and is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    /// Fixed capacity of the stream buffer
    pub buffer_size: usize,
    /// Samples currently waiting in the buffer
    pub buffer_fill: usize,
    /// Samples ever handed to the aligner for this stream
    pub samples_received: u64,
    /// Samples ever delivered to the stream callback
    pub samples_processed: u64,
    /// Samples evicted because the buffer was full
    pub samples_dropped_buffer_full: u64,
    /// Samples older than the aligner's current time on arrival
    pub samples_dropped_late_arriving: u64,
    /// Samples older than the previous sample of the same stream
    pub samples_backward_in_time: u64,
    /// Newest buffered sample, `None` if the buffer is empty
    pub latest_data_time: Option<Timestamp>,
    /// Oldest buffered sample, `None` if the buffer is empty
    pub earliest_data_time: Option<Timestamp>,
    /// Last sample received, whether it was kept or dropped
    pub latest_sample_time: Option<Timestamp>,
    /// Whether the stream takes part in the timeout decision
    pub active: bool,
    /// Diagnostic name
    pub name: String,
    /// Tie-break rank, lower goes first
    pub priority: i32,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self {
            buffer_size: 0,
            buffer_fill: 0,
            samples_received: 0,
            samples_processed: 0,
            samples_dropped_buffer_full: 0,
            samples_dropped_late_arriving: 0,
            samples_backward_in_time: 0,
            latest_data_time: None,
            earliest_data_time: None,
            latest_sample_time: None,
            active: true,
            name: String::new(),
            priority: 0,
        }
    }
}

impl StreamStatus {
    /// Total samples accounted for by the received-identity
    pub fn samples_accounted(&self) -> u64 {
        self.samples_processed + self.samples_dropped_buffer_full + self.samples_dropped_late_arriving
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [prio {}] fill {}/{} received {} processed {} dropped(full {}, late {}) backward {}",
            self.name,
            self.priority,
            self.buffer_fill,
            self.buffer_size,
            self.samples_received,
            self.samples_processed,
            self.samples_dropped_buffer_full,
            self.samples_dropped_late_arriving,
            self.samples_backward_in_time
        )
    }
}

/// Point-in-time snapshot of a whole aligner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignerStatus {
    /// Wall-clock time the snapshot was generated
    pub time: SystemTime,
    /// Aligner name
    pub name: String,
    /// Time of the last sample handed to a callback
    pub current_time: Option<Timestamp>,
    /// Time of the newest sample that entered the aligner
    pub latest_time: Option<Timestamp>,
    /// Samples rejected for being older than `current_time`, all streams
    pub samples_dropped_late_arriving: u64,
    /// One entry per slot; unregistered slots are reported inactive
    pub streams: Vec<StreamStatus>,
}

impl AlignerStatus {
    /// `latest_time - current_time`, null times read as zero
    pub fn latency(&self) -> Timestamp {
        self.latest_time.unwrap_or_default() - self.current_time.unwrap_or_default()
    }

    /// Iterate over active streams with their slot index
    pub fn active_streams(&self) -> impl Iterator<Item = (usize, &StreamStatus)> {
        self.streams.iter().enumerate().filter(|(_, s)| s.active)
    }
}

struct OptTime(Option<Timestamp>);

impl fmt::Display for OptTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{t}"),
            None => write!(f, "-"),
        }
    }
}

impl fmt::Display for AlignerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "aligner '{}': current {} latest {} dropped late {} latency {}",
            self.name,
            OptTime(self.current_time),
            OptTime(self.latest_time),
            self.samples_dropped_late_arriving,
            self.latency()
        )?;

        if self.streams.is_empty() {
            return Ok(());
        }

        writeln!(
            f,
            "idx\tname\t\tbsize\tbfill\treceived\tprocessed\tdr_bfull\tdr_late\tbackward"
        )?;
        for (idx, s) in self.active_streams() {
            writeln!(
                f,
                "{idx}\t{}\t\t{}\t{}\t{}\t\t{}\t\t{}\t\t{}\t{}",
                s.name,
                s.buffer_size,
                s.buffer_fill,
                s.samples_received,
                s.samples_processed,
                s.samples_dropped_buffer_full,
                s.samples_dropped_late_arriving,
                s.samples_backward_in_time
            )?;
        }

        writeln!(
            f,
            "idx\tname\t\tlatest sample\tearliest data\tlatest data\tlatency"
        )?;
        let current = self.current_time.unwrap_or_default();
        for (idx, s) in self.active_streams() {
            writeln!(
                f,
                "{idx}\t{}\t\t{}\t{}\t{}\t{}",
                s.name,
                OptTime(s.latest_sample_time),
                OptTime(s.earliest_data_time),
                OptTime(s.latest_data_time),
                OptTime(s.latest_sample_time.map(|t| t - current))
            )?;
        }

        Ok(())
    }
}

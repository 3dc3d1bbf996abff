//! Aligner configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::Timestamp;

/// Complete aligner setup: the engine plus the streams to register, in slot order
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AlignerSetup {
    /// Engine configuration
    #[serde(default)]
    #[validate(nested)]
    pub aligner: AlignerConfig,

    /// Streams, registered in this order (slot i = streams[i])
    #[serde(default)]
    #[validate(nested)]
    pub streams: Vec<StreamConfig>,
}

impl AlignerSetup {
    /// Look up a stream's slot by name
    pub fn stream_index(&self, name: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.name == name)
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AlignerConfig {
    /// Name reported in the status snapshot
    #[serde(default)]
    pub name: String,

    /// Longest wait (in data time) for a possibly missing earlier sample
    #[serde(default = "default_timeout_s")]
    #[validate(range(min = 0.0))]
    pub timeout_s: f64,

    /// Fixed size of the stream slot table
    #[serde(default = "default_max_streams")]
    #[validate(range(min = 1))]
    pub max_streams: usize,
}

fn default_timeout_s() -> f64 {
    1.0
}

fn default_max_streams() -> usize {
    10
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            timeout_s: default_timeout_s(),
            max_streams: default_max_streams(),
        }
    }
}

impl AlignerConfig {
    /// Timeout in the timestamp domain
    pub fn timeout(&self) -> Timestamp {
        Timestamp::from_seconds(self.timeout_s)
    }
}

/// Per-stream registration parameters, fixed for the life of the stream
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamConfig {
    /// Diagnostic name
    #[serde(default)]
    pub name: String,

    /// Nominal sample period in seconds.
    /// `0` = aperiodic, negative = no look-ahead
    #[serde(default)]
    pub period_s: f64,

    /// Tie-break rank for equal timestamps, lower goes first
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Fixed buffer capacity; should hold at least one timeout worth of samples
    #[serde(default = "default_buffer_size")]
    #[validate(range(min = 1))]
    pub buffer_size: usize,
}

fn default_priority() -> i32 {
    -1
}

fn default_buffer_size() -> usize {
    32
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            period_s: 0.0,
            priority: default_priority(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl StreamConfig {
    /// Create a config with the given name and period, defaults elsewhere
    pub fn new(name: impl Into<String>, period: Timestamp) -> Self {
        Self {
            name: name.into(),
            period_s: period.as_seconds(),
            ..Default::default()
        }
    }

    /// Builder-style priority setter
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder-style buffer size setter
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Period in the timestamp domain
    pub fn period(&self) -> Timestamp {
        Timestamp::from_seconds(self.period_s)
    }
}

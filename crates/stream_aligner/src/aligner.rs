//! Alignment engine
//!
//! Merges independently timed streams into one globally time-ordered
//! sequence. Every `step()` releases at most one sample: the stream ranked
//! first by (next timestamp, has-data, priority) is emitted, unless an earlier
//! ranked active stream without data may still deliver something older, in
//! which case the engine waits until the data time window reaches `timeout`.

use std::cmp::Reverse;
use std::fmt;
use std::time::SystemTime;

use contracts::{
    AlignerConfig, AlignerError, AlignerStatus, StreamConfig, StreamStatus, Timestamp,
};
use tracing::instrument;

use crate::stream::{Stream, StreamBase};

type Slot = Option<Box<dyn StreamBase>>;

/// Timestamp-ordered merge of heterogeneous streams
///
/// Slot indices returned by [`StreamAligner::register_stream`] stay valid until
/// the stream is unregistered; a freed slot is handed out again by the next
/// registration (lowest free slot first).
///
/// Not internally synchronised: wrap it in a mutex to share between threads.
pub struct StreamAligner {
    name: String,
    streams: Vec<Slot>,
    /// Status record per slot, kept for slots whose stream is gone
    retired: Vec<StreamStatus>,
    capacity: usize,
    timeout: Timestamp,
    /// Newest timestamp that entered any stream
    latest_ts: Option<Timestamp>,
    /// Timestamp of the last emitted sample
    current_ts: Option<Timestamp>,
    samples_dropped_late_arriving: u64,
}

impl fmt::Debug for StreamAligner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAligner")
            .field("name", &self.name)
            .field("streams", &self.streams.iter().map(Option::is_some).collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .field("timeout", &self.timeout)
            .field("latest_ts", &self.latest_ts)
            .field("current_ts", &self.current_ts)
            .finish()
    }
}

impl Default for StreamAligner {
    fn default() -> Self {
        Self::new(AlignerConfig::default())
    }
}

/// Ranking key of a slot during `step()`; holes sort last
type RankKey = (bool, Timestamp, Reverse<bool>, i32);

impl StreamAligner {
    /// Create an aligner from its configuration
    ///
    /// The configuration is taken as given; validate it beforehand (see
    /// `config_loader`) if it comes from user input.
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            name: config.name.clone(),
            streams: Vec::new(),
            retired: Vec::new(),
            capacity: config.max_streams,
            timeout: config.timeout(),
            latest_ts: None,
            current_ts: None,
            samples_dropped_late_arriving: 0,
        }
    }

    /// Default-configured aligner with the given timeout
    pub fn with_timeout(timeout: Timestamp) -> Self {
        let mut aligner = Self::default();
        aligner.set_timeout(timeout);
        aligner
    }

    /// Register a stream carrying samples of type `T`
    ///
    /// Returns the slot index used to push samples for this stream.
    ///
    /// # Errors
    /// `InvalidConfig` for an invalid configuration, `CapacityExceeded` when
    /// every slot is taken.
    #[instrument(
        level = "debug",
        name = "stream_aligner_register",
        skip(self, config, callback),
        fields(stream = %config.name, period = %config.period(), priority = config.priority)
    )]
    pub fn register_stream<T, F>(
        &mut self,
        config: StreamConfig,
        callback: F,
    ) -> Result<usize, AlignerError>
    where
        T: Clone + Send + 'static,
        F: FnMut(Timestamp, &T) + Send + 'static,
    {
        let stream = Stream::<T>::new(&config, Some(Box::new(callback)))?;
        let idx = self.insert_stream(Box::new(stream))?;
        tracing::debug!(idx, "stream registered");
        Ok(idx)
    }

    /// Register a stream whose samples are only consumed through `next_sample`
    /// and status, without a callback
    #[instrument(
        level = "debug",
        name = "stream_aligner_register_silent",
        skip(self, config),
        fields(stream = %config.name, period = %config.period(), priority = config.priority)
    )]
    pub fn register_silent_stream<T>(&mut self, config: StreamConfig) -> Result<usize, AlignerError>
    where
        T: Clone + Send + 'static,
    {
        let stream = Stream::<T>::new(&config, None)?;
        let idx = self.insert_stream(Box::new(stream))?;
        tracing::debug!(idx, "silent stream registered");
        Ok(idx)
    }

    fn insert_stream(&mut self, stream: Box<dyn StreamBase>) -> Result<usize, AlignerError> {
        let status = stream.buffer_status();
        if let Some(idx) = self.streams.iter().position(Option::is_none) {
            self.streams[idx] = Some(stream);
            self.retired[idx] = status;
            return Ok(idx);
        }
        if self.streams.len() >= self.capacity {
            return Err(AlignerError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.streams.push(Some(stream));
        self.retired.push(status);
        Ok(self.streams.len() - 1)
    }

    /// Remove a stream, freeing its slot
    ///
    /// Buffered samples are discarded without reaching the callback. The
    /// slot's last status is kept, marked inactive.
    #[instrument(level = "debug", name = "stream_aligner_unregister", skip(self))]
    pub fn unregister_stream(&mut self, idx: usize) -> Result<(), AlignerError> {
        let stream = self
            .streams
            .get_mut(idx)
            .and_then(Option::take)
            .ok_or_else(|| AlignerError::invalid_index(idx))?;

        let mut status = stream.buffer_status();
        status.active = false;
        tracing::debug!(stream = %status.name, dropped = status.buffer_fill, "stream unregistered");
        self.retired[idx] = status;
        Ok(())
    }

    /// Let the stream hold back later samples again while it has no data
    pub fn enable_stream(&mut self, idx: usize) -> Result<(), AlignerError> {
        self.slot_mut(idx)?.set_active(true);
        Ok(())
    }

    /// Stop waiting for this stream; buffered data still drains
    ///
    /// The next `push` to the stream enables it again.
    pub fn disable_stream(&mut self, idx: usize) -> Result<(), AlignerError> {
        self.slot_mut(idx)?.set_active(false);
        Ok(())
    }

    pub fn is_stream_active(&self, idx: usize) -> Result<bool, AlignerError> {
        Ok(self.slot(idx)?.is_active())
    }

    /// Hand a sample to stream `idx`
    ///
    /// Samples older than the last emitted sample are dropped and counted
    /// as late; that is not an error.
    ///
    /// # Errors
    /// `InvalidIndex` for a free or out-of-range slot, `TypeMismatch` when
    /// the stream was registered with another element type.
    #[instrument(
        level = "trace",
        name = "stream_aligner_push",
        skip(self, ts, value),
        fields(ts = %ts)
    )]
    pub fn push<T>(&mut self, idx: usize, ts: Timestamp, value: T) -> Result<(), AlignerError>
    where
        T: Clone + Send + 'static,
    {
        let current = self.current_ts;
        let stream = Self::typed_mut::<T>(&mut self.streams, idx)?;

        stream.record_received(ts);
        stream.set_active(true);
        metrics::counter!(
            "stream_aligner_samples_received_total",
            "stream" => stream.name().to_string()
        )
        .increment(1);

        if let Some(current) = current.filter(|current| ts < *current) {
            stream.record_late();
            tracing::debug!(
                stream = %stream.name(),
                current = %current,
                "sample older than current time, dropped"
            );
            metrics::counter!(
                "stream_aligner_samples_dropped_total",
                "stream" => stream.name().to_string(),
                "reason" => "late"
            )
            .increment(1);
            self.samples_dropped_late_arriving += 1;
            return Ok(());
        }

        self.latest_ts = Some(self.latest_ts.map_or(ts, |latest| latest.max(ts)));
        stream.push(ts, value);
        Ok(())
    }

    /// Emit at most one sample
    ///
    /// Returns `true` when a sample went to its callback; call again until
    /// it returns `false`, then wait for more input.
    ///
    /// A free slot reached during the ranked scan ends the step. Free slots
    /// rank behind every registered stream, so this only happens once all
    /// registered streams were passed over.
    #[instrument(level = "trace", name = "stream_aligner_step", skip(self))]
    pub fn step(&mut self) -> bool {
        if self.streams.is_empty() {
            return false;
        }

        let mut ranked: Vec<usize> = (0..self.streams.len()).collect();
        ranked.sort_by_cached_key(|&slot| Self::rank_key(self.streams[slot].as_deref()));

        for slot in ranked {
            let Some(stream) = self.streams[slot].as_deref() else {
                return false;
            };

            if stream.has_data() {
                self.emit(slot);
                return true;
            }

            if stream.is_active() {
                let (first, latest) = self.data_window();
                if latest - first < self.timeout {
                    return false;
                }
                tracing::trace!(
                    stream = %stream.name(),
                    expected = %stream.latest_timestamp(),
                    "stream timed out, skipped"
                );
            }
        }

        false
    }

    fn rank_key(stream: Option<&dyn StreamBase>) -> RankKey {
        match stream {
            Some(s) => (false, s.latest_timestamp(), Reverse(s.has_data()), s.priority()),
            None => (true, Timestamp::ZERO, Reverse(false), 0),
        }
    }

    fn emit(&mut self, slot: usize) {
        let Some(stream) = self.streams[slot].as_deref_mut() else {
            return;
        };
        let ts = stream.pop();
        self.current_ts = Some(ts);
        metrics::counter!(
            "stream_aligner_samples_emitted_total",
            "stream" => stream.name().to_string()
        )
        .increment(1);
    }

    /// `[first, latest]` data time span the timeout is measured against
    fn data_window(&self) -> (Timestamp, Timestamp) {
        if let Some(current) = self.current_ts {
            return (current, self.latest_ts.unwrap_or_default());
        }

        // Nothing emitted yet: span of the data currently buffered
        let mut first: Option<Timestamp> = None;
        let mut latest = Timestamp::ZERO;
        for stream in self.streams.iter().flatten().filter(|s| s.has_data()) {
            if let Some(t) = stream.latest_data_time() {
                latest = latest.max(t);
            }
            if let Some(t) = stream.earliest_data_time() {
                first = Some(first.map_or(t, |f| f.min(t)));
            }
        }
        (first.unwrap_or_default(), latest)
    }

    /// Drop all buffered data and restart the timeline
    ///
    /// Streams stay registered with their configuration.
    #[instrument(level = "debug", name = "stream_aligner_clear", skip(self))]
    pub fn clear(&mut self) {
        for stream in self.streams.iter_mut().flatten() {
            stream.clear();
        }
        self.latest_ts = None;
        self.current_ts = None;
        self.samples_dropped_late_arriving = 0;
    }

    /// Take over the complete state of `other`
    ///
    /// Both aligners must have the same slot occupancy, and each occupied
    /// slot must carry the same element type and buffer capacity. Nothing is
    /// changed if they do not.
    #[instrument(level = "debug", name = "stream_aligner_copy_state", skip(self, other))]
    pub fn copy_state(&mut self, other: &StreamAligner) -> Result<(), AlignerError> {
        if self.streams.len() != other.streams.len() {
            return Err(AlignerError::structural_mismatch(format!(
                "stream setup differs: {} slots vs {} slots",
                self.streams.len(),
                other.streams.len()
            )));
        }
        for (idx, (mine, theirs)) in self.streams.iter().zip(&other.streams).enumerate() {
            let compatible = match (mine, theirs) {
                (Some(mine), Some(theirs)) => mine.same_layout(&**theirs),
                (None, None) => true,
                _ => false,
            };
            if !compatible {
                return Err(AlignerError::structural_mismatch(format!(
                    "stream setup differs at slot {idx}"
                )));
            }
        }

        self.latest_ts = other.latest_ts;
        self.current_ts = other.current_ts;
        self.samples_dropped_late_arriving = other.samples_dropped_late_arriving;
        for (mine, theirs) in self.streams.iter_mut().zip(&other.streams) {
            if let (Some(mine), Some(theirs)) = (mine, theirs) {
                mine.copy_state_from(&**theirs)?;
            }
        }
        self.retired.clone_from(&other.retired);
        Ok(())
    }

    /// Snapshot of the aligner and every slot
    pub fn status(&self) -> AlignerStatus {
        AlignerStatus {
            time: SystemTime::now(),
            name: self.name.clone(),
            current_time: self.current_ts,
            latest_time: self.latest_ts,
            samples_dropped_late_arriving: self.samples_dropped_late_arriving,
            streams: self
                .streams
                .iter()
                .zip(&self.retired)
                .map(|(slot, retired)| match slot {
                    Some(stream) => stream.buffer_status(),
                    None => retired.clone(),
                })
                .collect(),
        }
    }

    /// Status of a single registered stream
    pub fn stream_status(&self, idx: usize) -> Result<StreamStatus, AlignerError> {
        Ok(self.slot(idx)?.buffer_status())
    }

    /// Peek at the next sample stream `idx` would emit
    pub fn next_sample<T: Clone + 'static>(
        &self,
        idx: usize,
    ) -> Result<Option<(Timestamp, T)>, AlignerError> {
        let stream = self
            .slot(idx)?
            .as_any()
            .downcast_ref::<Stream<T>>()
            .ok_or_else(|| AlignerError::type_mismatch::<T>(idx))?;
        Ok(stream.next_sample().cloned())
    }

    /// `latest_time - current_time`, unset times read as zero
    pub fn latency(&self) -> Timestamp {
        self.latest_ts.unwrap_or_default() - self.current_ts.unwrap_or_default()
    }

    /// Timestamp of the last emitted sample
    #[inline]
    pub fn current_time(&self) -> Option<Timestamp> {
        self.current_ts
    }

    /// Newest timestamp that entered the aligner
    #[inline]
    pub fn latest_time(&self) -> Option<Timestamp> {
        self.latest_ts
    }

    #[inline]
    pub fn timeout(&self) -> Timestamp {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Timestamp) {
        self.timeout = timeout;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots in use or freed, i.e. the length of the slot table
    #[inline]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Maximum number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether slot `idx` currently holds a stream
    pub(crate) fn is_registered(&self, idx: usize) -> bool {
        self.streams.get(idx).is_some_and(Option::is_some)
    }

    fn slot(&self, idx: usize) -> Result<&dyn StreamBase, AlignerError> {
        self.streams
            .get(idx)
            .and_then(Option::as_deref)
            .ok_or_else(|| AlignerError::invalid_index(idx))
    }

    fn slot_mut(&mut self, idx: usize) -> Result<&mut dyn StreamBase, AlignerError> {
        match self.streams.get_mut(idx) {
            Some(Some(stream)) => Ok(stream.as_mut()),
            _ => Err(AlignerError::invalid_index(idx)),
        }
    }

    fn typed_mut<T: 'static>(
        streams: &mut [Slot],
        idx: usize,
    ) -> Result<&mut Stream<T>, AlignerError> {
        let stream = match streams.get_mut(idx) {
            Some(Some(stream)) => stream,
            _ => return Err(AlignerError::invalid_index(idx)),
        };
        stream
            .as_any_mut()
            .downcast_mut::<Stream<T>>()
            .ok_or_else(|| AlignerError::type_mismatch::<T>(idx))
    }
}

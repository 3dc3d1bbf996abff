//! Per-stream sample buffer with monotonic-arrival guard.
//!
//! A [`Stream`] owns a fixed-size [`RingBuffer`] of `(timestamp, value)` pairs,
//! the callback samples are delivered to, and the stream's status counters.
//! The aligner holds streams of different element types behind the
//! [`StreamBase`] trait and downcasts only where the element type matters
//! (`push`, `next_sample`, `copy_state`).

use std::any::Any;
use std::fmt;

use contracts::{AlignerError, StreamConfig, StreamStatus, Timestamp};
use validator::Validate;

use crate::ring_buffer::RingBuffer;

/// Callback invoked synchronously for every sample the aligner releases
pub type SampleCallback<T> = Box<dyn FnMut(Timestamp, &T) + Send>;

/// Uniform, element-type-erased view of a stream
///
/// This is the whole contract the merge step relies on.
pub trait StreamBase: Send {
    /// Deliver the oldest sample to the callback and remove it.
    ///
    /// # Panics
    /// If the stream holds no data; check [`StreamBase::has_data`] first.
    fn pop(&mut self) -> Timestamp;

    fn has_data(&self) -> bool;

    fn priority(&self) -> i32;

    /// Timestamp used to rank the stream.
    ///
    /// The next sample to emit if any is buffered, otherwise the expected
    /// time of the next sample (`last accepted + period`).
    fn latest_timestamp(&self) -> Timestamp;

    /// Newest buffered timestamp, `None` when empty
    fn latest_data_time(&self) -> Option<Timestamp>;

    /// Oldest buffered timestamp, `None` when empty
    fn earliest_data_time(&self) -> Option<Timestamp>;

    /// Status snapshot with fill level and data times refreshed
    fn buffer_status(&self) -> StreamStatus;

    /// Whether `other` has the same element type and capacity
    fn same_layout(&self, other: &dyn StreamBase) -> bool;

    /// Take buffer contents, last time and status from a stream of the same layout
    fn copy_state_from(&mut self, other: &dyn StreamBase) -> Result<(), AlignerError>;

    /// Drop buffered samples and reset transient counters
    fn clear(&mut self);

    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool);

    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Buffered stream of `T` samples
pub struct Stream<T> {
    buffer: RingBuffer<(Timestamp, T)>,
    callback: Option<SampleCallback<T>>,
    period: Timestamp,
    /// Last accepted timestamp, never decreases
    last_time: Timestamp,
    priority: i32,
    active: bool,
    status: StreamStatus,
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.status.name)
            .field("len", &self.buffer.len())
            .field("capacity", &self.buffer.capacity())
            .field("period", &self.period)
            .field("last_time", &self.last_time)
            .field("priority", &self.priority)
            .field("active", &self.active)
            .finish()
    }
}

impl<T> Stream<T> {
    /// Create a stream from its registration parameters
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration does not validate (e.g. zero buffer size).
    pub fn new(
        config: &StreamConfig,
        callback: Option<SampleCallback<T>>,
    ) -> Result<Self, AlignerError> {
        config
            .validate()
            .map_err(|e| AlignerError::invalid_config(format!("streams[{}]", config.name), e.to_string()))?;

        let status = StreamStatus {
            name: config.name.clone(),
            priority: config.priority,
            buffer_size: config.buffer_size,
            ..Default::default()
        };

        Ok(Self {
            buffer: RingBuffer::new(config.buffer_size),
            callback,
            period: config.period(),
            last_time: Timestamp::ZERO,
            priority: config.priority,
            active: true,
            status,
        })
    }

    /// Store a sample.
    ///
    /// Samples older than the last accepted one are counted and discarded.
    /// A full buffer evicts its oldest sample.
    pub fn push(&mut self, ts: Timestamp, value: T) {
        if ts < self.last_time {
            self.status.samples_backward_in_time += 1;
            tracing::debug!(
                stream = %self.status.name,
                ts = %ts,
                last_time = %self.last_time,
                "sample backward in time, dropped"
            );
            metrics::counter!(
                "stream_aligner_samples_dropped_total",
                "stream" => self.status.name.clone(),
                "reason" => "backward"
            )
            .increment(1);
            return;
        }

        self.last_time = ts;

        if self.buffer.is_full() {
            self.status.samples_dropped_buffer_full += 1;
            tracing::warn!(
                stream = %self.status.name,
                capacity = self.buffer.capacity(),
                "stream buffer full, oldest sample overwritten"
            );
            metrics::counter!(
                "stream_aligner_samples_dropped_total",
                "stream" => self.status.name.clone(),
                "reason" => "buffer_full"
            )
            .increment(1);
        }
        self.buffer.push_back((ts, value));
    }

    /// Peek at the next sample to be emitted
    #[inline]
    pub fn next_sample(&self) -> Option<&(Timestamp, T)> {
        self.buffer.front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    #[inline]
    pub fn period(&self) -> Timestamp {
        self.period
    }

    /// Last accepted timestamp
    #[inline]
    pub fn last_time(&self) -> Timestamp {
        self.last_time
    }

    /// Raw counters, without the refresh done by [`StreamBase::buffer_status`]
    #[inline]
    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    /// Account for a sample handed to the aligner, before any filtering
    pub(crate) fn record_received(&mut self, ts: Timestamp) {
        self.status.samples_received += 1;
        self.status.latest_sample_time = Some(ts);
    }

    /// Account for a sample rejected by the aligner's watermark
    pub(crate) fn record_late(&mut self) {
        self.status.samples_dropped_late_arriving += 1;
    }
}

impl<T: Clone> Stream<T> {
    /// Take buffer contents, last time, status and active flag from `other`.
    ///
    /// Callback, period and priority stay as configured.
    ///
    /// # Errors
    /// `StructuralMismatch` if the buffer capacities differ.
    pub fn copy_state(&mut self, other: &Stream<T>) -> Result<(), AlignerError> {
        if self.capacity() != other.capacity() {
            return Err(AlignerError::structural_mismatch(format!(
                "stream '{}' capacity {} differs from source capacity {}",
                self.status.name,
                self.capacity(),
                other.capacity()
            )));
        }
        self.last_time = other.last_time;
        self.buffer = other.buffer.clone();
        self.status = other.status.clone();
        self.active = other.active;
        Ok(())
    }
}

impl<T: Clone + Send + 'static> StreamBase for Stream<T> {
    fn pop(&mut self) -> Timestamp {
        let Some((ts, value)) = self.buffer.pop_front() else {
            panic!("pop() called on stream '{}' with no data", self.status.name);
        };
        self.status.samples_processed += 1;
        if let Some(callback) = self.callback.as_mut() {
            callback(ts, &value);
        }
        ts
    }

    #[inline]
    fn has_data(&self) -> bool {
        !self.buffer.is_empty()
    }

    #[inline]
    fn priority(&self) -> i32 {
        self.priority
    }

    fn latest_timestamp(&self) -> Timestamp {
        match self.buffer.front() {
            Some((ts, _)) => *ts,
            None => self.last_time + self.period,
        }
    }

    fn latest_data_time(&self) -> Option<Timestamp> {
        self.has_data().then_some(self.last_time)
    }

    fn earliest_data_time(&self) -> Option<Timestamp> {
        self.buffer.front().map(|(ts, _)| *ts)
    }

    fn buffer_status(&self) -> StreamStatus {
        StreamStatus {
            buffer_fill: self.buffer.len(),
            latest_data_time: self.latest_data_time(),
            earliest_data_time: self.earliest_data_time(),
            active: self.active,
            ..self.status.clone()
        }
    }

    fn same_layout(&self, other: &dyn StreamBase) -> bool {
        other
            .as_any()
            .downcast_ref::<Stream<T>>()
            .is_some_and(|other| other.capacity() == self.capacity())
    }

    fn copy_state_from(&mut self, other: &dyn StreamBase) -> Result<(), AlignerError> {
        let other = other.as_any().downcast_ref::<Stream<T>>().ok_or_else(|| {
            AlignerError::structural_mismatch(format!(
                "stream '{}' element type differs from source stream '{}'",
                self.status.name,
                other.name()
            ))
        })?;
        self.copy_state(other)
    }

    fn clear(&mut self) {
        self.last_time = Timestamp::ZERO;
        self.buffer.clear();

        self.status.latest_sample_time = None;
        self.status.latest_data_time = None;
        self.status.earliest_data_time = None;
        self.status.samples_dropped_buffer_full = 0;
        self.status.samples_dropped_late_arriving = 0;
        self.status.buffer_fill = 0;
        self.status.active = true;
    }

    #[inline]
    fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn name(&self) -> &str {
        &self.status.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

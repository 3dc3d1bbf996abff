//! Pull-driven front end for [`StreamAligner`].
//!
//! Instead of producers pushing samples, each stream registers a source
//! closure. `pull()` polls every source that has no sample waiting and
//! forwards the earliest waiting sample into the aligner, so a set of
//! recorded sources can be merged without an external event loop.

use std::any::Any;

use contracts::{AlignerConfig, AlignerError, StreamConfig, Timestamp};

use crate::aligner::StreamAligner;

/// Source of samples for a pull stream; `None` means nothing available right now
pub type PullSource<T> = Box<dyn FnMut() -> Option<(Timestamp, T)> + Send>;

trait PullStreamBase: Send {
    /// Ask the source for a sample unless one is already waiting
    fn poll(&mut self);

    /// Timestamp of the waiting sample
    fn pending_time(&self) -> Option<Timestamp>;

    /// Move the waiting sample into the aligner
    fn forward(&mut self, aligner: &mut StreamAligner) -> Result<(), AlignerError>;

    fn copy_pending_from(&mut self, other: &dyn PullStreamBase) -> Result<(), AlignerError>;

    fn as_any(&self) -> &dyn Any;
}

struct PullStream<T> {
    slot: usize,
    source: PullSource<T>,
    pending: Option<(Timestamp, T)>,
}

impl<T: Clone + Send + 'static> PullStreamBase for PullStream<T> {
    fn poll(&mut self) {
        if self.pending.is_none() {
            self.pending = (self.source)();
        }
    }

    fn pending_time(&self) -> Option<Timestamp> {
        self.pending.as_ref().map(|(ts, _)| *ts)
    }

    fn forward(&mut self, aligner: &mut StreamAligner) -> Result<(), AlignerError> {
        match self.pending.take() {
            Some((ts, value)) => aligner.push(self.slot, ts, value),
            None => Ok(()),
        }
    }

    fn copy_pending_from(&mut self, other: &dyn PullStreamBase) -> Result<(), AlignerError> {
        let other = other
            .as_any()
            .downcast_ref::<PullStream<T>>()
            .ok_or_else(|| AlignerError::type_mismatch::<T>(self.slot))?;
        self.pending.clone_from(&other.pending);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// [`StreamAligner`] fed by polling registered sources
#[derive(Default)]
pub struct PullAligner {
    aligner: StreamAligner,
    pull_streams: Vec<Option<Box<dyn PullStreamBase>>>,
}

impl PullAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            aligner: StreamAligner::new(config),
            pull_streams: Vec::new(),
        }
    }

    /// Register a stream fed by `source`
    ///
    /// Returns the slot index in the underlying aligner.
    pub fn register_pull_stream<T, S, F>(
        &mut self,
        config: StreamConfig,
        source: S,
        callback: F,
    ) -> Result<usize, AlignerError>
    where
        T: Clone + Send + 'static,
        S: FnMut() -> Option<(Timestamp, T)> + Send + 'static,
        F: FnMut(Timestamp, &T) + Send + 'static,
    {
        let slot = self.aligner.register_stream(config, callback)?;
        if self.pull_streams.len() <= slot {
            self.pull_streams.resize_with(slot + 1, || None);
        }
        self.pull_streams[slot] = Some(Box::new(PullStream {
            slot,
            source: Box::new(source),
            pending: None,
        }));
        Ok(slot)
    }

    /// Remove a pull stream and its aligner stream
    pub fn unregister_pull_stream(&mut self, idx: usize) -> Result<(), AlignerError> {
        self.aligner.unregister_stream(idx)?;
        if let Some(slot) = self.pull_streams.get_mut(idx) {
            *slot = None;
        }
        Ok(())
    }

    /// Poll sources and forward the earliest waiting sample
    ///
    /// Returns `true` when a sample was forwarded. Ties go to the lowest
    /// slot. Pull streams whose aligner stream was removed through
    /// [`PullAligner::aligner_mut`] are dropped without being polled.
    pub fn pull(&mut self) -> Result<bool, AlignerError> {
        for (slot, stream) in self.pull_streams.iter_mut().enumerate() {
            if stream.is_some() && !self.aligner.is_registered(slot) {
                tracing::debug!(slot, "pull stream without aligner stream dropped");
                *stream = None;
            }
        }

        for stream in self.pull_streams.iter_mut().flatten() {
            stream.poll();
        }

        let earliest = self
            .pull_streams
            .iter()
            .enumerate()
            .filter_map(|(slot, stream)| Some((stream.as_ref()?.pending_time()?, slot)))
            .min();

        let Some((_, slot)) = earliest else {
            return Ok(false);
        };
        if let Some(stream) = self.pull_streams[slot].as_mut() {
            stream.forward(&mut self.aligner)?;
        }
        Ok(true)
    }

    /// See [`StreamAligner::step`]
    pub fn step(&mut self) -> bool {
        self.aligner.step()
    }

    /// Take over aligner state and waiting samples from `other`
    ///
    /// Sources are not copied.
    pub fn copy_state(&mut self, other: &PullAligner) -> Result<(), AlignerError> {
        let same_layout = self.pull_streams.len() == other.pull_streams.len()
            && self
                .pull_streams
                .iter()
                .zip(&other.pull_streams)
                .all(|(a, b)| a.is_some() == b.is_some());
        if !same_layout {
            return Err(AlignerError::structural_mismatch("pull stream setup differs"));
        }

        self.aligner.copy_state(&other.aligner)?;
        for (mine, theirs) in self.pull_streams.iter_mut().zip(&other.pull_streams) {
            if let (Some(mine), Some(theirs)) = (mine, theirs) {
                mine.copy_pending_from(&**theirs)?;
            }
        }
        Ok(())
    }

    pub fn aligner(&self) -> &StreamAligner {
        &self.aligner
    }

    /// Mutable access to the wrapped aligner
    ///
    /// Remove pull streams with [`PullAligner::unregister_pull_stream`]; a slot
    /// freed here and registered again before the next `pull()` keeps the old
    /// source.
    pub fn aligner_mut(&mut self) -> &mut StreamAligner {
        &mut self.aligner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Slot = Arc<Mutex<Option<(Timestamp, String)>>>;

    fn source(slot: &Slot) -> impl FnMut() -> Option<(Timestamp, String)> + Send + 'static {
        let slot = slot.clone();
        move || slot.lock().unwrap().take()
    }

    fn set(slot: &Slot, t: f64, v: &str) {
        *slot.lock().unwrap() = Some((Timestamp::from_seconds(t), v.to_string()));
    }

    fn pull_aligner(
        p1: &Slot,
        p2: &Slot,
        seen: &Arc<Mutex<Vec<String>>>,
    ) -> PullAligner {
        let mut aligner = PullAligner::new(AlignerConfig {
            name: "pull".to_string(),
            timeout_s: 2.0,
            max_streams: 2,
        });
        for (p, priority) in [(p1, -1), (p2, 1)] {
            let sink = seen.clone();
            aligner
                .register_pull_stream(
                    StreamConfig::new("s", Timestamp::from_seconds(2.0))
                        .with_priority(priority)
                        .with_buffer_size(4),
                    source(p),
                    move |_, v: &String| sink.lock().unwrap().push(v.clone()),
                )
                .unwrap();
        }
        aligner
    }

    #[test]
    fn test_pull_forwards_in_time_order() {
        let p1 = Slot::default();
        let p2 = Slot::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aligner = pull_aligner(&p1, &p2, &seen);

        assert!(!aligner.step());
        assert!(!aligner.pull().unwrap());

        set(&p1, 2.0, "b");
        set(&p2, 1.0, "a");
        let mut forwarded = 0;
        while aligner.pull().unwrap() {
            forwarded += 1;
        }
        assert_eq!(forwarded, 2);

        assert!(aligner.step());
        assert!(aligner.step());
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);

        let other_seen = Arc::new(Mutex::new(Vec::new()));
        let mut other = pull_aligner(&p1, &p2, &other_seen);
        other.copy_state(&aligner).unwrap();
        assert_eq!(other.aligner().current_time(), aligner.aligner().current_time());
        assert_eq!(other.aligner().latency(), aligner.aligner().latency());
    }

    #[test]
    fn test_copy_state_keeps_pending_samples() {
        let p1 = Slot::default();
        let p2 = Slot::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aligner = pull_aligner(&p1, &p2, &seen);

        set(&p1, 1.0, "a");
        set(&p2, 3.0, "c");
        // forwards "a"; "c" stays pending in the pull stream
        assert!(aligner.pull().unwrap());

        let q1 = Slot::default();
        let q2 = Slot::default();
        let other_seen = Arc::new(Mutex::new(Vec::new()));
        let mut other = pull_aligner(&q1, &q2, &other_seen);
        other.copy_state(&aligner).unwrap();

        while other.pull().unwrap() {}
        while other.step() {}
        assert_eq!(*other_seen.lock().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_copy_state_rejects_other_layout() {
        let p1 = Slot::default();
        let p2 = Slot::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let aligner = pull_aligner(&p1, &p2, &seen);

        let mut empty = PullAligner::default();
        assert!(matches!(
            empty.copy_state(&aligner),
            Err(AlignerError::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn test_unregister_pull_stream() {
        let p1 = Slot::default();
        let p2 = Slot::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aligner = pull_aligner(&p1, &p2, &seen);

        aligner.unregister_pull_stream(0).unwrap();
        set(&p1, 1.0, "a");
        set(&p2, 2.0, "b");
        assert!(aligner.pull().unwrap());
        assert!(!aligner.pull().unwrap());
        assert!(aligner.unregister_pull_stream(0).is_err());

        while aligner.step() {}
        assert_eq!(*seen.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_stream_removed_through_aligner_is_not_pulled() {
        let p1 = Slot::default();
        let p2 = Slot::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aligner = pull_aligner(&p1, &p2, &seen);

        aligner.aligner_mut().unregister_stream(0).unwrap();
        set(&p1, 1.0, "a");
        set(&p2, 2.0, "b");

        assert!(aligner.pull().unwrap());
        assert!(!aligner.pull().unwrap());
        // source of the removed stream was never asked
        assert!(p1.lock().unwrap().is_some());

        while aligner.step() {}
        assert_eq!(*seen.lock().unwrap(), vec!["b"]);
    }
}

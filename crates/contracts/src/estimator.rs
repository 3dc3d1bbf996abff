//! TimestampEstimator trait - upstream timestamp correction
//!
//! Producers usually do not push raw arrival times into an aligner. A
//! timestamp estimator turns raw hardware/arrival times into drift- and
//! jitter-corrected times first. The aligner never sees the estimator; it only
//! receives its output as the `ts` argument of `push`.

use crate::Timestamp;

/// Timestamp estimator interface
///
/// # Example
///
/// ```ignore
/// let ts = estimator.estimate(raw_time, Some(sample_index));
/// aligner.push(stream_idx, ts, sample)?;
/// ```
pub trait TimestampEstimator {
    /// Corrected timestamp for a raw time.
    ///
    /// `index` is the sample's sequence number when the producer has one;
    /// gaps in it are counted as lost samples.
    fn estimate(&mut self, raw: Timestamp, index: Option<i64>) -> Timestamp;

    /// Tell the estimator a sample was lost without a timestamp
    fn report_loss(&mut self);

    /// Feed an external reference time (e.g. hardware timestamp)
    fn update_reference(&mut self, reference: Timestamp);

    /// Currently estimated period
    fn period(&self) -> Timestamp;

    /// Currently estimated latency, zero without reference updates
    fn latency(&self) -> Timestamp;
}

/// Estimator that passes raw times through unchanged
///
/// Keeps loss accounting from sequence indices so replayed logs still report
/// gaps.
#[derive(Debug, Clone, Default)]
pub struct IdentityEstimator {
    period: Timestamp,
    last_index: Option<i64>,
    lost_samples: u64,
    last_reference: Option<Timestamp>,
    last_raw: Option<Timestamp>,
}

impl IdentityEstimator {
    /// Create with a nominal period
    pub fn new(period: Timestamp) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Total samples counted as lost
    pub fn lost_samples(&self) -> u64 {
        self.lost_samples
    }
}

impl TimestampEstimator for IdentityEstimator {
    fn estimate(&mut self, raw: Timestamp, index: Option<i64>) -> Timestamp {
        if let Some(index) = index {
            if let Some(last) = self.last_index {
                // repeated or backward indices are not losses
                if let Some(gap) = index.checked_sub(last).and_then(|d| d.checked_sub(1)) {
                    if gap > 0 {
                        self.lost_samples = self.lost_samples.saturating_add(gap as u64);
                    }
                }
            }
            self.last_index = Some(index);
        }
        self.last_raw = Some(raw);
        raw
    }

    fn report_loss(&mut self) {
        self.lost_samples += 1;
    }

    fn update_reference(&mut self, reference: Timestamp) {
        self.last_reference = Some(reference);
    }

    fn period(&self) -> Timestamp {
        self.period
    }

    fn latency(&self) -> Timestamp {
        match (self.last_raw, self.last_reference) {
            (Some(raw), Some(reference)) => raw - reference,
            _ => Timestamp::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passes_through() {
        let mut estimator = IdentityEstimator::new(Timestamp::from_millis(10));
        let raw = Timestamp::from_seconds(4.2);
        assert_eq!(estimator.estimate(raw, None), raw);
        assert_eq!(estimator.period(), Timestamp::from_millis(10));
        assert_eq!(estimator.latency(), Timestamp::ZERO);
    }

    #[test]
    fn test_index_gaps_count_as_loss() {
        let mut estimator = IdentityEstimator::default();
        estimator.estimate(Timestamp::from_seconds(1.0), Some(1));
        estimator.estimate(Timestamp::from_seconds(2.0), Some(2));
        estimator.estimate(Timestamp::from_seconds(5.0), Some(5));
        assert_eq!(estimator.lost_samples(), 2);

        estimator.report_loss();
        assert_eq!(estimator.lost_samples(), 3);
    }

    #[test]
    fn test_extreme_and_backward_indices() {
        let mut estimator = IdentityEstimator::default();
        estimator.estimate(Timestamp::from_seconds(1.0), Some(i64::MIN));
        estimator.estimate(Timestamp::from_seconds(2.0), Some(i64::MAX));
        assert_eq!(estimator.lost_samples(), 0);

        estimator.estimate(Timestamp::from_seconds(3.0), Some(10));
        estimator.estimate(Timestamp::from_seconds(4.0), Some(10));
        assert_eq!(estimator.lost_samples(), 0);

        estimator.estimate(Timestamp::from_seconds(5.0), Some(12));
        assert_eq!(estimator.lost_samples(), 1);
    }

    #[test]
    fn test_latency_from_reference() {
        let mut estimator = IdentityEstimator::default();
        estimator.update_reference(Timestamp::from_seconds(1.0));
        estimator.estimate(Timestamp::from_seconds(1.25), None);
        assert_eq!(estimator.latency(), Timestamp::from_millis(250));
    }
}

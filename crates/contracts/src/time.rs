//! Timestamp - the single clock type shared by every crate
//!
//! Microsecond resolution, signed 64-bit. The same type is used for points in
//! time (sample timestamps) and spans (period, timeout, latency), so
//! `last + period` and `latest - current` stay in integer arithmetic and a
//! replayed log reproduces live behaviour bit for bit.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Point in time or duration, in microseconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The epoch / empty duration
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create from a microsecond count
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Create from a millisecond count
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1000)
    }

    /// Create from seconds, rounded to the nearest microsecond
    #[inline]
    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds * MICROS_PER_SECOND as f64).round() as i64)
    }

    /// Microsecond count
    #[inline]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Seconds as floating point
    #[inline]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / MICROS_PER_SECOND as f64
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Timestamp) {
        *self = *self + rhs;
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let secs = abs / MICROS_PER_SECOND as u64;
        let micros = abs % MICROS_PER_SECOND as u64;
        write!(f, "{sign}{secs}.{micros:06}s")
    }
}

// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strong types for cache metadata
//!
//! - [`TimestampMillis`]: Unix timestamp in milliseconds used for absolute expiry
//! - [`WriteSequence`]: Monotonic sequence number for deterministic eviction ordering
//! - [`Ttl`]: A validated, strictly positive time-to-live

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::constants::DEFAULT_TTL_SECONDS;
use crate::errors::StoreError;

/// Unix timestamp in milliseconds
///
/// Cache entries carry an absolute expiry expressed in this type, so that an
/// entry written by one process and read by another (the disk backend) agrees
/// on when it stops being valid.
///
/// # Examples
///
/// ```
/// use geocache::TimestampMillis;
/// use std::time::Duration;
///
/// let expires_at = TimestampMillis::now().after(Duration::from_secs(60));
/// assert!(!expires_at.is_past());
/// assert!(expires_at.remaining() <= Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampMillis(u128);

impl TimestampMillis {
    /// Creates a new timestamp representing the current time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis)
    }

    /// Creates a timestamp from a raw millisecond value
    pub fn from_millis(millis: u128) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value
    pub fn as_millis(&self) -> u128 {
        self.0
    }

    /// Returns the timestamp `duration` after this one
    pub fn after(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis()))
    }

    /// Returns `true` once the current time has reached this timestamp
    ///
    /// An entry whose expiry equals the current millisecond is already expired.
    pub fn is_past(&self) -> bool {
        Self::now() >= *self
    }

    /// Time left until this timestamp, zero if it has passed
    pub fn remaining(&self) -> Duration {
        let left = self.0.saturating_sub(Self::now().0);
        Duration::from_millis(u64::try_from(left).unwrap_or(u64::MAX))
    }
}

impl Default for TimestampMillis {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for TimestampMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Monotonic sequence number for deterministic eviction ordering
///
/// When several entries expire in the same millisecond, the one written first
/// is evicted first.
///
/// # Examples
///
/// ```
/// use geocache::WriteSequence;
///
/// let seq1 = WriteSequence::default();
/// let seq2 = seq1.next();
/// assert!(seq1 < seq2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct WriteSequence(u64);

impl WriteSequence {
    /// Creates a sequence number from a raw counter value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the next sequence number
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// A strictly positive time-to-live, in whole seconds
///
/// # Examples
///
/// ```
/// use geocache::Ttl;
///
/// let ttl = Ttl::from_secs(3600).unwrap();
/// assert_eq!(ttl.as_secs(), 3600);
/// assert!(Ttl::from_secs(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Ttl(NonZeroU64);

impl Ttl {
    /// Validates a TTL given in seconds
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTtl`] for zero.
    pub fn from_secs(seconds: u64) -> Result<Self, StoreError> {
        NonZeroU64::new(seconds)
            .map(Self)
            .ok_or_else(|| StoreError::invalid_ttl(seconds))
    }

    /// Returns the TTL in seconds
    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }

    /// Returns the TTL as a [`Duration`]
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl Default for Ttl {
    /// One hour
    fn default() -> Self {
        Self(NonZeroU64::MIN.saturating_add(DEFAULT_TTL_SECONDS - 1))
    }
}

impl TryFrom<u64> for Ttl {
    type Error = StoreError;

    fn try_from(seconds: u64) -> Result<Self, Self::Error> {
        Self::from_secs(seconds)
    }
}

impl From<Ttl> for u64 {
    fn from(ttl: Ttl) -> Self {
        ttl.as_secs()
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_millis_ordering() {
        let t1 = TimestampMillis::from_millis(1000);
        let t2 = TimestampMillis::from_millis(2000);
        assert!(t1 < t2);
        assert_eq!(t1, t1);
    }

    #[test]
    fn timestamp_after_saturates() {
        let ts = TimestampMillis::from_millis(u128::MAX - 1);
        assert_eq!(
            ts.after(Duration::from_secs(10)),
            TimestampMillis::from_millis(u128::MAX)
        );
    }

    #[test]
    fn timestamp_in_the_past_is_past() {
        let past = TimestampMillis::from_millis(TimestampMillis::now().as_millis() - 5000);
        assert!(past.is_past());
        assert_eq!(past.remaining(), Duration::ZERO);
    }

    #[test]
    fn timestamp_in_the_future_is_not_past() {
        let future = TimestampMillis::now().after(Duration::from_secs(5));
        assert!(!future.is_past());
        assert!(future.remaining() > Duration::from_secs(4));
    }

    #[test]
    fn timestamp_serialization() {
        let ts = TimestampMillis::from_millis(1234567890);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1234567890");

        let deserialized: TimestampMillis = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, ts);
    }

    #[test]
    fn write_sequence_next_saturating() {
        let seq = WriteSequence::from_raw(u64::MAX);
        assert_eq!(seq.next(), WriteSequence::from_raw(u64::MAX));
    }

    #[test]
    fn ttl_rejects_zero() {
        let err = Ttl::from_secs(0).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTtl { seconds: 0 }));
    }

    #[test]
    fn ttl_default_is_one_hour() {
        assert_eq!(Ttl::default().as_secs(), DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn ttl_deserialization_validates() {
        let ttl: Ttl = serde_json::from_str("60").unwrap();
        assert_eq!(ttl.as_duration(), Duration::from_secs(60));
        assert!(serde_json::from_str::<Ttl>("0").is_err());
    }
}

//! Timestamp type for block production times.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
///
/// Deserializing a negative number fails with a message naming the value,
/// rather than a generic type mismatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A system clock set before the epoch reads as [`Timestamp::EPOCH`].
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SecsVisitor;

        impl<'de> serde::de::Visitor<'de> for SecsVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "non-negative integer epoch seconds")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Timestamp(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v).map(Timestamp).map_err(|_| {
                    E::custom(format!("block time {v} is before the Unix epoch"))
                })
            }
        }

        deserializer.deserialize_u64(SecsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_at_zero() {
        let later = Timestamp::new(1_010);
        let earlier = Timestamp::new(1_000);
        assert_eq!(earlier.elapsed_since(later), 10);
        assert_eq!(later.elapsed_since(earlier), 0);
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&Timestamp::new(1_000)).unwrap();
        assert_eq!(json, "1000");
    }

    #[test]
    fn negative_time_names_the_value() {
        let err = serde_json::from_str::<Timestamp>("-1").unwrap_err();
        assert!(err.to_string().contains("block time -1 is before the Unix epoch"), "{err}");
    }

    #[test]
    fn fractional_time_is_rejected() {
        let err = serde_json::from_str::<Timestamp>("1.5").unwrap_err();
        assert!(err.to_string().contains("non-negative integer epoch seconds"), "{err}");
    }

    #[test]
    fn bincode_round_trip() {
        let bytes = bincode::serialize(&Timestamp::new(1_010)).unwrap();
        assert_eq!(bincode::deserialize::<Timestamp>(&bytes).unwrap(), Timestamp::new(1_010));
    }
}

//! Wire-format helper serializing [`Duration`] as integer nanoseconds.
//!
//! Resolves spec.md §9 Open Question 2: durations are emitted as
//! integer nanoseconds rather than RFC-3339 duration strings or
//! floating-point seconds, matching the source system's wire format.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serializes a [`Duration`] as an integer nanosecond count.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
    nanos.serialize(serializer)
}

/// Deserializes an integer nanosecond count into a [`Duration`].
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let nanos = i64::deserialize(deserializer)?;
    Ok(Duration::from_nanos(nanos.max(0).unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper(#[serde(with = "super")] Duration);

    #[test]
    fn round_trips_through_json() {
        let original = Wrapper(Duration::from_millis(150));
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "150000000");
        let decoded: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }
}

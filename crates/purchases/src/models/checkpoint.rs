//! Sync checkpoint: how far transaction history has been synchronized

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::window::{format_api_time, parse_api_time};

/// Where synchronization starts when no checkpoint has been saved yet
pub const DEFAULT_EPOCH: &str = "2019-12-02T00:00:00Z";

/// Marks that every transaction before `synchronized_until` has been synced
///
/// Persisted as `{"time": "YYYY-MM-DDTHH:MM:SSZ"}`. The value only moves
/// forward, and only once a cycle has stored everything it fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(
        rename = "time",
        serialize_with = "serialize_time",
        deserialize_with = "deserialize_time"
    )]
    pub synchronized_until: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint, dropping sub-second precision
    pub fn new(synchronized_until: DateTime<Utc>) -> Self {
        Self {
            synchronized_until: synchronized_until.trunc_subsecs(0),
        }
    }

    /// The checkpoint used before the first successful cycle
    pub fn epoch() -> Self {
        // DEFAULT_EPOCH is a compile-time constant in the API format
        let time = parse_api_time(DEFAULT_EPOCH).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::new(time)
    }
}

fn serialize_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_api_time(*time))
}

fn deserialize_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_api_time(&s)
        .or_else(|| DateTime::parse_from_rfc3339(&s).ok().map(|t| t.with_timezone(&Utc)))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid checkpoint time: {s}")))
}

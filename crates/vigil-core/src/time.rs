//! Wall-clock timestamps
//!
//! Envelopes carry an ISO-8601 timestamp (`ts`) in UTC. The wrapper keeps
//! the chrono representation internal so the wire shape is a plain string.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp carried by envelopes, serialized as an RFC 3339 string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt)
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Filesystem-safe rendering (colons replaced), used for image filenames.
    pub fn filename_safe(&self) -> String {
        self.0
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .replace(':', "-")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ts({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_string() {
        let ts = Timestamp::now();
        let json = serde_json::to_value(ts).unwrap();
        assert!(json.is_string());
    }

    #[test]
    fn test_roundtrip() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn test_filename_safe_has_no_colons() {
        let ts = Timestamp::now();
        assert!(!ts.filename_safe().contains(':'));
    }
}

//! Version stamps.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Opaque, lexically ordered version stamp.
///
/// "Newer" means lexically greater. The empty stamp sorts before every
/// issued version and marks a replica that has never converged.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }

    /// The stamp older than everything.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_newer_than(&self, other: &Version) -> bool {
        self > other
    }

    /// Next stamp from the wall clock, strictly after `previous`.
    pub fn next_after(previous: Option<&Version>) -> Version {
        Self::next_after_at(previous, Utc::now())
    }

    /// Next stamp for clock reading `now`, strictly after `previous`.
    pub fn next_after_at(previous: Option<&Version>, now: DateTime<Utc>) -> Version {
        let candidate = Version(now.format(STAMP_FORMAT).to_string());
        let Some(previous) = previous else {
            return candidate;
        };
        if candidate > *previous {
            return candidate;
        }

        // Clock did not advance past the last stamp: bump by one microsecond.
        if let Ok(parsed) = NaiveDateTime::parse_from_str(previous.as_str(), PARSE_FORMAT) {
            let bumped = Version(
                (parsed + Duration::microseconds(1))
                    .format(STAMP_FORMAT)
                    .to_string(),
            );
            if bumped > *previous {
                return bumped;
            }
        }
        Version(format!("{}0", previous.0))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ordering_is_lexical() {
        let a = Version::from("2024-01-01T00:00:00");
        let b = Version::from("2024-01-01T00:05:00");
        assert!(b.is_newer_than(&a));
        assert!(!a.is_newer_than(&a));
        assert!(a.is_newer_than(&Version::zero()));
    }

    #[test]
    fn test_next_uses_clock_when_ahead() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        let prev = Version::from("2024-01-01T00:00:00");
        let next = Version::next_after_at(Some(&prev), now);
        assert_eq!(next.as_str(), "2024-01-01T00:05:00.000000");
    }

    #[test]
    fn test_next_bumps_when_clock_is_behind() {
        let now = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let prev = Version::from("2024-01-01T00:00:00");
        let next = Version::next_after_at(Some(&prev), now);
        assert_eq!(next.as_str(), "2024-01-01T00:00:00.000001");

        let again = Version::next_after_at(Some(&next), now);
        assert_eq!(again.as_str(), "2024-01-01T00:00:00.000002");
    }

    #[test]
    fn test_next_after_foreign_stamp() {
        let prev = Version::from("zzz");
        let next = Version::next_after(Some(&prev));
        assert!(next.is_newer_than(&prev));
    }
}

//! Timestamp value object for temporal data.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in an ACT/365.25 year, used for all year fractions.
const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// A UTC timestamp for quotes, events and lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub const fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse from an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid RFC 3339 timestamp.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(dt.with_timezone(&Utc)))
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Signed duration since another timestamp.
    #[must_use]
    pub fn duration_since(&self, earlier: Self) -> Duration {
        self.0 - earlier.0
    }

    /// Shift by a signed duration.
    #[must_use]
    pub fn plus(&self, delta: Duration) -> Self {
        Self(self.0 + delta)
    }

    /// Year fraction (ACT/365.25) from `self` until `later`; negative if `later` is in the past.
    #[must_use]
    pub fn years_until(&self, later: Self) -> f64 {
        later.duration_since(*self).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_YEAR
    }

    /// Whole and fractional days from `self` until `later`.
    #[must_use]
    pub fn days_until(&self, later: Self) -> f64 {
        later.duration_since(*self).num_milliseconds() as f64 / 86_400_000.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

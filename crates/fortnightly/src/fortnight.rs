//! Fortnight bucketing.
//!
//! Every question belongs to a 14-day window. Windows are anchored at a fixed
//! reference Monday, so a window always starts on a Monday and boundaries never
//! drift. A window is identified by its first day, written `YYYY-MM-DD`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length of a bucket in days.
pub const FORTNIGHT_DAYS: i64 = 14;

/// The Monday every bucket is counted from (April 7, 2025).
pub const REFERENCE_MONDAY: NaiveDate = match NaiveDate::from_ymd_opt(2025, 4, 7) {
    Some(date) => date,
    None => panic!("reference monday is not a valid date"),
};

/// Storage and wire format for bucket ids.
const ID_FORMAT: &str = "%Y-%m-%d";

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid regex pattern"))
}

/// Return the first day of the bucket containing `date`.
///
/// Days before the reference Monday round toward negative infinity, so the
/// day before the reference lands in the bucket starting 14 days earlier.
#[must_use]
pub fn bucket_start(date: NaiveDate) -> NaiveDate {
    let days_elapsed = date.signed_duration_since(REFERENCE_MONDAY).num_days();
    let index = days_elapsed.div_euclid(FORTNIGHT_DAYS);
    REFERENCE_MONDAY + Duration::days(index * FORTNIGHT_DAYS)
}

/// The bucket containing today's local calendar date.
#[must_use]
pub fn current_bucket_id() -> FortnightId {
    FortnightId::containing(Local::now().date_naive())
}

/// The bucket containing `instant`, judged by its calendar date in its own
/// time zone.
#[must_use]
pub fn bucket_id_at<Tz: TimeZone>(instant: &DateTime<Tz>) -> FortnightId {
    FortnightId::containing(instant.date_naive())
}

/// Format a bucket as `"Apr 7 - Apr 20, 2025"`.
///
/// The year is the year of the last day, so a bucket that straddles New Year
/// reads `"Dec 29 - Jan 11, 2026"`.
#[must_use]
pub fn format_range(start: NaiveDate) -> String {
    let end = start + Duration::days(FORTNIGHT_DAYS - 1);
    format!(
        "{} - {}, {}",
        start.format("%b %-d"),
        end.format("%b %-d"),
        end.format("%Y")
    )
}

/// Format a date as `"April 7, 2025"`.
#[must_use]
pub fn format_long(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Parse a canonical `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns an error if the input is not zero-padded `YYYY-MM-DD` or does not
/// name a real calendar day.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if !id_pattern().is_match(trimmed) {
        return Err(Error::invalid_fortnight_id(value, "expected YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(trimmed, ID_FORMAT)
        .map_err(|e| Error::invalid_fortnight_id(value, e.to_string()))
}

/// Identifier of a 14-day bucket: the Monday it starts on.
///
/// A `FortnightId` can only hold a real bucket start. Use
/// [`FortnightId::containing`] to bucket an arbitrary date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FortnightId(NaiveDate);

impl FortnightId {
    /// The bucket containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self(bucket_start(date))
    }

    /// The reference bucket.
    #[must_use]
    pub fn reference() -> Self {
        Self(REFERENCE_MONDAY)
    }

    /// First day of the bucket.
    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.0
    }

    /// Last day of the bucket.
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.0 + Duration::days(FORTNIGHT_DAYS - 1)
    }

    /// The following bucket.
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0 + Duration::days(FORTNIGHT_DAYS))
    }

    /// The preceding bucket.
    #[must_use]
    pub fn previous(&self) -> Self {
        Self(self.0 - Duration::days(FORTNIGHT_DAYS))
    }

    /// Check whether `date` falls inside this bucket.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        bucket_start(date) == self.0
    }

    /// Human-readable range, e.g. `"Apr 7 - Apr 20, 2025"`.
    #[must_use]
    pub fn format_range(&self) -> String {
        format_range(self.0)
    }

    /// Long form of the start date, e.g. `"April 7, 2025"`.
    #[must_use]
    pub fn format_long(&self) -> String {
        format_long(self.0)
    }
}

impl fmt::Display for FortnightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ID_FORMAT))
    }
}

impl FromStr for FortnightId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let date = parse_date(s)?;
        if bucket_start(date) != date {
            return Err(Error::invalid_fortnight_id(
                s,
                format!(
                    "not the first day of a fortnight (that bucket starts {})",
                    bucket_start(date).format(ID_FORMAT)
                ),
            ));
        }
        Ok(Self(date))
    }
}

impl TryFrom<String> for FortnightId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FortnightId> for String {
    fn from(id: FortnightId) -> Self {
        id.to_string()
    }
}

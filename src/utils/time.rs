// Timestamp normalization shared by both stores.
// Canonical precision is milliseconds: BSON datetimes carry millis and the
// relational store writes RFC 3339 strings with exactly three fractional digits.

use chrono::{DateTime, SecondsFormat, Utc};
use mongodb::bson::DateTime as BsonDateTime;

/// Current instant truncated to millisecond precision
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

pub fn truncate_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt)
}

/// Fixed-width ISO-8601 (`2024-05-01T10:00:00.000Z`), so lexical order is chronological
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| truncate_millis(dt.with_timezone(&Utc)))
        .map_err(|e| format!("invalid ISO-8601 timestamp '{}': {}", value, e))
}

pub fn to_bson(dt: &DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

pub fn from_bson(dt: BsonDateTime) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_millis(dt.timestamp_millis())
        .ok_or_else(|| format!("BSON datetime out of range: {}", dt.timestamp_millis()))
}

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub location: Option<String>,
}

/// A field in a partial update: left alone, set to null, or set to a value.
///
/// Deserializes an absent member as `Unchanged` (with `#[serde(default)]`),
/// `null` as `Clear` and anything else as `Set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    #[default]
    Unchanged,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldUpdate::Unchanged)
    }
}

impl<'de, T> Deserialize<'de> for FieldUpdate<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        })
    }
}

/// Fields to change on an existing event. `title` and `start_time` can only
/// be replaced, never cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventChanges {
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub location: FieldUpdate<String>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.start_time.is_none() && self.location.is_unchanged()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EventFilter {
    pub fn has_date_bounds(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid date or timestamp")]
pub struct InvalidTimestamp(pub String);

/// Parses an RFC 3339 instant, a naive date-time (taken as UTC) or a bare
/// date (midnight UTC).
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, InvalidTimestamp> {
    let trimmed = input.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| InvalidTimestamp(input.to_string()))
}

//! Lenient date and timestamp parsing for backend payloads.
//!
//! The backend is not consistent about temporal formats: due dates arrive
//! as `YYYY-MM-DD` or as full date-times, and audit timestamps arrive either
//! as RFC 3339 strings or as zone-less local date-times. Everything is
//! normalised to [`NaiveDate`] (calendar dates) and [`DateTime<Utc>`]
//! (instants). Zone-less date-times are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";
const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parses a calendar date, keeping only the date part of date-time input.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, LOCAL_DATETIME_FORMAT)
                .ok()
                .map(|dt| dt.date())
        })
}

/// Parses an instant from RFC 3339 or a zone-less local date-time.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, LOCAL_DATETIME_FORMAT)
                .ok()
                .map(|dt| dt.and_utc())
        })
}

/// Formats a calendar date the way the backend expects it (`YYYY-MM-DD`).
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// `serde(with)` adapter for `Option<NaiveDate>` fields.
pub mod date_opt {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Serializes as `YYYY-MM-DD`, or `null` when absent.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&super::format_date(*date)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes a date or date-time string, or `null`.
    ///
    /// # Errors
    ///
    /// Fails when the string is present but is not a recognisable date.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        super::parse_date(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
    }
}

/// `serde(with)` adapter for required `DateTime<Utc>` fields.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Serializes as RFC 3339 with millisecond precision.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Deserializes an RFC 3339 or zone-less local date-time string.
    ///
    /// # Errors
    ///
    /// Fails when the string is not a recognisable timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// `serde(with)` adapter for optional `DateTime<Utc>` fields.
pub mod timestamp_opt {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Serializes as RFC 3339, or `null` when absent.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional timestamp string.
    ///
    /// # Errors
    ///
    /// Fails when the string is present but is not a recognisable timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        super::parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

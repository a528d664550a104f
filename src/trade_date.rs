//! Calendar-day dates in the `YYYYMMDD` form used by every dataset.
//!
//! Dates carry no timezone; ordering is plain calendar ordering.

use crate::error::RatingError;
use chrono::{Datelike, NaiveDate};

const TRADE_DATE_FORMAT: &str = "%Y%m%d";

/// Parses an 8-digit `YYYYMMDD` string (surrounding whitespace allowed).
pub fn parse_trade_date(raw: &str) -> Result<NaiveDate, RatingError> {
    let trimmed = raw.trim();
    if trimmed.len() != 8 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(RatingError::InvalidParameter(format!(
            "date '{}' is not in YYYYMMDD form",
            raw
        )));
    }
    NaiveDate::parse_from_str(trimmed, TRADE_DATE_FORMAT).map_err(|e| {
        RatingError::InvalidParameter(format!("date '{}' is not a calendar date: {}", raw, e))
    })
}

/// Converts an integer such as `20230105` into a date.
pub fn trade_date_from_int(value: i64) -> Result<NaiveDate, RatingError> {
    if !(10_000_101..=99_991_231).contains(&value) {
        return Err(RatingError::InvalidParameter(format!(
            "date {} is not in YYYYMMDD form",
            value
        )));
    }
    let year = (value / 10_000) as i32;
    let month = ((value / 100) % 100) as u32;
    let day = (value % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        RatingError::InvalidParameter(format!("date {} is not a calendar date", value))
    })
}

/// Converts a date back into its `YYYYMMDD` integer form.
pub fn trade_date_to_int(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Formats a date as an 8-digit string.
pub fn format_trade_date(date: NaiveDate) -> String {
    date.format(TRADE_DATE_FORMAT).to_string()
}

/// Serde adapter storing dates as `YYYYMMDD` integers.
///
/// Deserialization accepts both integer and string fields, so CSV columns,
/// JSON numbers and JSON strings all parse.
pub mod serde_yyyymmdd {
    use super::{parse_trade_date, trade_date_to_int};
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDate {
        Int(i64),
        Text(String),
    }

    fn from_raw<E: de::Error>(raw: RawDate) -> Result<NaiveDate, E> {
        let text = match raw {
            RawDate::Int(value) => value.to_string(),
            RawDate::Text(text) => text,
        };
        parse_trade_date(&text).map_err(E::custom)
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(trade_date_to_int(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        from_raw(RawDate::deserialize(deserializer)?)
    }

    /// Same adapter for optional columns; empty fields become `None`.
    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_some(&trade_date_to_int(*date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<RawDate>::deserialize(deserializer)? {
                None => Ok(None),
                Some(RawDate::Text(text)) if text.trim().is_empty() => Ok(None),
                Some(raw) => from_raw(raw).map(Some),
            }
        }
    }
}

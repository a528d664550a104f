//! Error taxonomy shared by the calendar, rating and reference layers.

use chrono::NaiveDate;
use thiserror::Error;

use crate::observation::DataProviderError;

/// Errors surfaced to the presentation layer.
///
/// Every variant aborts the affected rating section; the core never
/// substitutes a default value for a failed lookup.
#[derive(Debug, Error)]
pub enum RatingError {
    /// The requested end date precedes every date in the calendar.
    #[error("no trading data on or before {requested}; check the coverage start of this dataset")]
    NoEarlierDate { requested: NaiveDate },

    /// The requested window reaches before the earliest available trading date.
    #[error(
        "insufficient history ending {requested_end}: {needed} trading days requested, {available} available"
    )]
    InsufficientHistory {
        requested_end: NaiveDate,
        needed: usize,
        available: usize,
    },

    /// Non-positive day counts or malformed dates.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A watchlist token did not match any known instrument.
    #[error("no instrument found for '{0}'")]
    NotFound(String),

    /// The data provider failed to load a dataset.
    #[error(transparent)]
    DataProvider(#[from] DataProviderError),
}

impl RatingError {
    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            RatingError::NoEarlierDate { .. } => "NoEarlierDate",
            RatingError::InsufficientHistory { .. } => "InsufficientHistory",
            RatingError::InvalidParameter(_) => "InvalidParameter",
            RatingError::NotFound(_) => "NotFound",
            RatingError::DataProvider(_) => "DataProvider",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_date() {
        let err = RatingError::NoEarlierDate {
            requested: NaiveDate::from_ymd_opt(2022, 12, 30).unwrap(),
        };
        assert!(err.to_string().contains("2022-12-30"));
        assert_eq!(err.kind(), "NoEarlierDate");
    }

    #[test]
    fn test_insufficient_history_message() {
        let err = RatingError::InsufficientHistory {
            requested_end: NaiveDate::from_ymd_opt(2023, 1, 5).unwrap(),
            needed: 10,
            available: 4,
        };
        let message = err.to_string();
        assert!(message.contains("10 trading days"));
        assert!(message.contains("4 available"));
    }

    #[test]
    fn test_provider_errors_convert() {
        let err: RatingError = DataProviderError::MissingDataset("stock_basic".to_string()).into();
        assert_eq!(err.kind(), "DataProvider");
        assert!(err.to_string().contains("stock_basic"));
    }
}

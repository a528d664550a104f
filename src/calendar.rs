//! Trading calendars and the historical windows cut from them.
//!
//! A calendar is the ordered set of distinct trade dates that occur in one
//! dataset. Volatility and volume datasets have different coverage, so each
//! rating builds its calendar from its own series; calendars are never merged.
//!
//! Resolution and windowing use binary search over a sorted vector.

use crate::error::RatingError;
use crate::observation::Observation;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// Inclusive `[start, end]` range whose endpoints are calendar members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Window { start, end }
    }

    /// Returns true if `date` lies within the window (both ends inclusive).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Adjacent "past" and "recent" windows used by the change ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DualWindow {
    pub past: Window,
    pub recent: Window,
    /// The requested end date after calendar resolution.
    pub valid_end: NaiveDate,
}

/// Ordered set of valid trading dates for one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingCalendar {
    dates: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// Builds a calendar from arbitrary dates; duplicates are removed.
    pub fn from_dates<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        dates.sort_unstable();
        dates.dedup();
        TradingCalendar { dates }
    }

    /// Builds the calendar of an observation series.
    pub fn from_observations(observations: &[Observation]) -> Self {
        Self::from_dates(observations.iter().map(|obs| obs.trade_date))
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of calendar dates inside `window`, both ends inclusive.
    pub fn trading_days_in(&self, window: &Window) -> usize {
        if window.start > window.end {
            return 0;
        }
        let lower = self.dates.partition_point(|d| *d < window.start);
        let upper = self.dates.partition_point(|d| *d <= window.end);
        upper - lower
    }

    /// Maps `requested` to a trading date.
    ///
    /// An exact member is returned unchanged; otherwise the largest member
    /// strictly earlier than `requested` is returned.
    ///
    /// # Errors
    /// `NoEarlierDate` when every member is later than `requested`.
    pub fn resolve(&self, requested: NaiveDate) -> Result<NaiveDate, RatingError> {
        self.resolve_index(requested).map(|index| self.dates[index])
    }

    fn resolve_index(&self, requested: NaiveDate) -> Result<usize, RatingError> {
        match self.dates.binary_search(&requested) {
            Ok(index) => Ok(index),
            Err(0) => Err(RatingError::NoEarlierDate { requested }),
            Err(insert_at) => Ok(insert_at - 1),
        }
    }

    /// Window of exactly `day_count` trading days ending at the resolved
    /// `requested_end`.
    ///
    /// # Errors
    /// - `InvalidParameter` if `day_count` is zero
    /// - `NoEarlierDate` if `requested_end` predates the calendar
    /// - `InsufficientHistory` if fewer than `day_count` dates precede it
    pub fn single_window(
        &self,
        requested_end: NaiveDate,
        day_count: usize,
    ) -> Result<Window, RatingError> {
        ensure_positive("day_count", day_count)?;
        let end_index = self.resolve_index(requested_end)?;
        let available = end_index + 1;

        if available < day_count {
            return Err(RatingError::InsufficientHistory {
                requested_end,
                needed: day_count,
                available,
            });
        }

        let window = Window::new(self.dates[available - day_count], self.dates[end_index]);
        debug!(
            start = %window.start,
            end = %window.end,
            day_count,
            "resolved single window"
        );
        Ok(window)
    }

    /// Contiguous past/recent windows ending at the resolved `requested_end`.
    ///
    /// The recent window covers the last `recent_count` trading days up to
    /// and including the resolved end; the past window covers the
    /// `past_count` trading days immediately before it.
    ///
    /// # Errors
    /// Same as [`single_window`](Self::single_window), checked against the
    /// earliest index either window touches.
    pub fn dual_window(
        &self,
        requested_end: NaiveDate,
        past_count: usize,
        recent_count: usize,
    ) -> Result<DualWindow, RatingError> {
        ensure_positive("past_count", past_count)?;
        ensure_positive("recent_count", recent_count)?;
        let end_index = self.resolve_index(requested_end)?;
        let available = end_index + 1;
        let needed = past_count + recent_count;

        if available < needed {
            return Err(RatingError::InsufficientHistory {
                requested_end,
                needed,
                available,
            });
        }

        let recent_start = available - recent_count;
        let past_end = recent_start - 1;
        let past_start = recent_start - past_count;

        let windows = DualWindow {
            past: Window::new(self.dates[past_start], self.dates[past_end]),
            recent: Window::new(self.dates[recent_start], self.dates[end_index]),
            valid_end: self.dates[end_index],
        };
        debug!(
            past_start = %windows.past.start,
            past_end = %windows.past.end,
            recent_start = %windows.recent.start,
            recent_end = %windows.recent.end,
            "resolved dual window"
        );
        Ok(windows)
    }
}

fn ensure_positive(name: &str, value: usize) -> Result<(), RatingError> {
    if value == 0 {
        return Err(RatingError::InvalidParameter(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(())
}

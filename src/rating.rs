//! Rating engine.
//!
//! Three strength coefficients rank the instrument universe:
//!
//! - **C1**: mean daily volatility over the last N trading days.
//! - **C2**: percentage change of mean volatility between a "past" window and
//!   the adjacent "recent" window; a zero past mean rates 0.
//! - **C3**: the same change computed on daily volume, with no zero guard.
//!
//! Every computation is a pure function of its request and a dataset
//! snapshot. [`RatingEngine`] loads fresh snapshots from a [`DataProvider`]
//! per call and caches nothing.

pub mod change;
pub mod ranking;

use crate::aggregate::average_over_window;
use crate::calendar::{DualWindow, TradingCalendar, Window};
use crate::config::RatingConfig;
use crate::error::RatingError;
use crate::instrument::{CompanySnapshot, InstrumentReference};
use crate::instrument_code::InstrumentCode;
use crate::observation::{DataProvider, Observation, ObservationKind};
use crate::reference::{
    enrich, instrument_attributes_for_date, EnrichedRatingRow, InstrumentAttributes,
    ReferenceIndex,
};
use change::{ChangeAnalytic, GuardedPercentChange, PercentChange};
use chrono::NaiveDate;
use ranking::{add_ranking_column, rank_descending, sort_descending};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// The three ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingKind {
    C1,
    C2,
    C3,
}

impl RatingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingKind::C1 => "c1",
            RatingKind::C2 => "c2",
            RatingKind::C3 => "c3",
        }
    }

    /// The observation series (and therefore the calendar) the rating uses.
    pub fn source(&self) -> ObservationKind {
        match self {
            RatingKind::C1 | RatingKind::C2 => ObservationKind::Volatility,
            RatingKind::C3 => ObservationKind::Volume,
        }
    }
}

impl fmt::Display for RatingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatingKind {
    type Err = RatingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "c1" => Ok(RatingKind::C1),
            "c2" => Ok(RatingKind::C2),
            "c3" => Ok(RatingKind::C3),
            other => Err(RatingError::InvalidParameter(format!(
                "unknown rating '{}'",
                other
            ))),
        }
    }
}

/// One instrument's rating and the aggregates it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRow {
    pub code: InstrumentCode,
    /// Rank key: the mean itself for C1, the percentage change for C2/C3
    pub value: f64,
    /// Mean over the past window (C2/C3 only)
    pub past: Option<f64>,
    /// Mean over the recent window (C2/C3 only)
    pub recent: Option<f64>,
}

impl RatingRow {
    /// Row of an absolute rating (C1).
    pub fn absolute(code: InstrumentCode, value: f64) -> Self {
        RatingRow {
            code,
            value,
            past: None,
            recent: None,
        }
    }

    /// Row of a change rating (C2/C3).
    pub fn change(code: InstrumentCode, past: f64, recent: f64, value: f64) -> Self {
        RatingRow {
            code,
            value,
            past: Some(past),
            recent: Some(recent),
        }
    }
}

/// Windows a rating was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RatingWindows {
    Single { window: Window },
    Dual { past: Window, recent: Window },
}

impl RatingWindows {
    /// Resolved end date (the last date of the most recent window).
    pub fn valid_end(&self) -> NaiveDate {
        match self {
            RatingWindows::Single { window } => window.end,
            RatingWindows::Dual { recent, .. } => recent.end,
        }
    }
}

impl From<DualWindow> for RatingWindows {
    fn from(windows: DualWindow) -> Self {
        RatingWindows::Dual {
            past: windows.past,
            recent: windows.recent,
        }
    }
}

/// Unranked, unenriched result of one rating, in instrument-code order.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSet {
    pub kind: RatingKind,
    pub windows: RatingWindows,
    pub rows: Vec<RatingRow>,
}

/// Parameters of a C1 request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteRequest {
    pub end_date: NaiveDate,
    pub day_count: usize,
}

/// Parameters of a C2 or C3 request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub end_date: NaiveDate,
    pub past_count: usize,
    pub recent_count: usize,
}

/// Parameters of the combined ranking; each rating keeps its own counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRequest {
    pub end_date: NaiveDate,
    pub c1_count: usize,
    pub c2_past: usize,
    pub c2_recent: usize,
    pub c3_past: usize,
    pub c3_recent: usize,
}

/// C1 over a volatility series.
pub fn rate_absolute(
    volatility: &[Observation],
    request: &AbsoluteRequest,
) -> Result<RatingSet, RatingError> {
    let calendar = TradingCalendar::from_observations(volatility);
    let window = calendar.single_window(request.end_date, request.day_count)?;
    let rows = average_over_window(volatility, &window)
        .into_iter()
        .map(|(code, mean)| RatingRow::absolute(code, mean))
        .collect();

    Ok(RatingSet {
        kind: RatingKind::C1,
        windows: RatingWindows::Single { window },
        rows,
    })
}

/// C2 or C3 over `observations`, using that series' own calendar.
///
/// Only instruments with observations in both windows are rated.
pub fn rate_change(
    kind: RatingKind,
    observations: &[Observation],
    request: &ChangeRequest,
    analytic: &dyn ChangeAnalytic,
) -> Result<RatingSet, RatingError> {
    let calendar = TradingCalendar::from_observations(observations);
    let windows = calendar.dual_window(request.end_date, request.past_count, request.recent_count)?;

    let past = average_over_window(observations, &windows.past);
    let recent = average_over_window(observations, &windows.recent);

    let rows = recent
        .into_iter()
        .filter_map(|(code, recent_mean)| {
            past.get(&code).map(|&past_mean| {
                let value = analytic.compute(past_mean, recent_mean);
                RatingRow::change(code, past_mean, recent_mean, value)
            })
        })
        .collect();

    Ok(RatingSet {
        kind,
        windows: windows.into(),
        rows,
    })
}

/// C2: volatility change with the zero-base guard.
pub fn rate_volatility_change(
    volatility: &[Observation],
    request: &ChangeRequest,
) -> Result<RatingSet, RatingError> {
    rate_change(RatingKind::C2, volatility, request, &GuardedPercentChange)
}

/// C3: volume change without a zero-base guard.
pub fn rate_volume_change(
    volume: &[Observation],
    request: &ChangeRequest,
) -> Result<RatingSet, RatingError> {
    rate_change(RatingKind::C3, volume, request, &PercentChange)
}

/// A single rating, ranked by value descending and enriched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTable {
    pub kind: RatingKind,
    pub requested_end: NaiveDate,
    pub valid_end: NaiveDate,
    pub windows: RatingWindows,
    pub rows: Vec<EnrichedRatingRow>,
}

/// One instrument present in all three ratings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRow {
    pub code: InstrumentCode,
    pub attributes: InstrumentAttributes,
    pub c1_rank: usize,
    pub c2_rank: usize,
    pub c3_rank: usize,
    pub c1: RatingRow,
    pub c2: RatingRow,
    pub c3: RatingRow,
}

/// The combined view, sorted by C3 value descending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedTable {
    pub requested_end: NaiveDate,
    pub c1_windows: RatingWindows,
    pub c2_windows: RatingWindows,
    pub c3_windows: RatingWindows,
    /// Date the market values are taken as of
    pub attributes_date: NaiveDate,
    pub rows: Vec<CombinedRow>,
}

/// Every dataset a combined ranking needs, loaded once.
#[derive(Debug, Clone, Default)]
pub struct DatasetSnapshot {
    pub volatility: Vec<Observation>,
    pub volume: Vec<Observation>,
    pub reference: HashMap<InstrumentCode, InstrumentReference>,
}

impl DatasetSnapshot {
    pub fn load<P>(provider: &P) -> Result<Self, RatingError>
    where
        P: DataProvider + ?Sized,
    {
        Ok(DatasetSnapshot {
            volatility: provider.volatility_observations()?,
            volume: provider.volume_observations()?,
            reference: provider.static_reference()?,
        })
    }
}

/// Inner-joins three rating sets on instrument code and ranks each rating
/// within the joined rows. The result is sorted by C3 descending.
pub fn combine_ratings(
    c1: RatingSet,
    c2: RatingSet,
    c3: RatingSet,
    index: &ReferenceIndex,
) -> Vec<CombinedRow> {
    let mut c2_by_code: HashMap<InstrumentCode, RatingRow> =
        c2.rows.into_iter().map(|row| (row.code.clone(), row)).collect();
    let mut c3_by_code: HashMap<InstrumentCode, RatingRow> =
        c3.rows.into_iter().map(|row| (row.code.clone(), row)).collect();

    let joined: Vec<(RatingRow, RatingRow, RatingRow)> = c1
        .rows
        .into_iter()
        .filter_map(|c1_row| {
            let c2_row = c2_by_code.remove(&c1_row.code)?;
            let c3_row = c3_by_code.remove(&c1_row.code)?;
            Some((c1_row, c2_row, c3_row))
        })
        .collect();

    let c1_values: Vec<f64> = joined.iter().map(|(row, _, _)| row.value).collect();
    let c2_values: Vec<f64> = joined.iter().map(|(_, row, _)| row.value).collect();
    let c3_values: Vec<f64> = joined.iter().map(|(_, _, row)| row.value).collect();
    let c1_ranks = rank_descending(&c1_values);
    let c2_ranks = rank_descending(&c2_values);
    let c3_ranks = rank_descending(&c3_values);

    let mut rows: Vec<CombinedRow> = joined
        .into_iter()
        .enumerate()
        .map(|(i, (c1, c2, c3))| CombinedRow {
            code: c1.code.clone(),
            attributes: index.attributes(&c1.code),
            c1_rank: c1_ranks[i],
            c2_rank: c2_ranks[i],
            c3_rank: c3_ranks[i],
            c1,
            c2,
            c3,
        })
        .collect();

    sort_descending(&mut rows, |row| row.c3.value);
    rows
}

/// Runs ratings against a data provider.
pub struct RatingEngine<'a, P: DataProvider + ?Sized> {
    provider: &'a P,
    config: &'a RatingConfig,
}

impl<'a, P: DataProvider + ?Sized> RatingEngine<'a, P> {
    pub fn new(provider: &'a P, config: &'a RatingConfig) -> Self {
        RatingEngine { provider, config }
    }

    /// C1 ranked table.
    pub fn compute_c1(&self, request: &AbsoluteRequest) -> Result<RankedTable, RatingError> {
        let volatility = self.provider.volatility_observations()?;
        let set = rate_absolute(&volatility, request)?;
        self.rank_and_enrich(set, request.end_date)
    }

    /// C2 ranked table.
    pub fn compute_c2(&self, request: &ChangeRequest) -> Result<RankedTable, RatingError> {
        let volatility = self.provider.volatility_observations()?;
        let set = rate_volatility_change(&volatility, request)?;
        self.rank_and_enrich(set, request.end_date)
    }

    /// C3 ranked table.
    pub fn compute_c3(&self, request: &ChangeRequest) -> Result<RankedTable, RatingError> {
        let volume = self.provider.volume_observations()?;
        let set = rate_volume_change(&volume, request)?;
        self.rank_and_enrich(set, request.end_date)
    }

    /// Combined table of instruments present in all three ratings.
    ///
    /// The three ratings run in parallel over one immutable snapshot.
    pub fn compute_rankings(&self, request: &RankingRequest) -> Result<CombinedTable, RatingError> {
        let snapshot = DatasetSnapshot::load(self.provider)?;

        let c1_request = AbsoluteRequest {
            end_date: request.end_date,
            day_count: request.c1_count,
        };
        let c2_request = ChangeRequest {
            end_date: request.end_date,
            past_count: request.c2_past,
            recent_count: request.c2_recent,
        };
        let c3_request = ChangeRequest {
            end_date: request.end_date,
            past_count: request.c3_past,
            recent_count: request.c3_recent,
        };

        let (c1, (c2, c3)) = rayon::join(
            || rate_absolute(&snapshot.volatility, &c1_request),
            || {
                rayon::join(
                    || rate_volatility_change(&snapshot.volatility, &c2_request),
                    || rate_volume_change(&snapshot.volume, &c3_request),
                )
            },
        );
        let (c1, c2, c3) = (c1?, c2?, c3?);

        let c1_windows = c1.windows;
        let c2_windows = c2.windows;
        let c3_windows = c3.windows;
        let attributes_date = c1_windows
            .valid_end()
            .max(c2_windows.valid_end())
            .max(c3_windows.valid_end());

        let snapshots = self.company_data_or_empty(attributes_date)?;
        let index = ReferenceIndex::new(
            snapshot.reference,
            &snapshots,
            self.config.market_value_divisor,
        );
        let rows = combine_ratings(c1, c2, c3, &index);
        info!(rows = rows.len(), %attributes_date, "computed combined ranking");

        Ok(CombinedTable {
            requested_end: request.end_date,
            c1_windows,
            c2_windows,
            c3_windows,
            attributes_date,
            rows,
        })
    }

    fn rank_and_enrich(
        &self,
        set: RatingSet,
        requested_end: NaiveDate,
    ) -> Result<RankedTable, RatingError> {
        let valid_end = set.windows.valid_end();
        let reference = self.provider.static_reference()?;
        let snapshots = self.company_data_or_empty(valid_end)?;
        let index = ReferenceIndex::new(reference, &snapshots, self.config.market_value_divisor);

        let ranked = add_ranking_column(set.rows, |row| row.value);
        let rows = enrich(ranked, &index);
        info!(rating = %set.kind, rows = rows.len(), %valid_end, "computed rating");

        Ok(RankedTable {
            kind: set.kind,
            requested_end,
            valid_end,
            windows: set.windows,
            rows,
        })
    }

    /// Company data for `date`; a date before all company data leaves the
    /// market value column empty instead of failing the rating.
    fn company_data_or_empty(&self, date: NaiveDate) -> Result<Vec<CompanySnapshot>, RatingError> {
        match instrument_attributes_for_date(self.provider, date, self.config.company_data_min_rows)
        {
            Ok(rows) => Ok(rows),
            Err(RatingError::NoEarlierDate { requested }) => {
                warn!(%requested, "no company data on or before date; market values left empty");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }
}

/// Converts a user-supplied day count, rejecting non-positive values.
pub fn day_count(name: &str, value: i64) -> Result<usize, RatingError> {
    if value <= 0 {
        return Err(RatingError::InvalidParameter(format!(
            "{} must be greater than 0, got {}",
            name, value
        )));
    }
    usize::try_from(value)
        .map_err(|_| RatingError::InvalidParameter(format!("{} is too large", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::CompanySnapshot;
    use crate::observation::InMemoryDataProvider;
    use crate::trade_date::trade_date_from_int;

    fn code(raw: &str) -> InstrumentCode {
        InstrumentCode::new(raw).unwrap()
    }

    fn d(value: i64) -> NaiveDate {
        trade_date_from_int(value).unwrap()
    }

    fn obs(raw: &str, date: i64, value: f64) -> Observation {
        Observation::new(code(raw), d(date), value)
    }

    const DATES: [i64; 6] = [20230103, 20230104, 20230105, 20230106, 20230109, 20230110];

    /// A: past mean 0.01, recent mean 0.02. B: past 0, recent 0.03.
    fn volatility() -> Vec<Observation> {
        let mut rows = Vec::new();
        for (i, date) in DATES.iter().enumerate() {
            let recent = i >= 4;
            rows.push(obs("A.SZ", *date, if recent { 0.02 } else { 0.01 }));
            rows.push(obs("B.SZ", *date, if recent { 0.03 } else { 0.0 }));
        }
        rows
    }

    fn change_request(end: i64, past: usize, recent: usize) -> ChangeRequest {
        ChangeRequest {
            end_date: d(end),
            past_count: past,
            recent_count: recent,
        }
    }

    #[test]
    fn test_c2_zero_guard_and_order() {
        let set = rate_volatility_change(&volatility(), &change_request(20230110, 4, 2)).unwrap();
        let ranked = add_ranking_column(set.rows, |row| row.value);

        assert_eq!(ranked[0].item.code, code("A.SZ"));
        assert!((ranked[0].item.value - 100.0).abs() < 1e-9);
        assert_eq!(ranked[1].item.code, code("B.SZ"));
        assert_eq!(ranked[1].item.value, 0.0);
        assert_eq!(ranked[1].item.past, Some(0.0));
    }

    #[test]
    fn test_c3_zero_base_is_unguarded() {
        let set = rate_volume_change(&volatility(), &change_request(20230110, 4, 2)).unwrap();
        let b = set.rows.iter().find(|row| row.code == code("B.SZ")).unwrap();
        assert_eq!(b.value, f64::INFINITY);
        assert_eq!(set.kind, RatingKind::C3);
    }

    #[test]
    fn test_change_requires_presence_in_both_windows() {
        let mut data = volatility();
        data.push(obs("C.SZ", 20230110, 0.5));
        let set = rate_volatility_change(&data, &change_request(20230110, 4, 2)).unwrap();
        assert!(set.rows.iter().all(|row| row.code != code("C.SZ")));
    }

    #[test]
    fn test_c1_mean_over_resolved_window() {
        let request = AbsoluteRequest {
            end_date: d(20230108),
            day_count: 2,
        };
        let set = rate_absolute(&volatility(), &request).unwrap();
        assert_eq!(
            set.windows,
            RatingWindows::Single {
                window: Window::new(d(20230105), d(20230106))
            }
        );
        assert_eq!(set.windows.valid_end(), d(20230106));
        let a = set.rows.iter().find(|row| row.code == code("A.SZ")).unwrap();
        assert!((a.value - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_calendars_are_per_dataset() {
        // Volume has an extra trading date the volatility series lacks.
        let mut volume = volatility();
        volume.push(obs("A.SZ", 20230111, 0.02));
        volume.push(obs("B.SZ", 20230111, 0.03));

        let c2 = rate_volatility_change(&volatility(), &change_request(20230111, 2, 2)).unwrap();
        let c3 = rate_volume_change(&volume, &change_request(20230111, 2, 2)).unwrap();
        assert_eq!(c2.windows.valid_end(), d(20230110));
        assert_eq!(c3.windows.valid_end(), d(20230111));
    }

    fn provider() -> InMemoryDataProvider {
        let mut provider = InMemoryDataProvider::new();
        provider.add_observations(ObservationKind::Volatility, volatility());
        provider.add_observations(ObservationKind::Volume, volatility());
        provider.add_reference(InstrumentReference::new(code("A.SZ"), "Alpha", None, None));
        provider.add_company_partition(vec![CompanySnapshot::new(
            code("A.SZ"),
            d(20230110),
            Some(50_000.0),
        )]);
        provider
    }

    #[test]
    fn test_engine_c2_ranks_and_enriches() {
        let provider = provider();
        let config = RatingConfig::default();
        let engine = RatingEngine::new(&provider, &config);

        let table = engine.compute_c2(&change_request(20230115, 4, 2)).unwrap();
        assert_eq!(table.valid_end, d(20230110));
        assert_eq!(table.requested_end, d(20230115));
        assert_eq!(table.rows[0].rank, 1);
        assert_eq!(table.rows[0].attributes.name.as_deref(), Some("Alpha"));
        assert_eq!(table.rows[0].attributes.market_value, Some(5.0));
        assert_eq!(table.rows[1].attributes.name, None);
    }

    #[test]
    fn test_engine_errors_abort_the_section() {
        let provider = provider();
        let config = RatingConfig::default();
        let engine = RatingEngine::new(&provider, &config);

        assert!(matches!(
            engine.compute_c1(&AbsoluteRequest { end_date: d(20220101), day_count: 1 }),
            Err(RatingError::NoEarlierDate { .. })
        ));
        assert!(matches!(
            engine.compute_c3(&change_request(20230110, 5, 2)),
            Err(RatingError::InsufficientHistory { needed: 7, available: 6, .. })
        ));
    }

    #[test]
    fn test_engine_without_company_data_leaves_market_value_empty() {
        let mut provider = InMemoryDataProvider::new();
        provider.add_observations(ObservationKind::Volatility, volatility());
        let config = RatingConfig::default();
        let table = RatingEngine::new(&provider, &config)
            .compute_c1(&AbsoluteRequest { end_date: d(20230110), day_count: 3 })
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|row| row.attributes.market_value.is_none()));
    }

    #[test]
    fn test_compute_rankings_sorted_by_c3() {
        let mut provider = provider();
        // Volume for C lifts it to the top of C3; C has no volatility rows.
        provider.add_observations(
            ObservationKind::Volume,
            vec![obs("C.SZ", 20230106, 1.0), obs("C.SZ", 20230110, 9.0)],
        );
        let config = RatingConfig::default();
        let engine = RatingEngine::new(&provider, &config);

        let table = engine
            .compute_rankings(&RankingRequest {
                end_date: d(20230110),
                c1_count: 2,
                c2_past: 4,
                c2_recent: 2,
                c3_past: 4,
                c3_recent: 2,
            })
            .unwrap();

        let codes: Vec<&str> = table.rows.iter().map(|row| row.code.as_str()).collect();
        // B's volume change is infinite, so it leads C3.
        assert_eq!(codes, vec!["B.SZ", "A.SZ"]);
        assert_eq!(table.rows[0].c3_rank, 1);
        assert_eq!(table.rows[0].c2_rank, 2);
        assert_eq!(table.rows[1].c2_rank, 1);
        assert_eq!(table.attributes_date, d(20230110));
    }

    #[test]
    fn test_day_count_validation() {
        assert_eq!(day_count("days", 5).unwrap(), 5);
        assert!(matches!(day_count("days", 0), Err(RatingError::InvalidParameter(_))));
        assert!(day_count("days", -3).is_err());
    }

    #[test]
    fn test_rating_kind_parsing() {
        assert_eq!("C2".parse::<RatingKind>().unwrap(), RatingKind::C2);
        assert_eq!(RatingKind::C3.source(), ObservationKind::Volume);
        assert!("c4".parse::<RatingKind>().is_err());
    }
}

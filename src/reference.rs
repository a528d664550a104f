//! Reference joiner: descriptive attributes, point-in-time market value and
//! watchlist resolution.

use crate::calendar::TradingCalendar;
use crate::error::RatingError;
use crate::instrument::{CompanySnapshot, InstrumentReference};
use crate::instrument_code::{is_code_token, InstrumentCode};
use crate::observation::DataProvider;
use crate::rating::ranking::Ranked;
use crate::rating::RatingRow;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Full-width comma accepted as a watchlist separator alongside `,`.
const FULL_WIDTH_COMMA: char = '，';

/// Descriptive columns attached to a rating row. Every field is `None` when
/// the instrument has no matching reference or company data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentAttributes {
    pub name: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub industry: Option<String>,
    /// Market value in display units (raw value / divisor)
    pub market_value: Option<f64>,
}

/// A ranked rating row joined with its instrument attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRatingRow {
    pub rank: usize,
    pub code: InstrumentCode,
    pub attributes: InstrumentAttributes,
    pub rating: RatingRow,
}

/// Lookup tables for left-joining attributes by instrument code.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    reference: HashMap<InstrumentCode, InstrumentReference>,
    market_values: HashMap<InstrumentCode, f64>,
}

impl ReferenceIndex {
    /// Builds an index from static reference data and a single-date
    /// company-data snapshot.
    pub fn new(
        reference: HashMap<InstrumentCode, InstrumentReference>,
        snapshots: &[CompanySnapshot],
        market_value_divisor: f64,
    ) -> Self {
        let market_values = snapshots
            .iter()
            .filter_map(|snapshot| {
                snapshot
                    .market_value(market_value_divisor)
                    .map(|value| (snapshot.code.clone(), value))
            })
            .collect();
        ReferenceIndex {
            reference,
            market_values,
        }
    }

    /// Attributes of `code`; missing matches leave fields empty.
    pub fn attributes(&self, code: &InstrumentCode) -> InstrumentAttributes {
        let reference = self.reference.get(code);
        InstrumentAttributes {
            name: reference.map(|r| r.name.clone()),
            list_date: reference.and_then(|r| r.list_date),
            industry: reference.and_then(|r| r.industry.clone()),
            market_value: self.market_values.get(code).copied(),
        }
    }
}

/// Left-joins ranked rows with their attributes. Row order and count are kept.
pub fn enrich(rows: Vec<Ranked<RatingRow>>, index: &ReferenceIndex) -> Vec<EnrichedRatingRow> {
    rows.into_iter()
        .map(|ranked| EnrichedRatingRow {
            rank: ranked.rank,
            code: ranked.item.code.clone(),
            attributes: index.attributes(&ranked.item.code),
            rating: ranked.item,
        })
        .collect()
}

/// Company data for `target`, or for the nearest earlier date that has any.
///
/// Partitions cover consecutive date ranges, newest first, so only the
/// recent partition's earliest date can also hold rows in an older
/// partition. The recent partition answers alone when `target` is later than
/// that boundary date and it holds more than `min_rows` rows for `target`.
/// Otherwise every partition is scanned, `target` is resolved against the
/// dates present in the full history, and that date's rows are returned.
///
/// # Errors
/// `NoEarlierDate` when the full history has no date on or before `target`.
pub fn instrument_attributes_for_date<P>(
    provider: &P,
    target: NaiveDate,
    min_rows: usize,
) -> Result<Vec<CompanySnapshot>, RatingError>
where
    P: DataProvider + ?Sized,
{
    let partition = provider.recent_company_data()?;
    let boundary = partition.iter().map(|row| row.trade_date).min();
    let recent: Vec<CompanySnapshot> = partition
        .into_iter()
        .filter(|row| row.trade_date == target)
        .collect();

    if recent.len() > min_rows && boundary.is_some_and(|boundary| target > boundary) {
        debug!(%target, rows = recent.len(), "company data served from recent partition");
        return Ok(recent);
    }

    let history = provider.all_company_data()?;
    let calendar = TradingCalendar::from_dates(history.iter().map(|row| row.trade_date));
    let resolved = calendar.resolve(target)?;
    debug!(
        %target,
        %resolved,
        recent_rows = recent.len(),
        "company data served from full history"
    );

    Ok(history
        .into_iter()
        .filter(|row| row.trade_date == resolved)
        .collect())
}

/// Maps a watchlist token to an instrument display name.
///
/// Tokens containing the exchange separator are codes and are looked up in
/// the reference table; any other token is taken to be a name already and is
/// returned unchanged.
///
/// # Errors
/// `NotFound` when a code token matches no instrument.
pub fn resolve_instrument_name_or_code(
    token: &str,
    reference: &HashMap<InstrumentCode, InstrumentReference>,
) -> Result<String, RatingError> {
    if !is_code_token(token) {
        return Ok(token.to_string());
    }

    InstrumentCode::new(token)
        .ok()
        .and_then(|code| reference.get(&code))
        .map(|found| found.name.clone())
        .ok_or_else(|| RatingError::NotFound(token.to_string()))
}

/// Splits raw watchlist input on `,` and `，`, trimming tokens and dropping
/// empty ones.
pub fn parse_watchlist(raw: &str) -> Vec<String> {
    raw.split([',', FULL_WIDTH_COMMA])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// A resolved watchlist: instrument names to highlight plus the tokens that
/// could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Watchlist {
    pub names: Vec<String>,
    pub not_found: Vec<String>,
}

impl Watchlist {
    /// Parses and resolves raw input. An unresolved token is recorded and the
    /// remaining tokens still apply.
    pub fn resolve(raw: &str, reference: &HashMap<InstrumentCode, InstrumentReference>) -> Self {
        let mut watchlist = Watchlist::default();
        for token in parse_watchlist(raw) {
            match resolve_instrument_name_or_code(&token, reference) {
                Ok(name) => watchlist.names.push(name),
                Err(_) => watchlist.not_found.push(token),
            }
        }
        watchlist
    }

    /// Rows whose instrument name is on the watchlist, in their original
    /// (rating-descending) order and with their original ranks.
    pub fn select<'a>(&self, rows: &'a [EnrichedRatingRow]) -> Vec<&'a EnrichedRatingRow> {
        let names: HashSet<&str> = self.names.iter().map(String::as_str).collect();
        rows.iter()
            .filter(|row| {
                row.attributes
                    .name
                    .as_deref()
                    .is_some_and(|name| names.contains(name))
            })
            .collect()
    }
}

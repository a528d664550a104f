//! Display shaping for rating tables.
//!
//! Localized column labels and rounding live here only; the core row types
//! never carry display names.

use crate::calendar::Window;
use crate::rating::{CombinedTable, RankedTable, RatingKind, RatingWindows};
use crate::reference::{EnrichedRatingRow, InstrumentAttributes, Watchlist};
use crate::trade_date::format_trade_date;
use serde::Serialize;
use serde_json::Value;

const RANK: &str = "排名";
const NAME: &str = "股票名称";
const LIST_DATE: &str = "上市日期";
const INDUSTRY: &str = "行业";
const MARKET_VALUE: &str = "总市值(亿元)";

/// Labels and decimal places of a rating's value columns
/// (`past`, `recent`, `rating`).
struct ValueColumns {
    past: &'static str,
    recent: &'static str,
    rating: &'static str,
    aggregate_places: i32,
    rating_places: i32,
}

fn value_columns(kind: RatingKind) -> ValueColumns {
    match kind {
        RatingKind::C1 => ValueColumns {
            past: "",
            recent: "",
            rating: "波动性",
            aggregate_places: 4,
            rating_places: 4,
        },
        RatingKind::C2 => ValueColumns {
            past: "以前波动性",
            recent: "近期波动性",
            rating: "波动性涨跌百分比",
            aggregate_places: 4,
            rating_places: 2,
        },
        RatingKind::C3 => ValueColumns {
            past: "以前平均成交量(手)",
            recent: "近期平均交易量(手)",
            rating: "交易量涨跌百分比",
            aggregate_places: 2,
            rating_places: 2,
        },
    }
}

/// Rounds to `places` decimals; non-finite values become `null`.
pub fn rounded(value: f64, places: i32) -> Value {
    if !value.is_finite() {
        return Value::Null;
    }
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round() / factor;
    serde_json::Number::from_f64(rounded)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn optional_rounded(value: Option<f64>, places: i32) -> Value {
    value.map(|v| rounded(v, places)).unwrap_or(Value::Null)
}

fn attribute_cells(attributes: &InstrumentAttributes) -> Vec<Value> {
    vec![
        attributes.name.clone().map(Value::String).unwrap_or(Value::Null),
        attributes
            .list_date
            .map(|date| Value::String(format_trade_date(date)))
            .unwrap_or(Value::Null),
        attributes.industry.clone().map(Value::String).unwrap_or(Value::Null),
        optional_rounded(attributes.market_value, 2),
    ]
}

/// Window boundaries rendered as `YYYYMMDD` strings.
#[derive(Debug, Serialize)]
pub struct WindowView {
    pub start: String,
    pub end: String,
}

impl From<&Window> for WindowView {
    fn from(window: &Window) -> Self {
        WindowView {
            start: format_trade_date(window.start),
            end: format_trade_date(window.end),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WindowsView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past: Option<WindowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent: Option<WindowView>,
}

impl From<&RatingWindows> for WindowsView {
    fn from(windows: &RatingWindows) -> Self {
        match windows {
            RatingWindows::Single { window } => WindowsView {
                window: Some(window.into()),
                past: None,
                recent: None,
            },
            RatingWindows::Dual { past, recent } => WindowsView {
                window: None,
                past: Some(past.into()),
                recent: Some(recent.into()),
            },
        }
    }
}

/// Watchlist drill-down of a ranked table; empty when no watchlist was given.
#[derive(Debug, Default, Serialize)]
pub struct WatchlistView {
    pub rows: Vec<Vec<Value>>,
    pub not_found: Vec<String>,
}

/// A ranked table as sent to clients.
#[derive(Debug, Serialize)]
pub struct TableResponse {
    pub rating: RatingKind,
    pub requested_end_date: String,
    pub valid_end_date: String,
    pub windows: WindowsView,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Value>>,
    pub watchlist: WatchlistView,
}

/// Column labels of a single-rating table.
pub fn columns(kind: RatingKind) -> Vec<&'static str> {
    let labels = value_columns(kind);
    let mut columns = vec![RANK, NAME, LIST_DATE, INDUSTRY, MARKET_VALUE];
    if kind != RatingKind::C1 {
        columns.push(labels.past);
        columns.push(labels.recent);
    }
    columns.push(labels.rating);
    columns
}

fn row_cells(kind: RatingKind, row: &EnrichedRatingRow) -> Vec<Value> {
    let labels = value_columns(kind);
    let mut cells = vec![Value::from(row.rank)];
    cells.extend(attribute_cells(&row.attributes));
    if kind != RatingKind::C1 {
        cells.push(optional_rounded(row.rating.past, labels.aggregate_places));
        cells.push(optional_rounded(row.rating.recent, labels.aggregate_places));
    }
    cells.push(rounded(row.rating.value, labels.rating_places));
    cells
}

impl TableResponse {
    pub fn new(table: &RankedTable, watchlist: Option<&Watchlist>) -> Self {
        let watchlist = watchlist
            .map(|w| WatchlistView {
                rows: w
                    .select(&table.rows)
                    .into_iter()
                    .map(|row| row_cells(table.kind, row))
                    .collect(),
                not_found: w.not_found.clone(),
            })
            .unwrap_or_default();

        TableResponse {
            rating: table.kind,
            requested_end_date: format_trade_date(table.requested_end),
            valid_end_date: format_trade_date(table.valid_end),
            windows: (&table.windows).into(),
            columns: columns(table.kind),
            rows: table.rows.iter().map(|row| row_cells(table.kind, row)).collect(),
            watchlist,
        }
    }
}

/// The combined table as sent to clients.
#[derive(Debug, Serialize)]
pub struct CombinedResponse {
    pub requested_end_date: String,
    pub market_value_date: String,
    pub c1_windows: WindowsView,
    pub c2_windows: WindowsView,
    pub c3_windows: WindowsView,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Value>>,
}

impl From<&CombinedTable> for CombinedResponse {
    fn from(table: &CombinedTable) -> Self {
        let c1 = value_columns(RatingKind::C1);
        let c2 = value_columns(RatingKind::C2);
        let c3 = value_columns(RatingKind::C3);

        let rows = table
            .rows
            .iter()
            .map(|row| {
                let mut cells = attribute_cells(&row.attributes);
                cells.push(Value::from(row.c1_rank));
                cells.push(rounded(row.c1.value, c1.rating_places));
                cells.push(Value::from(row.c2_rank));
                cells.push(rounded(row.c2.value, c2.rating_places));
                cells.push(Value::from(row.c3_rank));
                cells.push(rounded(row.c3.value, c3.rating_places));
                cells
            })
            .collect();

        CombinedResponse {
            requested_end_date: format_trade_date(table.requested_end),
            market_value_date: format_trade_date(table.attributes_date),
            c1_windows: (&table.c1_windows).into(),
            c2_windows: (&table.c2_windows).into(),
            c3_windows: (&table.c3_windows).into(),
            columns: vec![
                NAME,
                LIST_DATE,
                INDUSTRY,
                MARKET_VALUE,
                "C1排名",
                c1.rating,
                "C2排名",
                c2.rating,
                "C3排名",
                c3.rating,
            ],
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_matches_display_precision() {
        assert_eq!(rounded(0.012345, 4), serde_json::json!(0.0123));
        assert_eq!(rounded(123.456, 2), serde_json::json!(123.46));
        assert_eq!(rounded(f64::INFINITY, 2), Value::Null);
        assert_eq!(rounded(f64::NAN, 2), Value::Null);
    }

    #[test]
    fn test_column_sets_per_rating() {
        assert_eq!(columns(RatingKind::C1).len(), 6);
        assert_eq!(columns(RatingKind::C2).last(), Some(&"波动性涨跌百分比"));
        assert_eq!(columns(RatingKind::C3)[5], "以前平均成交量(手)");
    }
}

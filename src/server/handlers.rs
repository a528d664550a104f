//! HTTP request handlers for API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;
use super::table::{CombinedResponse, TableResponse};
use crate::aggregate::last_update_date;
use crate::config::RatingConfig;
use crate::error::RatingError;
use crate::observation::{DataProvider, ObservationKind};
use crate::rating::{
    day_count, AbsoluteRequest, ChangeRequest, RankingRequest, RatingEngine, RatingKind,
};
use crate::reference::{resolve_instrument_name_or_code, Watchlist};
use crate::trade_date::{format_trade_date, parse_trade_date};

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok"
    }))
}

/// Query parameters of `GET /ratings/c1`
#[derive(Debug, Default, Deserialize)]
pub struct AbsoluteParams {
    pub end_date: Option<String>,
    pub days: Option<i64>,
    pub watchlist: Option<String>,
}

/// Query parameters of `GET /ratings/c2` and `GET /ratings/c3`
#[derive(Debug, Default, Deserialize)]
pub struct ChangeParams {
    pub end_date: Option<String>,
    pub past_days: Option<i64>,
    pub recent_days: Option<i64>,
    pub watchlist: Option<String>,
}

/// Query parameters of `GET /ratings/combined`
#[derive(Debug, Default, Deserialize)]
pub struct CombinedParams {
    pub end_date: Option<String>,
    pub c1_days: Option<i64>,
    pub c2_past_days: Option<i64>,
    pub c2_recent_days: Option<i64>,
    pub c3_past_days: Option<i64>,
    pub c3_recent_days: Option<i64>,
}

/// A missing end date means today.
fn end_date_or_today(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Ok(parse_trade_date(raw)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn count_or_default(name: &str, value: Option<i64>, default: usize) -> Result<usize, ApiError> {
    match value {
        Some(value) => Ok(day_count(name, value)?),
        None => Ok(default),
    }
}

/// Runs synchronous provider work on the blocking pool, holding the provider
/// lock until it finishes.
async fn with_provider<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&(dyn DataProvider + Send), &RatingConfig) -> Result<T, RatingError>
        + Send
        + 'static,
{
    let provider = Arc::clone(&state.provider).lock_owned().await;
    let config = Arc::clone(&state.config);
    let outcome = tokio::task::spawn_blocking(move || work(&**provider, &*config))
        .await
        .map_err(|e| ApiError::DataUnavailable(format!("rating task failed: {}", e)))?;
    Ok(outcome?)
}

/// Resolves the watchlist against the static reference, if one was given.
fn resolve_watchlist<P>(provider: &P, raw: Option<&str>) -> Result<Option<Watchlist>, RatingError>
where
    P: DataProvider + ?Sized,
{
    match raw.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => {
            let reference = provider.static_reference()?;
            Ok(Some(Watchlist::resolve(raw, &reference)))
        }
        None => Ok(None),
    }
}

/// GET /ratings/c1 - Mean volatility over the last `days` trading days
pub async fn get_c1(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AbsoluteParams>,
) -> Result<Json<TableResponse>, ApiError> {
    let request = AbsoluteRequest {
        end_date: end_date_or_today(params.end_date.as_deref())?,
        day_count: count_or_default("days", params.days, state.config.c1_days)?,
    };
    let raw_watchlist = params.watchlist;

    let (table, watchlist) = with_provider(&state, move |provider, config| {
        let table = RatingEngine::new(provider, config).compute_c1(&request)?;
        let watchlist = resolve_watchlist(provider, raw_watchlist.as_deref())?;
        Ok((table, watchlist))
    })
    .await?;

    Ok(Json(TableResponse::new(&table, watchlist.as_ref())))
}

async fn change_rating(
    state: &AppState,
    kind: RatingKind,
    params: ChangeParams,
) -> Result<TableResponse, ApiError> {
    let request = ChangeRequest {
        end_date: end_date_or_today(params.end_date.as_deref())?,
        past_count: count_or_default("past_days", params.past_days, state.config.past_days)?,
        recent_count: count_or_default(
            "recent_days",
            params.recent_days,
            state.config.recent_days,
        )?,
    };
    let raw_watchlist = params.watchlist;

    let (table, watchlist) = with_provider(state, move |provider, config| {
        let engine = RatingEngine::new(provider, config);
        let table = match kind {
            RatingKind::C3 => engine.compute_c3(&request)?,
            _ => engine.compute_c2(&request)?,
        };
        let watchlist = resolve_watchlist(provider, raw_watchlist.as_deref())?;
        Ok((table, watchlist))
    })
    .await?;

    Ok(TableResponse::new(&table, watchlist.as_ref()))
}

/// GET /ratings/c2 - Volatility change between adjacent windows
pub async fn get_c2(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChangeParams>,
) -> Result<Json<TableResponse>, ApiError> {
    Ok(Json(change_rating(&state, RatingKind::C2, params).await?))
}

/// GET /ratings/c3 - Volume change between adjacent windows
pub async fn get_c3(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChangeParams>,
) -> Result<Json<TableResponse>, ApiError> {
    Ok(Json(change_rating(&state, RatingKind::C3, params).await?))
}

/// GET /ratings/combined - Instruments present in all three ratings
pub async fn get_combined(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CombinedParams>,
) -> Result<Json<CombinedResponse>, ApiError> {
    let config = &state.config;
    let request = RankingRequest {
        end_date: end_date_or_today(params.end_date.as_deref())?,
        c1_count: count_or_default("c1_days", params.c1_days, config.c1_days)?,
        c2_past: count_or_default("c2_past_days", params.c2_past_days, config.past_days)?,
        c2_recent: count_or_default("c2_recent_days", params.c2_recent_days, config.recent_days)?,
        c3_past: count_or_default("c3_past_days", params.c3_past_days, config.past_days)?,
        c3_recent: count_or_default("c3_recent_days", params.c3_recent_days, config.recent_days)?,
    };

    let table = with_provider(&state, move |provider, config| {
        RatingEngine::new(provider, config).compute_rankings(&request)
    })
    .await?;
    Ok(Json(CombinedResponse::from(&table)))
}

/// Freshness of the series behind a rating.
#[derive(Debug, Serialize)]
pub struct LastUpdateResponse {
    pub rating: RatingKind,
    pub last_update_date: Option<String>,
    pub coverage_start: String,
}

/// GET /ratings/:rating/last-update
pub async fn get_last_update(
    State(state): State<Arc<AppState>>,
    Path(rating): Path<String>,
) -> Result<Json<LastUpdateResponse>, ApiError> {
    let kind: RatingKind = rating.parse()?;
    let source = kind.source();

    let last_update = with_provider(&state, move |provider, _| {
        Ok(last_update_date(&provider.observations(source)?))
    })
    .await?;
    let coverage_start = match source {
        ObservationKind::Volatility => state.config.volatility_coverage_start,
        ObservationKind::Volume => state.config.volume_coverage_start,
    };

    Ok(Json(LastUpdateResponse {
        rating: kind,
        last_update_date: last_update.map(format_trade_date),
        coverage_start: format_trade_date(coverage_start),
    }))
}

/// A watchlist token and the instrument name it resolves to.
#[derive(Debug, Serialize)]
pub struct InstrumentResponse {
    pub token: String,
    pub name: String,
}

/// GET /instruments/:token - Resolve a code (or pass through a name)
pub async fn get_instrument(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<InstrumentResponse>, ApiError> {
    let lookup = token.trim().to_string();
    let name = with_provider(&state, move |provider, _| {
        let reference = provider.static_reference()?;
        resolve_instrument_name_or_code(&lookup, &reference)
    })
    .await?;
    Ok(Json(InstrumentResponse { token, name }))
}

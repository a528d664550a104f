pub mod instrument_code;
pub mod trade_date;
pub mod instrument;
pub mod observation;
pub mod csv_provider;
pub mod sqlite_provider;
pub mod calendar;
pub mod aggregate;
pub mod rating;
pub mod reference;
pub mod config;
pub mod error;
pub mod server;


pub use instrument_code::{InstrumentCode, InstrumentCodeError};
pub use instrument::{CompanySnapshot, InstrumentReference};
pub use observation::{DataProvider, DataProviderError, InMemoryDataProvider, Observation, ObservationKind};
pub use csv_provider::CsvDataProvider;
pub use sqlite_provider::SqliteDataProvider;
pub use calendar::{DualWindow, TradingCalendar, Window};
pub use aggregate::{average_over_window, last_update_date};
pub use rating::{
    combine_ratings,
    rate_absolute,
    rate_change,
    rate_volatility_change,
    rate_volume_change,
    AbsoluteRequest,
    ChangeRequest,
    CombinedRow,
    CombinedTable,
    RankedTable,
    RankingRequest,
    RatingEngine,
    RatingKind,
    RatingRow,
    RatingSet,
    RatingWindows,
};
pub use reference::{
    instrument_attributes_for_date,
    parse_watchlist,
    resolve_instrument_name_or_code,
    EnrichedRatingRow,
    InstrumentAttributes,
    ReferenceIndex,
    Watchlist,
};
pub use config::{DataBackend, RatingConfig};
pub use error::RatingError;
pub use server::{run_server, ServerConfig, AppState, ApiError};

use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use strength::{
    AbsoluteRequest, ChangeRequest, CsvDataProvider, DataProvider, RankingRequest, RatingConfig,
    RatingEngine, RatingError, SqliteDataProvider, Watchlist,
};
use tempfile::TempDir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

const DATES: [&str; 6] = ["20230103", "20230104", "20230105", "20230106", "20230109", "20230110"];

/// Six trading days; the last two form the recent window in most requests.
fn dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let mut volatility = String::from("ts_code,trade_date,std\n");
    let mut volume_old = String::from("ts_code,trade_date,vol\n");
    let mut volume_new = String::from("ts_code,trade_date,vol\n");
    for (i, date) in DATES.iter().enumerate() {
        let recent = i >= 4;
        volatility.push_str(&format!("000001.SZ,{},{}\n", date, if recent { 0.02 } else { 0.01 }));
        volatility.push_str(&format!("000002.SZ,{},{}\n", date, if recent { 0.03 } else { 0.0 }));
        let volume = if i < 3 { &mut volume_old } else { &mut volume_new };
        volume.push_str(&format!("000001.SZ,{},{}\n", date, if recent { 300.0 } else { 100.0 }));
        volume.push_str(&format!("000002.SZ,{},{}\n", date, 100.0));
    }
    write(root, "daily_std_data.csv", &volatility);
    write(root, "daily_vol_data/1.csv", &volume_old);
    write(root, "daily_vol_data/2.csv", &volume_new);
    write(
        root,
        "stock_basic.csv",
        "ts_code,symbol,name,area,industry,list_date\n\
         000001.SZ,000001,平安银行,深圳,银行,19910403\n\
         000002.SZ,000002,万科A,深圳,全国地产,19910129\n",
    );
    write(
        root,
        "daily_company_data/1.csv",
        "ts_code,trade_date,total_mv\n000001.SZ,20230110,21000000\n000002.SZ,20230110,16000000\n",
    );
    write(
        root,
        "daily_company_data/2.csv",
        "ts_code,trade_date,total_mv\n000001.SZ,20221230,20000000\n",
    );
    dir
}

#[test]
fn c1_from_csv_files() {
    let dir = dataset();
    let provider = CsvDataProvider::new(dir.path()).unwrap();
    let config = RatingConfig::default();

    let table = RatingEngine::new(&provider, &config)
        .compute_c1(&AbsoluteRequest {
            end_date: d(2023, 1, 14),
            day_count: 2,
        })
        .unwrap();

    assert_eq!(table.valid_end, d(2023, 1, 10));
    assert_eq!(table.rows[0].attributes.name.as_deref(), Some("万科A"));
    assert_eq!(table.rows[0].rank, 1);
    assert_eq!(table.rows[0].attributes.market_value, Some(1600.0));
    assert_eq!(table.rows[1].attributes.industry.as_deref(), Some("银行"));
}

#[test]
fn c3_reads_split_volume_files() {
    let dir = dataset();
    let provider = CsvDataProvider::new(dir.path()).unwrap();
    let config = RatingConfig::default();

    let table = RatingEngine::new(&provider, &config)
        .compute_c3(&ChangeRequest {
            end_date: d(2023, 1, 10),
            past_count: 4,
            recent_count: 2,
        })
        .unwrap();

    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].code.as_str(), "000001.SZ");
    assert!((table.rows[0].rating.value - 200.0).abs() < 1e-9);
    assert_eq!(table.rows[1].rating.value, 0.0);
}

#[test]
fn combined_from_csv_files() {
    let dir = dataset();
    let provider = CsvDataProvider::new(dir.path()).unwrap();
    let config = RatingConfig::default();

    let table = RatingEngine::new(&provider, &config)
        .compute_rankings(&RankingRequest {
            end_date: d(2023, 1, 10),
            c1_count: 2,
            c2_past: 4,
            c2_recent: 2,
            c3_past: 4,
            c3_recent: 2,
        })
        .unwrap();

    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].code.as_str(), "000001.SZ");
    assert_eq!(table.rows[0].c2_rank, 1);
    assert_eq!(table.rows[1].c1_rank, 1);
}

#[test]
fn errors_abort_the_request() {
    let dir = dataset();
    let provider = CsvDataProvider::new(dir.path()).unwrap();
    let config = RatingConfig::default();
    let engine = RatingEngine::new(&provider, &config);

    assert!(matches!(
        engine.compute_c1(&AbsoluteRequest { end_date: d(2022, 12, 31), day_count: 1 }),
        Err(RatingError::NoEarlierDate { .. })
    ));
    assert!(matches!(
        engine.compute_c2(&ChangeRequest { end_date: d(2023, 1, 10), past_count: 20, recent_count: 5 }),
        Err(RatingError::InsufficientHistory { needed: 25, available: 6, .. })
    ));
    assert!(matches!(
        engine.compute_c1(&AbsoluteRequest { end_date: d(2023, 1, 10), day_count: 0 }),
        Err(RatingError::InvalidParameter(_))
    ));

    fs::remove_file(dir.path().join("daily_std_data.csv")).unwrap();
    assert!(matches!(
        engine.compute_c1(&AbsoluteRequest { end_date: d(2023, 1, 10), day_count: 1 }),
        Err(RatingError::DataProvider(_))
    ));
}

#[test]
fn watchlist_against_csv_reference() {
    let dir = dataset();
    let provider = CsvDataProvider::new(dir.path()).unwrap();
    let reference = provider.static_reference().unwrap();

    let watchlist = Watchlist::resolve("000001.SZ，万科A,300750.SZ", &reference);
    assert_eq!(watchlist.names, vec!["平安银行", "万科A"]);
    assert_eq!(watchlist.not_found, vec!["300750.SZ"]);
}

#[test]
fn sqlite_import_rates_like_csv() {
    let dir = dataset();
    let csv = CsvDataProvider::new(dir.path()).unwrap();
    let database = dir.path().join("ratings.db");
    SqliteDataProvider::new(&database)
        .unwrap()
        .import_from(&csv)
        .unwrap();
    let sqlite = SqliteDataProvider::open_read_only(&database).unwrap();
    let config = RatingConfig::default();

    let request = RankingRequest {
        end_date: d(2023, 1, 10),
        c1_count: 2,
        c2_past: 4,
        c2_recent: 2,
        c3_past: 4,
        c3_recent: 2,
    };
    let from_csv = RatingEngine::new(&csv, &config).compute_rankings(&request).unwrap();
    let from_sqlite = RatingEngine::new(&sqlite, &config).compute_rankings(&request).unwrap();
    assert_eq!(from_csv, from_sqlite);
    assert_eq!(from_sqlite.rows.len(), 2);
}

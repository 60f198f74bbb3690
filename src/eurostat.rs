//! # Eurostat Weekly Tables
//!
//! Fetches a weekly Eurostat dataset from the dissemination API, reshapes
//! the wide week-per-column table into long form, derives the Monday date of
//! each ISO-week code, and joins the result against the weekly-averaged
//! climate series.
//!
//! Week codes use Eurostat's `"YYYYWww"` encoding. The Monday of the ISO
//! week is the join key against the climate series; a malformed or
//! impossible code yields a null date, never an error, so joined output can
//! carry missing dates.

use chrono::{Datelike, NaiveDate, Weekday};
use flate2::read::GzDecoder;
use log::{debug, warn};
use polars::prelude::*;
use regex::Regex;
use std::io::Read;
use std::sync::LazyLock;
use thiserror::Error;

const DISSEMINATION_URL: &str = "https://ec.europa.eu/eurostat/api/dissemination/sdmx/2.1/data";

// Compiled once; week_to_monday runs per melted row.
static WEEK_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-?W(\d{2})$").expect("valid week pattern"));

/// Errors raised while fetching or reshaping a Eurostat table
#[derive(Error, Debug)]
pub enum EurostatError {
    #[error("HTTP error fetching dataset: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error decompressing response: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("malformed TSV response: {0}")]
    BadTsv(String),
}

/// Converts a `"YYYYWww"` or `"YYYY-Www"` week code to the Monday of that
/// ISO-8601 week.
///
/// Returns `None` for malformed strings and impossible week numbers (week 0,
/// week 54, week 53 in years with only 52 ISO weeks). Callers tolerate the
/// missing dates in joined output.
pub fn week_to_monday(code: &str) -> Option<NaiveDate> {
    let caps = WEEK_CODE.captures(code)?;
    let year: i32 = caps[1].parse().ok()?;
    let week: u32 = caps[2].parse().ok()?;
    let date = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon);
    if date.is_none() {
        debug!("Week code '{}' does not name a valid ISO week", code);
    }
    date
}

/// Client for the Eurostat dissemination API
pub struct EurostatClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl Default for EurostatClient {
    fn default() -> Self {
        Self::new(DISSEMINATION_URL)
    }
}

impl EurostatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Fetches a dataset by its Eurostat code as a wide table: one row per
    /// `(unit, age, sex, geo)` series, one `f64` column per week code.
    ///
    /// The API call is an opaque blocking fetch; the body may arrive
    /// gzip-compressed.
    pub fn fetch_table(&self, dataset: &str) -> Result<DataFrame, EurostatError> {
        let url = format!("{}/{}?format=TSV&compressed=true", self.base_url, dataset);
        debug!("Fetching Eurostat dataset from {}", url);
        let body = self.http.get(&url).send()?.error_for_status()?.bytes()?;

        // The dissemination API serves either raw TSV or a gzip member.
        let text = if body.starts_with(&[0x1f, 0x8b]) {
            let mut decoded = String::new();
            GzDecoder::new(body.as_ref()).read_to_string(&mut decoded)?;
            decoded
        } else {
            String::from_utf8_lossy(&body).into_owned()
        };

        parse_tsv(&text)
    }
}

/// Parses the Eurostat TSV body into the wide frame.
///
/// The first header field is a composite key like
/// `freq,unit,age,sex,geo\TIME_PERIOD`; the remaining header fields are week
/// codes. Cell values may carry observation flags (`"12.0 p"`) and `":"`
/// marks a missing value.
pub fn parse_tsv(text: &str) -> Result<DataFrame, EurostatError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| EurostatError::BadTsv("empty response".to_string()))?;

    let mut header_fields = header.split('\t');
    let key_spec = header_fields
        .next()
        .ok_or_else(|| EurostatError::BadTsv("missing key header".to_string()))?;
    let key_names: Vec<&str> = key_spec
        .split('\\')
        .next()
        .unwrap_or(key_spec)
        .split(',')
        .map(|s| s.trim())
        .collect();
    let weeks: Vec<String> = header_fields.map(|s| s.trim().to_string()).collect();

    let index_of = |name: &str| key_names.iter().position(|k| *k == name);
    let (unit_idx, age_idx, sex_idx, geo_idx) = match (
        index_of("unit"),
        index_of("age"),
        index_of("sex"),
        index_of("geo"),
    ) {
        (Some(u), Some(a), Some(s), Some(g)) => (u, a, s, g),
        _ => {
            return Err(EurostatError::BadTsv(format!(
                "unexpected key columns {:?}",
                key_names
            )));
        }
    };

    let mut units = Vec::new();
    let mut ages = Vec::new();
    let mut sexes = Vec::new();
    let mut geos = Vec::new();
    let mut week_values: Vec<Vec<Option<f64>>> = vec![Vec::new(); weeks.len()];

    for line in lines {
        let mut fields = line.split('\t');
        let key = fields
            .next()
            .ok_or_else(|| EurostatError::BadTsv("row without key".to_string()))?;
        let key_parts: Vec<&str> = key.split(',').map(|s| s.trim()).collect();
        if key_parts.len() != key_names.len() {
            warn!("Skipping Eurostat row with malformed key '{}'", key);
            continue;
        }
        units.push(key_parts[unit_idx].to_string());
        ages.push(key_parts[age_idx].to_string());
        sexes.push(key_parts[sex_idx].to_string());
        geos.push(key_parts[geo_idx].to_string());

        for column in week_values.iter_mut() {
            column.push(fields.next().and_then(parse_observation));
        }
    }

    let mut columns: Vec<Column> = vec![
        Series::new("unit".into(), units).into(),
        Series::new("age".into(), ages).into(),
        Series::new("sex".into(), sexes).into(),
        Series::new("geo".into(), geos).into(),
    ];
    for (week, values) in weeks.iter().zip(week_values) {
        columns.push(Series::new(week.as_str().into(), values).into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Strips observation flags and parses the numeric value; `":"` is missing.
fn parse_observation(raw: &str) -> Option<f64> {
    let token = raw.split_whitespace().next()?;
    if token == ":" {
        return None;
    }
    token.parse::<f64>().ok()
}

/// Reshapes the wide weekly table into long form and attaches the Monday
/// date of each week.
///
/// Output columns: `unit`, `age`, `sex`, `nuts_id`, `week`, `value`, `time`
/// (a `Date`, null when the week code fails to parse).
pub fn melt_weekly(wide: &DataFrame) -> Result<DataFrame, EurostatError> {
    let week_cols: Vec<String> = wide
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| !matches!(name.as_str(), "unit" | "age" | "sex" | "geo"))
        .collect();

    let long = wide
        .unpivot(week_cols, ["unit", "age", "sex", "geo"])?
        .lazy()
        .rename(["geo", "variable"], ["nuts_id", "week"], true)
        .collect()?;

    let days: Vec<Option<i32>> = long
        .column("week")?
        .str()?
        .iter()
        .map(|code| {
            code.and_then(week_to_monday)
                .map(|d| (d - NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch")).num_days() as i32)
        })
        .collect();
    let time = Int32Chunked::from_iter_options("time".into(), days.into_iter())
        .into_date()
        .into_series();

    let mut long = long;
    long.with_column(time)?;
    Ok(long)
}

/// Joins the long Eurostat table with the aggregated weekly climate series.
///
/// The Eurostat side is first restricted to the regions present in the
/// climate series, then left-joined on `[nuts_id, time]` so statistical
/// weeks with no climate coverage survive with nulls.
pub fn join_weekly(
    eurostat_long: &DataFrame,
    climate: &DataFrame,
) -> Result<DataFrame, EurostatError> {
    let climate_dated = climate
        .clone()
        .lazy()
        .with_column(col("time").cast(DataType::Date));

    let joined = eurostat_long
        .clone()
        .lazy()
        .join(
            climate_dated.clone(),
            [col("nuts_id")],
            [col("nuts_id")],
            JoinArgs::new(JoinType::Semi),
        )
        .join(
            climate_dated,
            [col("nuts_id"), col("time")],
            [col("nuts_id"), col("time")],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    Ok(joined)
}

/// Convenience check used by tests and callers: an ISO Monday.
pub fn is_monday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

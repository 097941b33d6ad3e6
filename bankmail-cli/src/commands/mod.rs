//! CLI command implementations

pub mod list;
pub mod pull;
pub mod show;
pub mod sources;
pub mod status;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use bankmail_core::{BankmailContext, DateRange};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Get the bankmail directory from environment or default
pub fn get_bankmail_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BANKMAIL_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".bankmail"))
        .ok_or_else(|| anyhow!("Could not find home directory; set BANKMAIL_DIR"))
}

/// Get or create bankmail context
pub fn get_context() -> Result<BankmailContext> {
    let bankmail_dir = get_bankmail_dir()?;

    std::fs::create_dir_all(&bankmail_dir)
        .with_context(|| format!("Failed to create bankmail directory: {:?}", bankmail_dir))?;

    BankmailContext::new(&bankmail_dir).context("Failed to initialize bankmail context")
}

/// Parse `YYYY-MM-DD` or an RFC 3339 timestamp
///
/// A bare date used as an end bound covers the whole day.
pub fn parse_date_arg(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (expected YYYY-MM-DD or RFC 3339)", value))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    match time {
        Some(time) => Ok(date.and_time(time).and_utc()),
        None => bail!("Invalid time of day"),
    }
}

/// Build a date range from optional `--start` / `--end` arguments
pub fn date_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
    let start = start.map(|s| parse_date_arg(s, false)).transpose()?;
    let end = end.map(|s| parse_date_arg(s, true)).transpose()?;
    Ok(DateRange::new(start, end)?)
}

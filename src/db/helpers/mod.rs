use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::capture::Modality;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| format!("failed to parse {field}"))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_optional_mode(value: Option<String>, field: &str) -> Result<Option<Modality>> {
    match value {
        Some(raw) => raw
            .parse::<Modality>()
            .map(Some)
            .with_context(|| format!("failed to parse {field}")),
        None => Ok(None),
    }
}

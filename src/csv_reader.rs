use crate::error::{AcquisitionError, RowError};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord, Trim};

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// One CSV row with its timestamp resolved to an instant
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Splits a CSV attachment body into records. Rows may have any number of columns.
pub fn read_csv_rows(text: &str) -> Result<Vec<StringRecord>, AcquisitionError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.trim().as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Reads a wall-clock timestamp as local time in `time_zone`
pub fn parse_timestamp(text: &str, time_zone: Tz) -> Result<DateTime<Utc>, RowError> {
    let naive = TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .ok_or_else(|| RowError::Timestamp(text.to_string()))?;

    // Ambiguous times during a DST fall-back resolve to the first occurrence
    time_zone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| RowError::NonexistentLocalTime(text.to_string()))
}

/// Parses `[label, timestamp, value, ...]`; extra columns are ignored
pub fn parse_row(record: &StringRecord, time_zone: Tz) -> Result<ParsedRow, RowError> {
    let (Some(label), Some(timestamp), Some(value)) = (record.get(0), record.get(1), record.get(2))
    else {
        return Err(RowError::TooShort(record.len()));
    };

    let timestamp = parse_timestamp(timestamp, time_zone)?;
    let value = value
        .parse::<f64>()
        .map_err(|_| RowError::Value(value.to_string()))?;

    Ok(ParsedRow {
        label: label.to_string(),
        timestamp,
        value,
    })
}

//! Decoding of SQL API cells into `Value`s
//!
//! The API returns every cell as a JSON string (or null). The column's
//! `rowType` says how to read it. Cells that cannot be read as their
//! declared type are kept as the raw string and logged.

use chrono::{DateTime, NaiveDate, NaiveTime};
use snowcopy_core::Value;

use crate::RowType;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Decode one cell according to its column metadata
pub fn decode_cell(raw: Option<&str>, row_type: &RowType) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };

    let decoded = match row_type.column_type.to_ascii_lowercase().as_str() {
        "fixed" => decode_fixed(raw),
        "real" => raw.trim().parse::<f64>().ok().map(Value::Float64),
        "text" => Some(Value::String(raw.to_string())),
        "boolean" => decode_boolean(raw),
        "date" => decode_date(raw),
        "time" => decode_time(raw),
        "timestamp_ntz" => decode_epoch(raw).and_then(|(secs, nanos)| {
            DateTime::from_timestamp(secs, nanos).map(|dt| Value::DateTime(dt.naive_utc()))
        }),
        "timestamp_ltz" | "timestamp_tz" => {
            // tz cells carry a trailing offset token; the epoch part is already UTC
            let epoch = raw.split_whitespace().next().unwrap_or_default();
            decode_epoch(epoch).and_then(|(secs, nanos)| {
                DateTime::from_timestamp(secs, nanos).map(Value::DateTimeUtc)
            })
        }
        "binary" => hex::decode(raw.trim()).ok().map(Value::Bytes),
        _ => Some(Value::String(raw.to_string())),
    };

    match decoded {
        Some(value) => value,
        None => {
            tracing::warn!(
                column = %row_type.name,
                column_type = %row_type.column_type,
                raw = %raw,
                "Could not decode cell, keeping raw text"
            );
            Value::String(raw.to_string())
        }
    }
}

/// Fixed-point numbers stay decimal strings so wide integers keep every digit
fn decode_fixed(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut parts = digits.splitn(2, '.');
    let integral = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or("0");
    let is_numeric = !integral.is_empty()
        && integral.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    is_numeric.then(|| Value::Decimal(trimmed.to_string()))
}

fn decode_boolean(raw: &str) -> Option<Value> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(Value::Bool(true)),
        "false" | "0" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Days since 1970-01-01
fn decode_date(raw: &str) -> Option<Value> {
    let days = raw.trim().parse::<i64>().ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    epoch
        .checked_add_signed(chrono::Duration::try_days(days)?)
        .map(Value::Date)
}

/// Seconds since midnight with a fractional part
fn decode_time(raw: &str) -> Option<Value> {
    let (secs, nanos) = decode_epoch(raw)?;
    let secs = u32::try_from(secs).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).map(Value::Time)
}

/// Split `"<seconds>.<fraction>"` into whole seconds and nanoseconds,
/// handling values before the epoch.
fn decode_epoch(raw: &str) -> Option<(i64, u32)> {
    let raw = raw.trim();
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let mut parts = unsigned.splitn(2, '.');
    let whole: i128 = parts.next()?.parse().ok()?;
    let fraction = parts.next().unwrap_or("");
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let fraction_nanos: i128 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse().ok()?
    };

    let mut total = whole * NANOS_PER_SEC + fraction_nanos;
    if negative {
        total = -total;
    }
    let secs = i64::try_from(total.div_euclid(NANOS_PER_SEC)).ok()?;
    let nanos = u32::try_from(total.rem_euclid(NANOS_PER_SEC)).ok()?;
    Some((secs, nanos))
}

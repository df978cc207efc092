//! Per-cell conversion from fetched values to storable values
//!
//! Conversion is keyed by the column's mapped local type and the sink's
//! capabilities. Failures never abort a batch: the cell becomes NULL and the
//! caller counts it.

use snowcopy_core::temporal;
use snowcopy_core::{ColumnDescriptor, LocalColumnSpec, LocalType, SinkCapabilities, Value};

use crate::{ConversionError, TypeMapper};

/// Everything needed to convert one column, resolved once per table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub name: String,
    pub remote_type: String,
    pub local_type: LocalType,
    pub is_fallback: bool,
}

impl ColumnPlan {
    pub fn local_spec(&self) -> LocalColumnSpec {
        LocalColumnSpec {
            name: self.name.clone(),
            local_type: self.local_type,
        }
    }
}

/// A converted row plus the cells that had to be nulled
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedRow {
    pub values: Vec<Value>,
    pub nulled: Vec<(usize, ConversionError)>,
}

#[derive(Debug, Clone)]
pub struct RowConverter {
    mapper: TypeMapper,
    capabilities: SinkCapabilities,
}

impl RowConverter {
    pub fn new(mapper: TypeMapper) -> Self {
        let capabilities = mapper.flavor().capabilities();
        Self {
            mapper,
            capabilities,
        }
    }

    pub fn mapper(&self) -> &TypeMapper {
        &self.mapper
    }

    /// Resolve every column once; emits the fallback warning per column
    pub fn plan(&self, columns: &[ColumnDescriptor]) -> Vec<ColumnPlan> {
        columns
            .iter()
            .map(|column| {
                let spec = self.mapper.map_column(column);
                ColumnPlan {
                    name: spec.name,
                    remote_type: column.remote_type.clone(),
                    local_type: spec.local_type,
                    is_fallback: self.mapper.resolve(&column.remote_type).is_fallback,
                }
            })
            .collect()
    }

    /// Convert a cell by its remote type, NULL on failure
    pub fn convert_cell(&self, value: &Value, remote_type: &str) -> Value {
        self.try_convert_cell(value, remote_type)
            .unwrap_or(Value::Null)
    }

    pub fn try_convert_cell(
        &self,
        value: &Value,
        remote_type: &str,
    ) -> Result<Value, ConversionError> {
        self.convert_to(value, self.mapper.map_type(remote_type))
    }

    /// Convert a cell into the representation the sink stores for `local_type`
    pub fn convert_to(&self, value: &Value, local_type: LocalType) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match local_type {
            LocalType::Text => Ok(Value::String(render_text(value))),
            LocalType::Integer => to_integer(value),
            LocalType::Real => to_real(value),
            LocalType::Date => {
                let date = to_date(value)?;
                Ok(if self.capabilities.native_temporal {
                    Value::Date(date)
                } else {
                    Value::String(temporal::format_date(&date))
                })
            }
            LocalType::DateTime => {
                let datetime = to_datetime(value)?;
                Ok(if self.capabilities.native_temporal {
                    Value::DateTime(datetime)
                } else {
                    Value::String(temporal::format_datetime(&datetime))
                })
            }
            LocalType::Boolean => {
                let flag = to_bool(value)?;
                Ok(if self.capabilities.native_boolean {
                    Value::Bool(flag)
                } else {
                    Value::Int64(i64::from(flag))
                })
            }
        }
    }

    /// Convert a row positionally; cells beyond the plan pass through untouched
    pub fn convert_row(&self, row: Vec<Value>, plans: &[ColumnPlan]) -> ConvertedRow {
        let mut nulled = Vec::new();
        let values = row
            .into_iter()
            .enumerate()
            .map(|(index, value)| match plans.get(index) {
                Some(plan) => match self.convert_to(&value, plan.local_type) {
                    Ok(converted) => converted,
                    Err(error) => {
                        nulled.push((index, error));
                        Value::Null
                    }
                },
                None => value,
            })
            .collect();
        ConvertedRow { values, nulled }
    }
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) | Value::Decimal(s) => s.clone(),
        Value::Bytes(b) => hex::encode(b),
        Value::Date(d) => temporal::format_date(d),
        Value::Time(t) => temporal::format_time(t),
        Value::DateTime(dt) => temporal::format_datetime(dt),
        Value::DateTimeUtc(dt) => dt.to_rfc3339(),
        other => other.to_string(),
    }
}

fn to_integer(value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Int64(i) => Ok(Value::Int64(*i)),
        Value::Bool(b) => Ok(Value::Int64(i64::from(*b))),
        Value::Float64(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Ok(Value::Int64(*f as i64)),
        Value::Float64(f) => Err(ConversionError::InvalidNumber {
            value: f.to_string(),
        }),
        Value::Decimal(s) | Value::String(s) => parse_integer(s),
        other => Err(ConversionError::UnexpectedValue {
            kind: other.kind(),
            target: LocalType::Integer,
        }),
    }
}

/// Parse an integral decimal string; a fraction of only zeros is accepted
fn parse_integer(raw: &str) -> Result<Value, ConversionError> {
    let trimmed = raw.trim();
    let integral = match trimmed.split_once('.') {
        Some((whole, fraction)) if fraction.bytes().all(|b| b == b'0') => whole,
        Some(_) => {
            return Err(ConversionError::InvalidNumber {
                value: raw.to_string(),
            });
        }
        None => trimmed,
    };
    let digits = integral
        .strip_prefix('-')
        .or_else(|| integral.strip_prefix('+'))
        .unwrap_or(integral);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConversionError::InvalidNumber {
            value: raw.to_string(),
        });
    }
    integral
        .parse::<i64>()
        .map(Value::Int64)
        .map_err(|_| ConversionError::IntegerOverflow {
            value: raw.to_string(),
        })
}

fn to_real(value: &Value) -> Result<Value, ConversionError> {
    match value {
        Value::Float64(f) => Ok(Value::Float64(*f)),
        Value::Int64(i) => Ok(Value::Float64(*i as f64)),
        Value::Decimal(s) | Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|_| ConversionError::InvalidNumber { value: s.clone() }),
        other => Err(ConversionError::UnexpectedValue {
            kind: other.kind(),
            target: LocalType::Real,
        }),
    }
}

fn to_date(value: &Value) -> Result<chrono::NaiveDate, ConversionError> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date()),
        Value::DateTimeUtc(dt) => Ok(dt.date_naive()),
        Value::String(s) => temporal::parse_date(s)
            .or_else(|| temporal::parse_datetime(s).map(|dt| dt.date()))
            .ok_or_else(|| ConversionError::InvalidTemporal {
                value: s.clone(),
                expected: "date",
            }),
        other => Err(ConversionError::UnexpectedValue {
            kind: other.kind(),
            target: LocalType::Date,
        }),
    }
}

fn to_datetime(value: &Value) -> Result<chrono::NaiveDateTime, ConversionError> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        Value::DateTimeUtc(dt) => Ok(dt.naive_utc()),
        Value::Date(d) => Ok(d.and_time(chrono::NaiveTime::MIN)),
        Value::String(s) => {
            temporal::parse_datetime(s).ok_or_else(|| ConversionError::InvalidTemporal {
                value: s.clone(),
                expected: "timestamp",
            })
        }
        other => Err(ConversionError::UnexpectedValue {
            kind: other.kind(),
            target: LocalType::DateTime,
        }),
    }
}

fn to_bool(value: &Value) -> Result<bool, ConversionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int64(0) => Ok(false),
        Value::Int64(1) => Ok(true),
        Value::Int64(i) => Err(ConversionError::InvalidBoolean {
            value: i.to_string(),
        }),
        Value::Decimal(s) | Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Ok(true),
            "false" | "f" | "no" | "n" | "0" => Ok(false),
            _ => Err(ConversionError::InvalidBoolean { value: s.clone() }),
        },
        other => Err(ConversionError::UnexpectedValue {
            kind: other.kind(),
            target: LocalType::Boolean,
        }),
    }
}

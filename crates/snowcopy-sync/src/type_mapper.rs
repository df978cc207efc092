//! Remote-to-local type mapping
//!
//! Remote type strings are matched by substring in a fixed priority order:
//! text, fixed-point numeric, floating point, timestamp, date, boolean. The
//! first family that matches decides the local type and anything else falls
//! back to TEXT. Mapping never fails.

use serde::{Deserialize, Serialize};
use snowcopy_core::{ColumnDescriptor, LocalColumnSpec, LocalType, SinkFlavor};

/// Widest declared precision stored as INTEGER by default (`i64` holds 18 digits)
pub const DEFAULT_INTEGER_PRECISION_LIMIT: u32 = 18;

const TEXT_MARKERS: &[&str] = &["VARCHAR", "TEXT", "CHAR", "STRING"];
const NUMERIC_MARKERS: &[&str] = &["NUMBER", "DECIMAL", "NUMERIC"];
const INTEGER_NAMES: &[&str] = &["INT", "INTEGER", "BIGINT", "SMALLINT", "TINYINT", "BYTEINT"];
const FLOAT_MARKERS: &[&str] = &["FLOAT", "DOUBLE", "REAL"];
const TIMESTAMP_MARKERS: &[&str] = &["TIMESTAMP", "DATETIME"];

/// What to do with integral numbers wider than `integer_precision_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LargeIntegerPolicy {
    /// Store the canonical decimal string in a TEXT column
    #[default]
    Text,
    /// Declare INTEGER anyway; values outside `i64` become NULL
    Integer,
}

/// Precision and scale read from a type such as `NUMBER(10,2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericParams {
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// A comma was present between the parentheses
    pub has_scale_marker: bool,
    /// Precision text was present but is not a number that fits `u32`
    pub precision_unreadable: bool,
}

impl NumericParams {
    pub fn parse(remote_type: &str) -> Self {
        let Some(open) = remote_type.find('(') else {
            return Self::default();
        };
        let close = remote_type.rfind(')').unwrap_or(remote_type.len());
        if close <= open {
            return Self::default();
        }
        let inner = &remote_type[open + 1..close];
        let mut parts = inner.split(',');
        let precision_part = parts.next().map(str::trim).unwrap_or_default();
        let precision = precision_part.parse().ok();
        let scale_part = parts.next();
        Self {
            precision,
            scale: scale_part.and_then(|s| s.trim().parse().ok()),
            has_scale_marker: scale_part.is_some(),
            precision_unreadable: precision.is_none() && !precision_part.is_empty(),
        }
    }

    /// A scale marker whose scale is not a plain zero
    pub fn is_fractional(&self) -> bool {
        self.has_scale_marker && self.scale != Some(0)
    }
}

/// Result of resolving one remote type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    pub local_type: LocalType,
    /// No family matched and TEXT was chosen
    pub is_fallback: bool,
}

/// Maps remote column types to local column types for one sink flavor
#[derive(Debug, Clone)]
pub struct TypeMapper {
    flavor: SinkFlavor,
    large_integer_policy: LargeIntegerPolicy,
    integer_precision_limit: u32,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new(SinkFlavor::Sqlite)
    }
}

impl TypeMapper {
    pub fn new(flavor: SinkFlavor) -> Self {
        Self {
            flavor,
            large_integer_policy: LargeIntegerPolicy::default(),
            integer_precision_limit: DEFAULT_INTEGER_PRECISION_LIMIT,
        }
    }

    pub fn with_large_integer_policy(mut self, policy: LargeIntegerPolicy) -> Self {
        self.large_integer_policy = policy;
        self
    }

    pub fn with_integer_precision_limit(mut self, limit: u32) -> Self {
        self.integer_precision_limit = limit;
        self
    }

    pub fn flavor(&self) -> SinkFlavor {
        self.flavor
    }

    pub fn large_integer_policy(&self) -> LargeIntegerPolicy {
        self.large_integer_policy
    }

    /// Resolve a remote type string, reporting whether the TEXT fallback was used
    pub fn resolve(&self, remote_type: &str) -> TypeMapping {
        let normalized = remote_type.trim().to_uppercase();
        let base = normalized
            .split('(')
            .next()
            .unwrap_or_default()
            .trim();
        let contains_any = |markers: &[&str]| markers.iter().any(|m| normalized.contains(m));

        let local_type = if contains_any(TEXT_MARKERS) {
            LocalType::Text
        } else if contains_any(NUMERIC_MARKERS) || INTEGER_NAMES.contains(&base) {
            self.numeric_type(&NumericParams::parse(&normalized))
        } else if contains_any(FLOAT_MARKERS) {
            LocalType::Real
        } else if contains_any(TIMESTAMP_MARKERS) {
            LocalType::DateTime
        } else if normalized.contains("DATE") {
            LocalType::Date
        } else if normalized.contains("BOOL") {
            LocalType::Boolean
        } else {
            return TypeMapping {
                local_type: LocalType::Text,
                is_fallback: true,
            };
        };

        TypeMapping {
            local_type,
            is_fallback: false,
        }
    }

    fn numeric_type(&self, params: &NumericParams) -> LocalType {
        if params.is_fractional() {
            return LocalType::Real;
        }
        // an unreadable precision is wider than any limit
        let too_wide = params.precision_unreadable
            || params.precision.is_some_and(|p| p > self.integer_precision_limit);
        if too_wide && self.large_integer_policy == LargeIntegerPolicy::Text {
            LocalType::Text
        } else {
            LocalType::Integer
        }
    }

    /// Local type for a remote type string
    pub fn map_type(&self, remote_type: &str) -> LocalType {
        self.resolve(remote_type).local_type
    }

    /// The `CREATE TABLE` keyword this mapper's sink uses for `remote_type`
    pub fn declaration(&self, remote_type: &str) -> &'static str {
        self.map_type(remote_type).declaration(self.flavor)
    }

    /// Map one column, logging when the TEXT fallback applies
    pub fn map_column(&self, column: &ColumnDescriptor) -> LocalColumnSpec {
        let mapping = self.resolve(&column.remote_type);
        if mapping.is_fallback {
            tracing::warn!(
                column = %column.name,
                remote_type = %column.remote_type,
                "Unknown remote type, falling back to TEXT"
            );
        }
        LocalColumnSpec {
            name: column.name.clone(),
            local_type: mapping.local_type,
        }
    }

    pub fn map_schema(&self, columns: &[ColumnDescriptor]) -> Vec<LocalColumnSpec> {
        columns.iter().map(|c| self.map_column(c)).collect()
    }
}

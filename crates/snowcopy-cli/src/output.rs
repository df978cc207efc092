//! Terminal and JSON rendering for command results

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde_json::json;
use snowcopy_core::{ColumnDescriptor, QueryResult, Value, temporal};
use snowcopy_sync::{SyncReport, TableOutcome, TypeMapper};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(v) => json!(v),
        Value::Int64(v) => json!(v),
        Value::Float64(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Decimal(v) | Value::String(v) => json!(v),
        Value::Bytes(v) => json!(hex::encode(v)),
        Value::Date(v) => json!(temporal::format_date(v)),
        Value::Time(v) => json!(temporal::format_time(v)),
        Value::DateTime(v) => json!(temporal::format_datetime(v)),
        Value::DateTimeUtc(v) => json!(v.to_rfc3339()),
    }
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Bytes(v) => hex::encode(v),
        Value::Date(v) => temporal::format_date(v),
        Value::DateTime(v) => temporal::format_datetime(v),
        other => other.to_string(),
    }
}

pub fn query_table(result: &QueryResult) -> Table {
    let mut table = new_table(result.columns.iter().map(|c| c.name.as_str()).collect());
    for row in &result.rows {
        table.add_row(row.values.iter().map(value_to_cell).collect::<Vec<_>>());
    }
    table
}

pub fn query_json(result: &QueryResult) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| serde_json::Value::Array(row.values.iter().map(value_to_json).collect()))
        .collect();
    json!({
        "columns": result.column_names(),
        "rows": rows,
        "row_count": result.row_count(),
    })
}

/// Remote schema beside the local columns it maps to
pub fn describe_table(columns: &[ColumnDescriptor], mapper: &TypeMapper) -> Table {
    let flavor = mapper.flavor();
    let declaration_header = format!("{} declaration", flavor);
    let mut table = new_table(vec![
        "column",
        "remote type",
        "local type",
        declaration_header.as_str(),
        "fallback",
    ]);
    for column in columns {
        let mapping = mapper.resolve(&column.remote_type);
        table.add_row(vec![
            column.name.clone(),
            column.remote_type.clone(),
            mapping.local_type.as_str().to_string(),
            mapping.local_type.declaration(flavor).to_string(),
            if mapping.is_fallback { "yes" } else { "" }.to_string(),
        ]);
    }
    table
}

pub fn describe_json(table: &str, columns: &[ColumnDescriptor], mapper: &TypeMapper) -> serde_json::Value {
    let flavor = mapper.flavor();
    let columns: Vec<serde_json::Value> = columns
        .iter()
        .map(|column| {
            let mapping = mapper.resolve(&column.remote_type);
            json!({
                "name": column.name,
                "remote_type": column.remote_type,
                "local_type": mapping.local_type.as_str(),
                "declaration": mapping.local_type.declaration(flavor),
                "fallback": mapping.is_fallback,
            })
        })
        .collect();
    json!({ "table": table, "flavor": flavor, "columns": columns })
}

pub fn report_table(report: &SyncReport) -> Table {
    let mut table = new_table(vec!["table", "status", "rows", "fallback columns", "nulled cells", "ms"]);
    for entry in &report.tables {
        let status = match &entry.outcome {
            TableOutcome::Loaded => "loaded".to_string(),
            TableOutcome::Failed { stage, error } => format!("failed before {}: {}", stage, error),
        };
        table.add_row(vec![
            entry.table.clone(),
            status,
            entry.rows_loaded.to_string(),
            entry.fallback_columns.join(", "),
            entry.nulled_cells.to_string(),
            entry.elapsed_ms.to_string(),
        ]);
    }
    table
}

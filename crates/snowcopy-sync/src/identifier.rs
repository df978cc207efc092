//! SQL identifier quoting shared by both sink flavors

/// Quote `name` as a SQL identifier, doubling embedded double quotes.
///
/// SQLite and DuckDB both follow the standard `"..."` form, and quoted
/// identifiers keep the warehouse's upper-case column names intact.
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Comma-separated quoted identifiers
pub fn quote_identifier_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ")
}

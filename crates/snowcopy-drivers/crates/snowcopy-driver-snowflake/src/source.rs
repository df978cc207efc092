//! `WarehouseSource` over the Snowflake SQL API v2

use std::sync::Arc;

use snowcopy_core::{
    ColumnDescriptor, FetchedRows, Result, SnowcopyError, Value, WarehouseSource,
};

use crate::decode::decode_cell;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};
use crate::{RowType, SnowflakeConfig, StatementRequest, StatementResponse};

const STATEMENTS_PATH: &str = "/api/v2/statements";
const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Decoded result of one statement, all partitions concatenated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<RowType>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Index of the column called `name`, ignoring case
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

enum StatementState {
    Complete(StatementResponse),
    Pending(StatementResponse),
}

/// A Snowflake session: one HTTP client plus the statement context.
///
/// Created once per run and shared by every table.
pub struct SnowflakeSource {
    config: SnowflakeConfig,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl SnowflakeSource {
    /// Validate the configuration and build the HTTP client
    pub fn connect(config: SnowflakeConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        tracing::info!(
            account = %config.account,
            warehouse = ?config.warehouse,
            database = ?config.database,
            schema = ?config.schema,
            "Connected Snowflake source"
        );
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: SnowflakeConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let base_url = config.base_url();
        Self {
            config,
            base_url,
            transport,
        }
    }

    pub fn config(&self) -> &SnowflakeConfig {
        &self.config
    }

    /// Run one statement to completion and decode every partition
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    pub fn execute(&self, sql: &str) -> Result<ResultSet> {
        let request_id = uuid::Uuid::new_v4();
        let body = StatementRequest {
            statement: sql.to_string(),
            timeout: self.config.timeout_secs,
            database: self.config.database.clone(),
            schema: self.config.schema.clone(),
            warehouse: self.config.warehouse.clone(),
            role: self.config.role.clone(),
        };
        let request = ApiRequest {
            method: Method::Post,
            url: format!("{}{}?requestId={}", self.base_url, STATEMENTS_PATH, request_id),
            body: Some(serde_json::to_value(&body)?),
        };

        let mut state = interpret_response(self.send(&request)?)?;
        let mut attempts = 0;
        let response = loop {
            match state {
                StatementState::Complete(response) => break response,
                StatementState::Pending(response) => {
                    attempts += 1;
                    if attempts > self.config.max_poll_attempts {
                        return Err(SnowcopyError::Timeout(format!(
                            "statement {} still running after {} polls",
                            response.statement_handle.as_deref().unwrap_or("<unknown>"),
                            self.config.max_poll_attempts
                        )));
                    }
                    let url = self.status_url(&response)?;
                    tracing::debug!(attempt = attempts, url = %url, "Statement still running");
                    std::thread::sleep(self.config.poll_interval());
                    state = interpret_response(self.send(&ApiRequest {
                        method: Method::Get,
                        url,
                        body: None,
                    })?)?;
                }
            }
        };

        self.collect_result(response)
    }

    fn collect_result(&self, response: StatementResponse) -> Result<ResultSet> {
        let metadata = response.result_set_meta_data.ok_or_else(|| {
            SnowcopyError::Remote("statement response has no resultSetMetaData".to_string())
        })?;
        let columns = metadata.row_type;
        let mut raw_rows = response.data;

        let partitions = metadata.partition_info.len();
        if partitions > 1 {
            let handle = response.statement_handle.ok_or_else(|| {
                SnowcopyError::Remote("partitioned result has no statementHandle".to_string())
            })?;
            for partition in 1..partitions {
                tracing::debug!(partition, partitions, "Fetching result partition");
                let request = ApiRequest {
                    method: Method::Get,
                    url: format!(
                        "{}{}/{}?partition={}",
                        self.base_url, STATEMENTS_PATH, handle, partition
                    ),
                    body: None,
                };
                match interpret_response(self.send(&request)?)? {
                    StatementState::Complete(page) => raw_rows.extend(page.data),
                    StatementState::Pending(_) => {
                        return Err(SnowcopyError::Remote(format!(
                            "partition {} of {} is not ready",
                            partition, handle
                        )));
                    }
                }
            }
        }

        let mut rows = Vec::with_capacity(raw_rows.len());
        for (index, raw) in raw_rows.into_iter().enumerate() {
            if raw.len() != columns.len() {
                return Err(SnowcopyError::Remote(format!(
                    "row {} has {} cells, expected {}",
                    index,
                    raw.len(),
                    columns.len()
                )));
            }
            rows.push(
                raw.iter()
                    .zip(&columns)
                    .map(|(cell, column)| decode_cell(cell.as_deref(), column))
                    .collect(),
            );
        }

        tracing::debug!(
            rows = rows.len(),
            columns = columns.len(),
            partitions,
            "Statement result decoded"
        );
        Ok(ResultSet { columns, rows })
    }

    fn status_url(&self, response: &StatementResponse) -> Result<String> {
        if let Some(url) = &response.statement_status_url {
            return Ok(if url.starts_with("http") {
                url.clone()
            } else {
                format!("{}{}", self.base_url, url)
            });
        }
        match &response.statement_handle {
            Some(handle) => Ok(format!("{}{}/{}", self.base_url, STATEMENTS_PATH, handle)),
            None => Err(SnowcopyError::Remote(
                "running statement has neither statementStatusUrl nor statementHandle"
                    .to_string(),
            )),
        }
    }

    /// Send with retries on throttling and server errors
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut retries = MAX_TRANSIENT_RETRIES;
        loop {
            let response = self.transport.send(request)?;
            let transient = response.status == 429 || (500..600).contains(&response.status);
            if transient && retries > 0 {
                retries -= 1;
                tracing::warn!(
                    status = response.status,
                    retries_left = retries,
                    "Transient Snowflake error, retrying"
                );
                std::thread::sleep(self.config.poll_interval());
                continue;
            }
            return Ok(response);
        }
    }
}

fn interpret_response(response: ApiResponse) -> Result<StatementState> {
    let parsed = || -> Result<StatementResponse> {
        if response.body.trim().is_empty() {
            return Ok(StatementResponse::default());
        }
        serde_json::from_str(&response.body).map_err(|e| {
            SnowcopyError::Remote(format!(
                "unreadable response (HTTP {}): {}",
                response.status, e
            ))
        })
    };

    match response.status {
        200 => Ok(StatementState::Complete(parsed()?)),
        202 => Ok(StatementState::Pending(parsed()?)),
        401 | 403 => Err(SnowcopyError::Connection(format!(
            "Snowflake rejected the credentials (HTTP {}): {}",
            response.status,
            error_message(&response.body)
        ))),
        408 => Err(SnowcopyError::Timeout(error_message(&response.body))),
        422 => Err(SnowcopyError::Query(error_message(&response.body))),
        status => Err(SnowcopyError::Remote(format!(
            "HTTP {}: {}",
            status,
            error_message(&response.body)
        ))),
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<StatementResponse>(body) {
        Ok(StatementResponse {
            message: Some(message),
            code,
            ..
        }) => match code {
            Some(code) => format!("{} (code {})", message, code),
            None => message,
        },
        _ => body.chars().take(200).collect(),
    }
}

/// Check that `name` is a plain (optionally qualified) identifier.
///
/// Table names are spliced into `DESCRIBE TABLE`/`SELECT` text, so anything
/// beyond letters, digits, `_` and `$` in up to three dotted parts is refused.
pub fn validate_object_name(name: &str) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = !name.is_empty()
        && parts.len() <= 3
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        });
    if valid {
        Ok(())
    } else {
        Err(SnowcopyError::Configuration(format!(
            "'{}' is not a plain table identifier",
            name
        )))
    }
}

fn cell_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) | Some(Value::Decimal(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

impl WarehouseSource for SnowflakeSource {
    fn source_name(&self) -> &str {
        "snowflake"
    }

    fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        validate_object_name(table)?;
        let result = self.execute(&format!("DESCRIBE TABLE {}", table))?;

        let name_idx = result.column_index("name").unwrap_or(0);
        let type_idx = result.column_index("type").unwrap_or(1);

        let columns = result
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let name = cell_text(row.get(name_idx)).ok_or_else(|| {
                    SnowcopyError::Schema(format!("column {} of {} has no name", index, table))
                })?;
                let remote_type = cell_text(row.get(type_idx)).unwrap_or_default();
                ColumnDescriptor::new(name, &remote_type)
            })
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(SnowcopyError::Schema(format!(
                "DESCRIBE TABLE {} returned no columns",
                table
            )));
        }
        tracing::info!(table = %table, columns = columns.len(), "Described remote table");
        Ok(columns)
    }

    fn select_all(&self, table: &str) -> Result<FetchedRows> {
        validate_object_name(table)?;
        let result = self.execute(&format!("SELECT * FROM {}", table))?;
        let column_names = result.column_names();
        tracing::info!(table = %table, rows = result.rows.len(), "Fetched remote rows");
        Ok(FetchedRows {
            column_names,
            rows: result.rows,
        })
    }
}

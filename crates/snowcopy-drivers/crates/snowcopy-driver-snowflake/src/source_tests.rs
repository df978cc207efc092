//! Statement flow tests against a scripted transport

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use snowcopy_core::{ColumnDescriptor, Result, SnowcopyError, Value, WarehouseSource};

use crate::{ApiRequest, ApiResponse, HttpTransport, Method, SnowflakeConfig, SnowflakeSource};
use crate::validate_object_name;

#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<ApiResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<(u16, &str)>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(status, body)| ApiResponse {
                        status,
                        body: body.to_string(),
                    })
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SnowcopyError::Connection("no scripted response left".to_string()))
    }
}

fn config() -> SnowflakeConfig {
    let mut config = SnowflakeConfig::new("acct", "token")
        .with_warehouse("COMPUTE_WH")
        .with_database("SALES")
        .with_schema("PUBLIC")
        .with_base_url("https://sf.test");
    config.poll_interval_ms = 0;
    config.max_poll_attempts = 3;
    config
}

fn source(transport: Arc<ScriptedTransport>) -> SnowflakeSource {
    SnowflakeSource::with_transport(config(), transport)
}

const DESCRIBE_CUSTOMERS: &str = r#"{
    "code": "090001",
    "statementHandle": "h-describe",
    "resultSetMetaData": {
        "numRows": 3,
        "format": "jsonv2",
        "rowType": [
            {"name": "name", "type": "text"},
            {"name": "type", "type": "text"},
            {"name": "kind", "type": "text"}
        ],
        "partitionInfo": [{"rowCount": 3, "uncompressedSize": 120}]
    },
    "data": [
        ["ID", "NUMBER(10,0)", "COLUMN"],
        ["NAME", "VARCHAR(100)", "COLUMN"],
        ["SIGNUP", "TIMESTAMP_NTZ(9)", "COLUMN"]
    ]
}"#;

const SELECT_CUSTOMERS: &str = r#"{
    "statementHandle": "h-select",
    "resultSetMetaData": {
        "numRows": 1,
        "rowType": [
            {"name": "ID", "type": "fixed", "precision": 10, "scale": 0},
            {"name": "NAME", "type": "text"},
            {"name": "SIGNUP", "type": "timestamp_ntz", "scale": 9}
        ],
        "partitionInfo": [{"rowCount": 1}]
    },
    "data": [["1", "Ada", "1705276800.000000000"]]
}"#;

#[test]
fn test_describe_table_reads_name_and_type_columns() {
    let transport = ScriptedTransport::new(vec![(200, DESCRIBE_CUSTOMERS)]);
    let columns = source(transport.clone()).describe_table("CUSTOMERS").unwrap();

    assert_eq!(
        columns,
        vec![
            ColumnDescriptor::new("ID", "NUMBER(10,0)").unwrap(),
            ColumnDescriptor::new("NAME", "VARCHAR(100)").unwrap(),
            ColumnDescriptor::new("SIGNUP", "TIMESTAMP_NTZ(9)").unwrap(),
        ]
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert!(requests[0].url.starts_with("https://sf.test/api/v2/statements?requestId="));
    let body = requests[0].body.as_ref().unwrap();
    assert_eq!(body["statement"], "DESCRIBE TABLE CUSTOMERS");
    assert_eq!(body["warehouse"], "COMPUTE_WH");
    assert_eq!(body["database"], "SALES");
    assert!(body.get("role").is_none());
}

#[test]
fn test_select_all_decodes_by_row_type() {
    let transport = ScriptedTransport::new(vec![(200, SELECT_CUSTOMERS)]);
    let fetched = source(transport).select_all("CUSTOMERS").unwrap();

    assert_eq!(fetched.column_names, vec!["ID", "NAME", "SIGNUP"]);
    assert_eq!(
        fetched.rows,
        vec![vec![
            Value::Decimal("1".to_string()),
            Value::String("Ada".to_string()),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            ),
        ]]
    );
}

#[test]
fn test_async_execution_is_polled_until_done() {
    let pending = r#"{
        "code": "333334",
        "message": "Asynchronous execution in progress.",
        "statementHandle": "h-select",
        "statementStatusUrl": "/api/v2/statements/h-select"
    }"#;
    let transport = ScriptedTransport::new(vec![
        (202, pending),
        (202, pending),
        (200, SELECT_CUSTOMERS),
    ]);
    let fetched = source(transport.clone()).select_all("CUSTOMERS").unwrap();
    assert_eq!(fetched.len(), 1);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].method, Method::Get);
    assert_eq!(requests[1].url, "https://sf.test/api/v2/statements/h-select");
}

#[test]
fn test_polling_gives_up_after_max_attempts() {
    let pending = r#"{"statementHandle": "h-slow"}"#;
    let transport = ScriptedTransport::new(vec![(202, pending); 5]);
    let err = source(transport).execute("SELECT 1").unwrap_err();
    assert!(matches!(err, SnowcopyError::Timeout(_)), "{}", err);
}

#[test]
fn test_additional_partitions_are_fetched() {
    let first = r#"{
        "statementHandle": "h-big",
        "resultSetMetaData": {
            "rowType": [{"name": "N", "type": "fixed", "scale": 0}],
            "partitionInfo": [{"rowCount": 2}, {"rowCount": 1}, {"rowCount": 1}]
        },
        "data": [["1"], ["2"]]
    }"#;
    let transport = ScriptedTransport::new(vec![
        (200, first),
        (200, r#"{"data": [["3"]]}"#),
        (200, r#"{"data": [[null]]}"#),
    ]);
    let result = source(transport.clone()).execute("SELECT N FROM BIG").unwrap();

    assert_eq!(
        result.rows,
        vec![
            vec![Value::Decimal("1".into())],
            vec![Value::Decimal("2".into())],
            vec![Value::Decimal("3".into())],
            vec![Value::Null],
        ]
    );
    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls[1], "https://sf.test/api/v2/statements/h-big?partition=1");
    assert_eq!(urls[2], "https://sf.test/api/v2/statements/h-big?partition=2");
}

#[test]
fn test_compilation_error_surfaces_message() {
    let transport = ScriptedTransport::new(vec![(
        422,
        r#"{"code": "002003", "message": "SQL compilation error: Table 'NOPE' does not exist"}"#,
    )]);
    let err = source(transport).describe_table("NOPE").unwrap_err();
    match err {
        SnowcopyError::Query(message) => {
            assert!(message.contains("does not exist"), "{}", message);
            assert!(message.contains("002003"), "{}", message);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_auth_failure_is_connection_error() {
    let transport = ScriptedTransport::new(vec![(401, r#"{"message": "bad token"}"#)]);
    let err = source(transport).execute("SELECT 1").unwrap_err();
    assert!(matches!(err, SnowcopyError::Connection(_)), "{}", err);
}

#[test]
fn test_server_errors_are_retried() {
    let transport = ScriptedTransport::new(vec![
        (503, "unavailable"),
        (429, ""),
        (200, SELECT_CUSTOMERS),
    ]);
    let fetched = source(transport.clone()).select_all("CUSTOMERS").unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(transport.requests().len(), 3);
}

#[test]
fn test_row_width_mismatch_is_rejected() {
    let body = r#"{
        "resultSetMetaData": {"rowType": [{"name": "A", "type": "text"}, {"name": "B", "type": "text"}]},
        "data": [["only one"]]
    }"#;
    let transport = ScriptedTransport::new(vec![(200, body)]);
    assert!(source(transport).execute("SELECT A, B FROM T").is_err());
}

#[test]
fn test_describe_rejects_empty_schema() {
    let body = r#"{"resultSetMetaData": {"rowType": [{"name": "name", "type": "text"}, {"name": "type", "type": "text"}]}, "data": []}"#;
    let transport = ScriptedTransport::new(vec![(200, body)]);
    assert!(source(transport).describe_table("EMPTY").is_err());
}

#[test]
fn test_unsafe_table_names_are_refused_before_any_request() {
    let transport = ScriptedTransport::new(vec![]);
    let source = source(transport.clone());
    assert!(source.select_all("T; DROP TABLE X").is_err());
    assert!(source.describe_table("").is_err());
    assert!(transport.requests().is_empty());
}

#[test]
fn test_validate_object_name() {
    assert!(validate_object_name("CUSTOMERS").is_ok());
    assert!(validate_object_name("SALES.PUBLIC.PICKS_2024").is_ok());
    assert!(validate_object_name("_tmp$1").is_ok());
    assert!(validate_object_name("1ABC").is_err());
    assert!(validate_object_name("A..B").is_err());
    assert!(validate_object_name("A.B.C.D").is_err());
    assert!(validate_object_name("\"quoted\"").is_err());
}

//! End-to-end tests of the client surface against scripted connections

use std::sync::Arc;
use std::time::Duration;

use rivven_sql_connector::prelude::*;
use rivven_sql_connector::testing::{MockConnection, MockConnectionFactory};

const EXISTS_PREFIX: &str = "SELECT COUNT(*) AS";
const COUNT_PREFIX: &str = "SELECT COUNT(*) as cnt";
const TABLES_PREFIX: &str = "SELECT `TABLE_NAME`";

fn secrets(driver: &str) -> Vec<(&'static str, String)> {
    vec![
        ("driver", driver.to_string()),
        ("hostname", "db.internal".to_string()),
        ("port", "3306".to_string()),
        ("database", "shop".to_string()),
        ("username", "app".to_string()),
        ("password", "s3cr3t!".to_string()),
    ]
}

fn count_row(column: &str, n: i64) -> Row {
    Row::new(vec![column.to_string()], vec![Value::Int64(n)])
}

fn describe_row(field: &str, native: &str, key: &str) -> Row {
    Row::new(
        vec!["Field".into(), "Type".into(), "Null".into(), "Key".into()],
        vec![
            Value::String(field.into()),
            Value::String(native.into()),
            Value::String("NO".into()),
            Value::String(key.into()),
        ],
    )
}

async fn client_with(factory: &MockConnectionFactory, config: ClientConfig) -> SqlClient {
    let mut registry = DriverRegistry::new();
    registry.register("mysql", Arc::new(factory.clone()));
    registry
        .create_from_source(&StaticCredentialSource::new(secrets("mysql")), config)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_list_and_describe() {
    let conn = MockConnection::new()
        .with_rows(
            TABLES_PREFIX,
            vec![
                Row::new(vec!["TABLE_NAME".into()], vec![Value::String("orders".into())]),
                Row::new(vec!["TABLE_NAME".into()], vec![Value::String("customers".into())]),
            ],
        )
        .with_rows(EXISTS_PREFIX, vec![count_row("cnt", 1)])
        .with_rows(
            "DESCRIBE",
            vec![
                describe_row("id", "bigint unsigned", "PRI"),
                describe_row("total", "decimal(10,2)", ""),
                describe_row("placed_at", "datetime", ""),
                describe_row("note", "json", ""),
            ],
        );
    let factory = MockConnectionFactory::new().with_connection(conn.clone());
    let config = ClientConfig::default().with_release_after_call(false);
    let mut client = client_with(&factory, config).await;

    let entities = client.list_entities().await.unwrap();
    let names: Vec<&str> = entities
        .iter()
        .map(|e| e.entity_identifier.as_str())
        .collect();
    assert_eq!(names, vec!["orders", "customers"]);
    assert!(entities.iter().all(|e| !e.has_nested_entities));

    let fields = client.describe_fields("orders").await.unwrap();
    let summary: Vec<(&str, FieldDataType, bool)> = fields
        .iter()
        .map(|f| (f.field_name.as_str(), f.data_type, f.is_primary_key))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("id", FieldDataType::BigInteger, true),
            ("total", FieldDataType::Double, false),
            ("placed_at", FieldDataType::DateTime, false),
            ("note", FieldDataType::String, false),
        ]
    );
    assert_eq!(factory.connect_count(), 1);
}

#[tokio::test]
async fn test_described_names_round_trip_through_query_and_write() {
    let conn = MockConnection::new()
        .with_rows(EXISTS_PREFIX, vec![count_row("cnt", 1)])
        .with_rows(
            "DESCRIBE",
            vec![
                describe_row("id", "int", "PRI"),
                describe_row("prénom", "varchar(20)", ""),
                describe_row("数量", "int unsigned", ""),
            ],
        )
        .with_rows(
            "SELECT id,prénom,数量",
            vec![Row::new(
                vec!["id".into(), "prénom".into(), "数量".into()],
                vec![
                    Value::Int64(1),
                    Value::String("Zoë".into()),
                    Value::UInt64(3),
                ],
            )],
        );
    let factory = MockConnectionFactory::new().with_connection(conn.clone());
    let config = ClientConfig::default().with_release_after_call(false);
    let mut client = client_with(&factory, config).await;

    let fields = client.describe_fields("personnes").await.unwrap();
    let names: Vec<String> = fields.iter().map(|f| f.field_name.clone()).collect();
    assert_eq!(names, vec!["id", "prénom", "数量"]);
    assert_eq!(fields[1].data_type_label, "varchar(20)");

    let page = client
        .query(&QueryRequest::new("personnes", names.clone()))
        .await
        .unwrap();
    assert_eq!(page.records, vec![r#"{"id":"1","prénom":"Zoë","数量":"3"}"#]);
    assert_eq!(page.next_cursor, None);

    let record = serde_json::json!({ "id": "2", "prénom": "Zoë", "数量": 4 }).to_string();
    let insert = WriteRequest::new("personnes", WriteOperationType::Insert, [record.clone()]);
    assert_eq!(client.write(&insert).await.unwrap(), vec![1]);

    let update = WriteRequest::new("personnes", WriteOperationType::Update, [record])
        .with_id_field("id");
    assert_eq!(client.write(&update).await.unwrap(), vec![1]);

    let statements = conn.statements();
    let written: Vec<&str> = statements
        .iter()
        .map(|(sql, _)| sql.as_str())
        .filter(|sql| !sql.starts_with("SELECT") && !sql.starts_with("DESCRIBE"))
        .collect();
    assert_eq!(
        written,
        vec![
            "INSERT INTO `personnes` (id,prénom,数量) VALUES (?, ?, ?)",
            "UPDATE `personnes` SET id = ?, prénom = ?, 数量 = ? WHERE id = ?",
        ]
    );
}

#[tokio::test]
async fn test_describe_unknown_entity() {
    let conn = MockConnection::new().with_rows(EXISTS_PREFIX, vec![count_row("cnt", 0)]);
    let factory = MockConnectionFactory::new().with_connection(conn.clone());
    let mut client = client_with(&factory, ClientConfig::default()).await;

    let err = client.describe_fields("ghost").await.unwrap_err();
    assert!(matches!(err, Error::EntityNotFound { ref entity } if entity == "ghost"));
    assert!(!conn.executed_sql().iter().any(|sql| sql.starts_with("DESCRIBE")));
    assert!(conn.is_closed());
}

#[tokio::test]
async fn test_describe_rejects_empty_identifier_without_sql() {
    let factory = MockConnectionFactory::new();
    let mut client = client_with(&factory, ClientConfig::default()).await;

    let err = client.describe_fields("").await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(factory
        .opened()
        .iter()
        .all(|conn| conn.executed_sql().is_empty()));
}

#[tokio::test]
async fn test_paging_walks_every_page() {
    let rows: Vec<Row> = (0..1000)
        .map(|i| {
            Row::new(
                vec!["id".into(), "total".into()],
                vec![Value::Int64(i), Value::Null],
            )
        })
        .collect();
    let conn = MockConnection::new()
        .with_rows(COUNT_PREFIX, vec![count_row("cnt", 2500)])
        .with_rows("SELECT id,total", rows);
    let factory = MockConnectionFactory::new().with_connection(conn.clone());
    let config = ClientConfig::default().with_release_after_call(false);
    let mut client = client_with(&factory, config).await;

    let mut request = QueryRequest::new("orders", ["id", "total"]).with_page_size(1000);
    let mut cursors = Vec::new();
    loop {
        let page = client.query(&request).await.unwrap();
        assert_eq!(page.records[0], r#"{"id":"0","total":null}"#);
        match page.next_cursor {
            Some(cursor) => {
                cursors.push(cursor.to_string());
                request = request.with_cursor(cursor.to_string());
            }
            None => break,
        }
    }
    assert_eq!(cursors, vec!["1000", "2000"]);

    let selects: Vec<String> = conn
        .executed_sql()
        .into_iter()
        .filter(|sql| sql.starts_with("SELECT id,total"))
        .collect();
    assert_eq!(
        selects,
        vec![
            "SELECT id,total FROM `orders` LIMIT 0, 1000",
            "SELECT id,total FROM `orders` LIMIT 1000, 1000",
            "SELECT id,total FROM `orders` LIMIT 2000, 1000",
        ]
    );
}

#[tokio::test]
async fn test_bad_cursor_is_rejected() {
    let factory = MockConnectionFactory::new();
    let mut client = client_with(&factory, ClientConfig::default()).await;

    let request = QueryRequest::new("orders", ["id"])
        .with_page_size(10)
        .with_cursor("page-two");
    let err = client.query(&request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_deny_list_policy_blocks_filter() {
    let factory = MockConnectionFactory::new();
    let config = ClientConfig::default().with_filter_policy(FilterPolicy::DenyList);
    let mut client = client_with(&factory, config).await;

    let err = client
        .count("orders", Some("1=1; DROP TABLE orders"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(factory
        .opened()
        .iter()
        .all(|conn| conn.executed_sql().is_empty()));
}

#[tokio::test]
async fn test_filter_passes_through_by_default() {
    let conn = MockConnection::new().with_rows(COUNT_PREFIX, vec![count_row("cnt", 3)]);
    let factory = MockConnectionFactory::new().with_connection(conn.clone());
    let mut client = client_with(&factory, ClientConfig::default()).await;

    let count = client
        .count("orders", Some("status = 'open' AND total > 10"))
        .await
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(
        conn.executed_sql(),
        vec!["SELECT COUNT(*) as cnt FROM `orders` WHERE status = 'open' AND total > 10"]
    );
}

#[tokio::test]
async fn test_update_batch() {
    let conn = MockConnection::new().with_affected_rows(1);
    let factory = MockConnectionFactory::new().with_connection(conn.clone());
    let mut client = client_with(&factory, ClientConfig::default()).await;

    let request = WriteRequest::new(
        "employees",
        WriteOperationType::Update,
        [
            r#"{"id":"1","name":"Ann","age":31}"#,
            r#"{"id":"2","name":"","age":null}"#,
        ],
    )
    .with_id_field("id");
    let affected = client.write(&request).await.unwrap();
    assert_eq!(affected, vec![1, 1]);
    assert_eq!(conn.batch_count(), 1);

    let statements = conn.statements();
    assert_eq!(
        statements[1].0,
        "UPDATE `employees` SET id = ?, name = ?, age = ? WHERE id = ?"
    );
    assert_eq!(
        statements[1].1,
        vec![
            Value::String("2".into()),
            Value::Null,
            Value::Null,
            Value::String("2".into()),
        ]
    );
}

#[tokio::test]
async fn test_connect_failure_surfaces_connection_error() {
    let factory = MockConnectionFactory::new().fail_with("Access denied for user 'app'");
    let mut client = client_with(&factory, ClientConfig::default()).await;

    let err = client.validate_credentials().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connectivity);
    assert_eq!(client.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_connect_timeout() {
    let factory = MockConnectionFactory::new().with_connect_delay(Duration::from_millis(200));
    let config = ClientConfig::default().with_connect_timeout(20);
    let mut client = client_with(&factory, config).await;

    let err = client.validate_credentials().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(!err.to_string().contains("s3cr3t!"));
}

#[tokio::test]
async fn test_invalid_connection_is_replaced() {
    let first = MockConnection::new();
    let second = MockConnection::new();
    let factory = MockConnectionFactory::new()
        .with_connection(first.clone())
        .with_connection(second.clone());
    let config = ClientConfig::default().with_release_after_call(false);
    let mut client = client_with(&factory, config).await;

    client.list_entities().await.unwrap();
    first.set_valid(false);
    client.list_entities().await.unwrap();

    assert_eq!(factory.connect_count(), 2);
    assert!(first.is_closed());
    assert_eq!(second.executed_sql().len(), 1);
}

#[tokio::test]
async fn test_password_reaches_factory_but_not_debug() {
    let factory = MockConnectionFactory::new();
    let mut client = client_with(&factory, ClientConfig::default()).await;
    client.validate_credentials().await.unwrap();

    let options = &factory.seen_options()[0];
    assert_eq!(options.password.expose_secret(), "s3cr3t!");
    assert_eq!(options.host, "db.internal");
    assert_eq!(options.port, 3306);
    assert!(!format!("{:?}", options).contains("s3cr3t!"));
    assert!(!format!("{:?}", client).contains("s3cr3t!"));
}

#[test]
fn test_descriptor_lists_registered_drivers() {
    let mut registry = DriverRegistry::new();
    registry.register("mariadb", Arc::new(MockConnectionFactory::new()));
    registry.register("mysql", Arc::new(MockConnectionFactory::new()));

    let descriptor = describe_configuration(&registry);
    assert_eq!(descriptor.supported_drivers, vec!["mariadb", "mysql"]);
    assert_eq!(
        descriptor.supported_write_operations,
        vec![
            WriteOperationType::Insert,
            WriteOperationType::Update,
            WriteOperationType::Upsert
        ]
    );
}

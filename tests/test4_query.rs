use std::time::Duration;

use mysql_middleware::prelude::*;
use mysql_middleware::test_utils::{FakeDriver, single_column_rows, test_options};

fn rows() -> ResultSet {
    single_column_rows("title", vec![RowValues::Text("a".into()), RowValues::Text("b".into())])
}

#[tokio::test]
async fn query_returns_driver_rows() {
    let driver = FakeDriver::new();
    driver.set_rows(rows());
    let manager = ConnectionManager::new(test_options(false), driver.as_driver());

    let rs = manager.query("SELECT title FROM posts", false).await.unwrap();
    let titles: Vec<_> = rs
        .iter()
        .filter_map(|row| row.get("title").and_then(RowValues::as_text))
        .collect();
    assert_eq!(titles, ["a", "b"]);

    let sent = driver.queries();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sql, "SELECT title FROM posts");
    assert_eq!(sent[0].nest_tables, NestTables::Off);
    assert_eq!(sent[0].timeout, None);
}

#[tokio::test]
async fn nest_tables_and_timeout_reach_the_driver() {
    let driver = FakeDriver::new();
    let options = MysqlOptions::builder()
        .timeout(Duration::from_millis(1500))
        .finish();
    let manager = ConnectionManager::new(options, driver.as_driver());

    manager.query("SELECT 1", true).await.unwrap();
    manager.query("SELECT 2", "_").await.unwrap();

    let sent = driver.queries();
    assert_eq!(sent[0].nest_tables, NestTables::ByTable);
    assert_eq!(sent[1].nest_tables, NestTables::Separator("_".into()));
    assert!(sent.iter().all(|r| r.timeout == Some(Duration::from_millis(1500))));
}

#[tokio::test]
async fn execute_behaves_like_query() {
    let driver = FakeDriver::new();
    driver.set_rows(rows());
    let manager = ConnectionManager::new(test_options(false), driver.as_driver());

    let via_query = manager.query("SELECT title FROM posts", false).await.unwrap();
    let via_execute = manager.execute("SELECT title FROM posts", false).await.unwrap();

    assert_eq!(via_query.len(), via_execute.len());
    assert_eq!(
        via_query.results[1].get("title"),
        via_execute.results[1].get("title")
    );
    assert_eq!(driver.connects(), 1);
    assert_eq!(driver.queries().len(), 2);
}

#[tokio::test]
async fn query_error_is_the_driver_error_and_keeps_the_connection() {
    let driver = FakeDriver::new();
    let manager = ConnectionManager::new(test_options(false), driver.as_driver());
    let driver_err =
        DriverError::new("You have an error in your SQL syntax").with_code("1064");
    driver.fail_query(Some(driver_err.clone()));

    let err = manager.query("SELEC 1", false).await.unwrap_err();
    assert_eq!(err.to_string(), driver_err.to_string());
    match &err {
        SqlMiddlewareDbError::QueryError { sql, source } => {
            assert_eq!(sql, "SELEC 1");
            assert_eq!(source.code(), Some("1064"));
            assert_eq!(source.message(), "You have an error in your SQL syntax");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(driver.connection_ends(), 0);

    driver.fail_query(None);
    manager.query("SELECT 1", false).await.unwrap();
    assert_eq!(driver.connects(), 1);
}

#[tokio::test]
async fn connection_failure_surfaces_from_query() {
    let driver = FakeDriver::new();
    driver.fail_connect(Some(DriverError::new("Access denied").with_code("1045")));
    let manager = ConnectionManager::new(test_options(false), driver.as_driver());

    let err = manager.query("SELECT 1", false).await.unwrap_err();
    assert!(matches!(err, SqlMiddlewareDbError::ConnectionError { .. }));
    assert!(driver.queries().is_empty());
}

#[tokio::test]
async fn batch_mode_closes_after_each_query() {
    let driver = FakeDriver::new();
    driver.set_rows(rows());
    let manager = ConnectionManager::with_execution_mode(
        test_options(false),
        driver.as_driver(),
        ExecutionMode::Batch,
    );

    let rs = manager.query("SELECT title FROM posts", false).await.unwrap();
    assert_eq!(rs.len(), 2);
    assert_eq!(driver.connection_ends(), 1);
    assert_eq!(manager.state(), ConnectionState::Unconnected);

    manager.query("SELECT title FROM posts", false).await.unwrap();
    assert_eq!(driver.connects(), 2);
    assert_eq!(driver.connection_ends(), 2);
}

#[tokio::test]
async fn batch_mode_ends_the_pool() {
    let driver = FakeDriver::new();
    let manager = ConnectionManager::with_execution_mode(
        test_options(true),
        driver.as_driver(),
        ExecutionMode::Batch,
    );

    manager.query("SELECT 1", false).await.unwrap();
    assert_eq!(driver.pool_ends(), 1);
    assert_eq!(manager.state(), ConnectionState::Unconnected);
}

#[tokio::test]
async fn batch_mode_keeps_rows_when_close_fails() {
    let driver = FakeDriver::new();
    driver.set_rows(rows());
    driver.fail_end(Some(DriverError::new("socket already closed")));
    let manager = ConnectionManager::with_execution_mode(
        test_options(false),
        driver.as_driver(),
        ExecutionMode::Batch,
    );

    let rs = manager.query("SELECT title FROM posts", false).await.unwrap();
    assert_eq!(rs.len(), 2);
    assert_eq!(manager.state(), ConnectionState::Unconnected);
}

#[tokio::test]
async fn batch_mode_leaves_connection_open_after_a_failed_query() {
    let driver = FakeDriver::new();
    driver.fail_query(Some(DriverError::new("Table 'shop.nope' doesn't exist")));
    let manager = ConnectionManager::with_execution_mode(
        test_options(false),
        driver.as_driver(),
        ExecutionMode::Batch,
    );

    assert!(manager.query("SELECT * FROM nope", false).await.is_err());
    assert_eq!(driver.connection_ends(), 0);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn builder_can_select_batch_mode() {
    let driver = FakeDriver::new();
    let manager = MysqlOptions::builder()
        .user("tester")
        .execution_mode(ExecutionMode::Batch)
        .build(driver.as_driver());
    assert_eq!(manager.execution_mode(), ExecutionMode::Batch);

    manager.query("SELECT 1", false).await.unwrap();
    assert_eq!(driver.connection_ends(), 1);
    assert_eq!(manager.state(), ConnectionState::Unconnected);
}

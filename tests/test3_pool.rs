use std::time::Duration;

use mysql_middleware::prelude::*;
use mysql_middleware::test_utils::{FakeDriver, test_options};

fn pooled_manager(driver: &FakeDriver) -> ConnectionManager {
    ConnectionManager::new(test_options(true), driver.as_driver())
}

#[tokio::test]
async fn pool_is_created_once_and_lent_per_call() {
    let driver = FakeDriver::new();
    let manager = pooled_manager(&driver);
    assert_eq!(manager.mode(), ConnectionMode::Pooled);
    assert_eq!(driver.pools_created(), 0);

    let first = manager.get_connection().await.unwrap();
    let second = manager.get_connection().await.unwrap();

    assert!(first.is_pooled());
    assert!(!first.same_connection(&second));
    assert_eq!(driver.pools_created(), 1);
    assert_eq!(driver.acquisitions(), 2);
    assert_eq!(driver.connects(), 0);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn concurrent_acquisitions_are_deduplicated() {
    let driver = FakeDriver::new();
    driver.set_connect_delay(Duration::from_millis(30));
    let manager = pooled_manager(&driver);

    let (a, b) = tokio::join!(manager.get_connection(), manager.get_connection());
    assert!(a.unwrap().same_connection(&b.unwrap()));
    assert_eq!(driver.pools_created(), 1);
    assert_eq!(driver.acquisitions(), 1);
}

#[tokio::test]
async fn failed_acquisition_ends_the_pool() {
    let driver = FakeDriver::new();
    driver.fail_acquire(Some(
        DriverError::new("Too many connections").with_code("1040"),
    ));
    let manager = pooled_manager(&driver);

    let err = manager.get_connection().await.unwrap_err();
    assert!(matches!(err, SqlMiddlewareDbError::ConnectionError { .. }));
    assert_eq!(err.driver_error().and_then(DriverError::code), Some("1040"));
    assert_eq!(driver.pool_ends(), 1);
    assert_eq!(manager.state(), ConnectionState::Unconnected);

    // a fresh pool is built on the next call, still in pooled mode
    driver.fail_acquire(None);
    let handle = manager.get_connection().await.unwrap();
    assert!(handle.is_pooled());
    assert_eq!(driver.pools_created(), 2);
    assert_eq!(manager.mode(), ConnectionMode::Pooled);
}

#[tokio::test]
async fn pool_creation_failure_is_a_connection_error() {
    let driver = FakeDriver::new();
    driver.fail_create_pool(Some(DriverError::new("bad pool options")));
    let manager = pooled_manager(&driver);

    let err = manager.get_connection().await.unwrap_err();
    assert!(matches!(err, SqlMiddlewareDbError::ConnectionError { .. }));
    assert_eq!(driver.pools_created(), 0);
    assert_eq!(manager.state(), ConnectionState::Unconnected);
}

#[tokio::test]
async fn close_ends_the_pool_once() {
    let driver = FakeDriver::new();
    let manager = pooled_manager(&driver);
    manager.query("SELECT 1", false).await.unwrap();

    manager.close().await.unwrap();
    manager.close().await.unwrap();

    assert_eq!(driver.pool_ends(), 1);
    assert_eq!(driver.connection_ends(), 0);
    assert_eq!(manager.state(), ConnectionState::Unconnected);
}

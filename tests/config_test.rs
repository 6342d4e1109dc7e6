use std::time::Duration;

use asyncq::Error;
use asyncq::config::{Config, QueueConfig};

const QUEUE_VARS: [&str; 4] = [
    "ASYNCQ_CONCURRENCY_LIMIT",
    "ASYNCQ_KEEP_ALIVE",
    "ASYNCQ_IDLE_CHECK_MS",
    "ASYNCQ_DRAIN_POLL_MS",
];

// Env-based checks share process state, so they run in one test.
#[test]
fn queue_config_from_env() {
    unsafe {
        for var in QUEUE_VARS {
            std::env::remove_var(var);
        }
    }
    assert_eq!(QueueConfig::from_env().unwrap(), QueueConfig::default());

    unsafe {
        std::env::set_var("ASYNCQ_CONCURRENCY_LIMIT", "4");
        std::env::set_var("ASYNCQ_KEEP_ALIVE", "true");
        std::env::set_var("ASYNCQ_IDLE_CHECK_MS", "250");
    }
    let config = QueueConfig::from_env().unwrap();
    assert_eq!(config.concurrency_limit.get(), 4);
    assert!(config.keep_alive);
    assert_eq!(config.idle_check_interval, Duration::from_millis(250));
    assert_eq!(config.drain_poll_interval, Duration::from_millis(150));

    let process = Config::from_env().unwrap();
    assert_eq!(process.queue, config);
    assert!(!process.log_level.is_empty());

    unsafe {
        std::env::set_var("ASYNCQ_CONCURRENCY_LIMIT", "0");
    }
    assert!(matches!(QueueConfig::from_env(), Err(Error::Config(_))));

    unsafe {
        std::env::set_var("ASYNCQ_CONCURRENCY_LIMIT", "many");
    }
    assert!(matches!(QueueConfig::from_env(), Err(Error::Config(_))));

    unsafe {
        for var in QUEUE_VARS {
            std::env::remove_var(var);
        }
    }
}

#[test]
fn queue_config_defaults() {
    let config = QueueConfig::default();
    assert_eq!(config.concurrency_limit.get(), 1);
    assert!(!config.keep_alive);
    assert_eq!(config.idle_check_interval, Duration::from_millis(500));
    assert_eq!(config.drain_poll_interval, Duration::from_millis(150));
}

#[test]
fn queue_config_from_toml() {
    let config = QueueConfig::from_toml_str(
        r#"
        [queue]
        concurrency_limit = 3
        keep_alive = true
        drain_poll_ms = 50
        "#,
    )
    .unwrap();

    assert_eq!(config.concurrency_limit.get(), 3);
    assert!(config.keep_alive);
    assert_eq!(config.drain_poll_interval, Duration::from_millis(50));
    assert_eq!(config.idle_check_interval, Duration::from_millis(500));
}

#[test]
fn empty_toml_uses_defaults() {
    assert_eq!(QueueConfig::from_toml_str("").unwrap(), QueueConfig::default());
}

#[test]
fn toml_rejects_zero_limit_and_unknown_keys() {
    let zero = QueueConfig::from_toml_str("[queue]\nconcurrency_limit = 0\n");
    assert!(matches!(zero, Err(Error::Config(_))));

    let unknown = QueueConfig::from_toml_str("[queue]\nparallelism = 2\n");
    assert!(matches!(unknown, Err(Error::Config(_))));
}

// tests/integration/config_test.rs

//! Loading configuration files from disk.

use mudbridge::config::Config;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_file_is_loaded() {
    let file = write_config(
        r#"
        address = "0.0.0.0:8443"
        log_level = "debug"

        [backend]
        address = "mud.example.org:4000"
        connect_timeout = "3s"

        [websocket]
        max_message_size = 4096
        write_wait = "5s"
        pong_wait = "30s"
        ping_period = "20s"
        close_grace_period = "2s"
        home_page = "/srv/www/index.html"

        [metrics]
        enabled = true
        port = 9100
        "#,
    );

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.bind_port().unwrap(), 8443);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.backend.address, "mud.example.org:4000");
    assert_eq!(config.backend.connect_timeout, Duration::from_secs(3));
    assert_eq!(config.websocket.max_message_size, 4096);
    assert_eq!(config.websocket.write_wait, Duration::from_secs(5));
    assert_eq!(config.websocket.pong_wait, Duration::from_secs(30));
    assert_eq!(config.websocket.ping_period, Duration::from_secs(20));
    assert_eq!(config.websocket.close_grace_period, Duration::from_secs(2));
    assert_eq!(config.websocket.home_page, "/srv/www/index.html");
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9100);
}

#[test]
fn test_partial_config_file_keeps_defaults() {
    let file = write_config(
        r#"
        [backend]
        address = "10.0.0.5:23"
        "#,
    );

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    let defaults = Config::default();

    assert_eq!(config.backend.address, "10.0.0.5:23");
    assert_eq!(config.address, defaults.address);
    assert_eq!(config.websocket, defaults.websocket);
    assert_eq!(config.metrics, defaults.metrics);
}

#[test]
fn test_missing_file_names_the_path() {
    let err = Config::from_file("/nonexistent/mudbridge.toml").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/mudbridge.toml"));
}

#[test]
fn test_invalid_values_are_rejected_with_the_file_named() {
    let file = write_config(
        r#"
        [websocket]
        max_message_size = 0
        "#,
    );
    let path = file.path().to_str().unwrap().to_string();

    let err = Config::from_file(&path).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains(&path));
    assert!(message.contains("max_message_size"));
}

#[test]
fn test_malformed_durations_are_rejected() {
    let file = write_config(
        r#"
        [websocket]
        pong_wait = "soon"
        "#,
    );
    assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
}

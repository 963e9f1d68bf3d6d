//! Tests for run configuration loading and defaults.

use std::time::Duration;

use ghwatch::config::load_run_config;

#[test]
fn parse_complete_config() {
    let toml_content = r#"
[message_types]
alert_with_details = true

[probe]
max_attempts = 5
retry_delay_secs = 2
request_timeout_secs = 10
workers = 16
api_base = "https://github.example.com/api/v3"
token_env = "GHE_TOKEN"

[notify]
webhook_env = "ALERTS_WEBHOOK"
title = "Roster check"
"#;

    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("ghwatch.toml");
    std::fs::write(&config_path, toml_content).expect("write");

    let config = load_run_config(&config_path).expect("parse config");

    assert!(config.message_types.alert_with_details);
    assert_eq!(config.probe.max_attempts, 5);
    assert_eq!(config.probe.retry_delay(), Duration::from_secs(2));
    assert_eq!(config.probe.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.probe.worker_count(), 16);
    assert_eq!(config.probe.api_base, "https://github.example.com/api/v3");
    assert_eq!(config.probe.token_env, "GHE_TOKEN");
    assert_eq!(config.notify.webhook_env, "ALERTS_WEBHOOK");
    assert_eq!(config.notify.title, "Roster check");
}

#[test]
fn parse_minimal_config_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("ghwatch.toml");
    std::fs::write(&config_path, "").expect("write");

    let config = load_run_config(&config_path).expect("parse empty config");

    assert!(!config.message_types.alert_with_details);
    assert_eq!(config.probe.max_attempts, 3);
    assert_eq!(config.probe.retry_delay_secs, 5);
    assert_eq!(config.probe.request_timeout_secs, 30);
    assert!(config.probe.workers.is_none());
    assert_eq!(config.probe.api_base, "https://api.github.com");
    assert_eq!(config.probe.token_env, "GITHUB_TOKEN");
    assert_eq!(config.notify.webhook_env, "DISCORD_WEBHOOK_URL");
    assert_eq!(config.notify.title, "GitHub Account Status");
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_run_config(&dir.path().join("absent.toml")).expect_err("should fail");
    assert!(err.to_string().contains("failed to read config"));
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("ghwatch.toml");
    std::fs::write(&config_path, "[probe\nmax_attempts = ").expect("write");

    let err = load_run_config(&config_path).expect_err("should fail");
    assert!(err.to_string().contains("failed to parse config"));
}

#[test]
fn out_of_range_values_fail_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("ghwatch.toml");

    for bad in [
        "[probe]\nmax_attempts = 0\n",
        "[probe]\nmax_attempts = 11\n",
        "[probe]\nworkers = 0\n",
        "[probe]\nrequest_timeout_secs = 0\n",
        "[probe]\napi_base = \"ftp://example.com\"\n",
        "[probe]\napi_base = \"not a url\"\n",
        "[notify]\nwebhook_env = \"\"\n",
    ] {
        std::fs::write(&config_path, bad).expect("write");
        assert!(
            load_run_config(&config_path).is_err(),
            "config should be rejected: {bad}"
        );
    }
}

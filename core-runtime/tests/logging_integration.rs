//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    default_filter_directives, init_logging, redact_if_sensitive, redact_url_secret, LogFormat,
    LoggingConfig,
};

#[test]
fn test_logging_initialization_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    // Only one global subscriber per process; this is the only test that installs one.
    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_redaction_of_credentials() {
    assert_eq!(redact_if_sensitive("access_token", "tok"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("secret", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("password", "pw"), "[REDACTED]");
}

#[test]
fn test_redaction_leaves_identifiers() {
    assert_eq!(redact_if_sensitive("connection_id", "conn-1"), "conn-1");
    assert_eq!(redact_if_sensitive("external_id", "76979871"), "76979871");
    assert_eq!(redact_if_sensitive("event_type", "video.deleted"), "video.deleted");
}

#[test]
fn test_callback_url_secret_is_hidden() {
    let url = "https://hooks.example.com/api/vimeo/webhook?connectionId=conn%201&secret=deadbeef";
    let redacted = redact_url_secret(url);

    assert!(!redacted.contains("deadbeef"));
    assert!(redacted.starts_with("https://hooks.example.com/api/vimeo/webhook?"));
    assert!(redacted.contains("connectionId=conn"));
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_filter_configuration() {
    let config = LoggingConfig::default().with_filter("core_sync=trace,provider_vimeo=debug");
    assert_eq!(
        config.filter,
        Some("core_sync=trace,provider_vimeo=debug".to_string())
    );

    let defaults = default_filter_directives(LogLevel::Info);
    assert!(defaults.starts_with("warn,"));
    assert!(defaults.contains("core_catalog=info"));
    assert!(defaults.contains("hyper=warn"));
}

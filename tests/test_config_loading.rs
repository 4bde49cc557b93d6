//! Integration tests for configuration loading

use http_ranger::{RangeError, RangerConfig, RequestTemplate};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
request_timeout_secs: 60
connect_timeout_secs: 5
validate_last_modified: true
user_agent: "http-ranger/0.1"
headers:
  authorization: "Bearer abc"
  x-trace: "1"
"#,
    );

    let config = RangerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.request_timeout_secs, 60);
    assert_eq!(config.connect_timeout_secs, 5);
    assert!(config.validate_last_modified);
    assert_eq!(config.headers.len(), 2);

    let template = RequestTemplate::from_config("http://example.com/f", &config).unwrap();
    assert_eq!(template.url().as_str(), "http://example.com/f");
}

#[test]
fn test_load_empty_mapping_uses_defaults() {
    let file = write_config("{}\n");
    let config = RangerConfig::from_file(file.path()).unwrap();
    assert_eq!(config, RangerConfig::default());
}

#[test]
fn test_reject_zero_connect_timeout() {
    let file = write_config("connect_timeout_secs: 0\n");
    let result = RangerConfig::from_file(file.path());
    assert!(matches!(result, Err(RangeError::ConfigError(_))));
}

#[test]
fn test_reject_precondition_header() {
    let file = write_config("headers:\n  If-Match: \"*\"\n");
    let result = RangerConfig::from_file(file.path());
    assert!(matches!(result, Err(RangeError::ConfigError(_))));
}

#[test]
fn test_reject_unparseable_header_value() {
    let mut config = RangerConfig::default();
    config
        .headers
        .insert("x-bad".to_string(), "line\nbreak".to_string());
    let result = RequestTemplate::from_config("http://example.com/f", &config);
    assert!(matches!(result, Err(RangeError::InvalidRequest(_))));
}

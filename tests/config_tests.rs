//! Config loading and TOML parsing tests.

use inferox::Config;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_default_engine_settings() {
    let config = Config::default();
    assert_eq!(config.engine.max_rounds, 10);
    assert_eq!(config.engine.iteration_limit, 100);
    assert!(!config.engine.debug_diff);
    assert!(!config.engine.lenient_builtins);
}

#[test]
fn test_default_cache_settings() {
    let config = Config::default();
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.dir, PathBuf::from("/tmp"));
}

#[test]
fn test_default_logging_settings() {
    let config = Config::default();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_load_config_from_toml() {
    let temp = TempDir::new().expect("tempdir");
    let config_path = temp.path().join("inferox.toml");

    let config_content = r#"
[engine]
max_rounds = 25
iteration_limit = 500
debug_diff = true
lenient_builtins = true

[cache]
enabled = true
dir = "/var/cache/inferox"

[logging]
level = "debug"
format = "json"
"#;
    fs::write(&config_path, config_content).expect("write");

    let config = Config::from_file(config_path.to_str().expect("utf8 path")).expect("loads");

    assert_eq!(config.engine.max_rounds, 25);
    assert_eq!(config.engine.iteration_limit, 500);
    assert!(config.engine.debug_diff);
    assert!(config.engine.lenient_builtins);
    assert!(config.cache.enabled);
    assert_eq!(config.cache.dir, PathBuf::from("/var/cache/inferox"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_partial_config_keeps_defaults() {
    let temp = TempDir::new().expect("tempdir");
    let config_path = temp.path().join("inferox.toml");
    fs::write(&config_path, "[engine]\nmax_rounds = 3\n").expect("write");

    let config = Config::from_file(config_path.to_str().expect("utf8 path")).expect("loads");
    assert_eq!(config.engine.max_rounds, 3);
    assert_eq!(config.engine.iteration_limit, 100);
    assert!(!config.cache.enabled);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let config = Config::from_file("/nonexistent/inferox.toml").expect("defaults");
    assert_eq!(config.engine.max_rounds, 10);
}

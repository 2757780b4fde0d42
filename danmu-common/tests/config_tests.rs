//! Tests for config file resolution and loading
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate DANMU_CONFIG are marked with #[serial].

use danmu_common::config::{
    load_config, resolve_config_path, ConfigOrigin, DatabaseConfig, DatabaseKind, TomlConfig,
    CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

const MYSQL_CONFIG: &str = r#"
[database]
type = "mysql"
host = "db.internal"
port = 3307
user = "recorder"
password = "secret"
database = "acfun"

[ingest]
utc_offset_hours = 9

[logging]
level = "debug"
"#;

#[test]
#[serial]
fn test_cli_path_beats_environment() {
    let temp_dir = TempDir::new().unwrap();
    let cli = temp_dir.path().join("cli.toml");
    env::set_var(CONFIG_ENV_VAR, temp_dir.path().join("env.toml"));

    let (path, origin) = resolve_config_path(Some(cli.as_path())).unwrap();
    assert_eq!(path, cli);
    assert_eq!(origin, ConfigOrigin::CommandLine);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_path_used_without_cli() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("env.toml");
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let (path, origin) = resolve_config_path(None).unwrap();
    assert_eq!(path, env_path);
    assert_eq!(origin, ConfigOrigin::Environment);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_environment_value_ignored() {
    env::set_var(CONFIG_ENV_VAR, "");

    if let Some((_, origin)) = resolve_config_path(None) {
        // Only a config installed on this machine can be found now
        assert_eq!(origin, ConfigOrigin::Discovered);
    }

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_load_config_from_environment_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, MYSQL_CONFIG).unwrap();
    env::set_var(CONFIG_ENV_VAR, &path);

    let loaded = load_config(None).unwrap();
    assert_eq!(loaded.source, Some((path.clone(), ConfigOrigin::Environment)));

    let config = loaded.config;
    let db = config.database.expect("database section");
    assert_eq!(db.kind, DatabaseKind::Mysql);
    assert_eq!(db.host, "db.internal");
    assert_eq!(db.port, 3307);
    assert_eq!(db.user, "recorder");
    assert_eq!(config.ingest.utc_offset_hours, 9);
    assert_eq!(config.ingest.start_time_scan_lines, 50);
    assert_eq!(config.logging.level, "debug");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_load_config_reports_cli_source() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

    let loaded = load_config(Some(path.as_path())).unwrap();
    assert_eq!(loaded.source, Some((path, ConfigOrigin::CommandLine)));
    assert_eq!(loaded.config.logging.level, "warn");
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    assert!(load_config(Some(missing.as_path())).is_err());
}

#[test]
fn test_sqlite_section_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        [database]
        type = "sqlite"
        "#,
    )
    .unwrap();

    let db = config.database.unwrap();
    assert_eq!(db.kind, DatabaseKind::Sqlite);
    assert_eq!(db.sqlite_file.to_str(), Some("danmu.db"));
    assert!(db.name_history);
    assert_eq!(config.ingest.utc_offset_hours, 8);
}

#[test]
fn test_name_history_can_be_disabled() {
    let config = TomlConfig::from_toml_str(
        r#"
        [database]
        type = "sqlite"
        name_history = false
        "#,
    )
    .unwrap();
    assert!(!config.database.unwrap().name_history);
}

#[test]
fn test_sqlite_override_keeps_history() {
    let db = DatabaseConfig::sqlite("/tmp/override.db");
    assert_eq!(db.kind, DatabaseKind::Sqlite);
    assert!(db.name_history);
}

#[test]
fn test_malformed_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    fs::write(&path, "[database\ntype = ").unwrap();

    assert!(TomlConfig::from_file(&path).is_err());
}

#[test]
fn test_unknown_backend_rejected() {
    let result = TomlConfig::from_toml_str(
        r#"
        [database]
        type = "postgres"
        "#,
    );
    assert!(result.is_err());
}

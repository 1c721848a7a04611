use relmap_core::config::PROFILE_ENV;
use relmap_core::{ConfigError, ConfigProperties, ConfigValue, MapperConfig, RelmapConfig};
use relmap_data::{BindMode, DatabaseEngine};
use serial_test::serial;
use std::fs;

#[test]
fn test_empty_config() {
    let config = RelmapConfig::empty();
    assert!(matches!(
        config.get::<String>("nonexistent"),
        Err(ConfigError::NotFound(_))
    ));
}

#[test]
fn test_set_and_get() {
    let mut config = RelmapConfig::empty();
    config.set("relmap.engine", ConfigValue::String("mysql".into()));
    assert_eq!(config.get::<String>("relmap.engine").unwrap(), "mysql");
}

#[test]
fn test_get_or_default_and_mismatch() {
    let mut config = RelmapConfig::empty();
    assert_eq!(config.get_or("missing", 42i64).unwrap(), 42);

    config.set("relmap.cache.enabled", ConfigValue::String("maybe".into()));
    assert!(matches!(
        config.get_or("relmap.cache.enabled", true),
        Err(ConfigError::TypeMismatch { expected: "bool", .. })
    ));
}

#[test]
fn test_flatten_yaml() {
    let yaml = r#"
relmap:
  engine: postgresql
  cache:
    memory_limit_mb: 512
  replicas:
    urls:
      - "sqlite://a.db"
      - "sqlite://b.db"
"#;
    let config = RelmapConfig::from_yaml_str(yaml, "test").unwrap();
    assert_eq!(config.get::<String>("relmap.engine").unwrap(), "postgresql");
    assert_eq!(config.get::<u64>("relmap.cache.memory_limit_mb").unwrap(), 512);
    assert_eq!(
        config.get::<Vec<String>>("relmap.replicas.urls").unwrap(),
        vec!["sqlite://a.db", "sqlite://b.db"]
    );
    assert_eq!(config.get::<String>("relmap.replicas.urls.1").unwrap(), "sqlite://b.db");
}

#[test]
fn test_mapper_section_defaults() {
    let config = RelmapConfig::empty();
    let mapper: MapperConfig = config.section().unwrap();
    assert_eq!(mapper, MapperConfig::default());
    assert_eq!(mapper.engine, DatabaseEngine::Sqlite);
    assert!(mapper.cache.enabled);
    assert!(mapper.replicas.urls.is_empty());
}

#[test]
fn test_mapper_section_from_yaml() {
    let yaml = r#"
relmap:
  engine: sqlserver
  read_uncommitted: true
  binding: bound
  cache:
    enabled: false
  replicas:
    urls: ["sqlite://replica.db"]
    workers: 3
"#;
    let config = RelmapConfig::from_yaml_str(yaml, "test").unwrap();
    let mapper = MapperConfig::from_config(&config).unwrap();
    assert_eq!(mapper.engine, DatabaseEngine::SqlServer);
    assert_eq!(mapper.binding, BindMode::Bound);
    assert!(!mapper.cache.enabled);
    assert_eq!(mapper.replicas.workers, 3);
    assert_eq!(mapper.replicas.queue_capacity, 64);

    let options = mapper.compose_options();
    assert_eq!(options.engine, DatabaseEngine::SqlServer);
    assert_eq!(options.binding, BindMode::Bound);
    assert!(options.read_uncommitted);
}

#[test]
fn test_unknown_engine_is_invalid() {
    let config = RelmapConfig::from_yaml_str("relmap:\n  engine: oracle\n", "test").unwrap();
    match MapperConfig::from_config(&config) {
        Err(ConfigError::Invalid { key, message }) => {
            assert_eq!(key, "relmap.engine");
            assert!(message.contains("oracle"));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_metadata_lists_every_key() {
    let keys: Vec<String> = MapperConfig::properties_metadata()
        .iter()
        .map(|m| m.full_key(MapperConfig::prefix()))
        .collect();
    assert!(keys.contains(&"relmap.cache.memory_limit_mb".to_string()));
    assert!(keys.contains(&"relmap.replicas.queue_capacity".to_string()));
    assert!(MapperConfig::missing_keys(&RelmapConfig::empty()).is_empty());
}

#[test]
fn test_invalid_yaml_is_load_error() {
    assert!(matches!(
        RelmapConfig::from_yaml_str("relmap: [unclosed", "test"),
        Err(ConfigError::Load(_))
    ));
}

#[test]
#[serial]
fn test_profile_file_overrides_base() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("relmap.yaml"),
        "relmap:\n  engine: mysql\n  cache:\n    memory_limit_mb: 100\n",
    )
    .unwrap();
    fs::write(dir.path().join("relmap-prod.yaml"), "relmap:\n  engine: postgresql\n").unwrap();

    std::env::remove_var(PROFILE_ENV);
    let config = RelmapConfig::load_from(dir.path(), "prod").unwrap();
    assert_eq!(config.profile(), "prod");
    assert_eq!(config.get::<String>("relmap.engine").unwrap(), "postgresql");
    assert_eq!(config.get::<i64>("relmap.cache.memory_limit_mb").unwrap(), 100);
}

#[test]
#[serial]
fn test_env_var_overrides_yaml() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("relmap.yaml"), "relmap:\n  cache:\n    enabled: true\n").unwrap();

    std::env::remove_var(PROFILE_ENV);
    std::env::set_var("RELMAP_CACHE_ENABLED", "false");
    let config = RelmapConfig::load_from(dir.path(), "dev");
    std::env::remove_var("RELMAP_CACHE_ENABLED");

    let mapper: MapperConfig = config.unwrap().section().unwrap();
    assert!(!mapper.cache.enabled);
}

#[test]
#[serial]
fn test_dotenv_file_feeds_overlay() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "RELMAP_REPLICAS_WORKERS=7\n").unwrap();

    std::env::remove_var(PROFILE_ENV);
    std::env::remove_var("RELMAP_REPLICAS_WORKERS");
    let config = RelmapConfig::load_from(dir.path(), "dev");
    std::env::remove_var("RELMAP_REPLICAS_WORKERS");

    let mapper: MapperConfig = config.unwrap().section().unwrap();
    assert_eq!(mapper.replicas.workers, 7);
}

#[test]
#[serial]
fn test_profile_env_var_wins() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("relmap-staging.yaml"), "relmap:\n  binding: bound\n").unwrap();

    std::env::set_var(PROFILE_ENV, "staging");
    let config = RelmapConfig::load_from(dir.path(), "dev");
    std::env::remove_var(PROFILE_ENV);

    let config = config.unwrap();
    assert_eq!(config.profile(), "staging");
    assert_eq!(config.get::<String>("relmap.binding").unwrap(), "bound");
}

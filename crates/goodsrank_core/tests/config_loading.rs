use figment::Jail;
use goodsrank_core::config::{AppConfig, CacheBackend, ConfigError};
use goodsrank_core::{CachePolicy, WindowPolicy};
use std::path::PathBuf;

#[test]
fn empty_environment_yields_defaults() {
    Jail::expect_with(|_jail| {
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config, AppConfig::default());
        Ok(())
    });
}

#[test]
fn working_directory_toml_is_picked_up() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "goodsrank.toml",
            r#"
[database]
path = "/var/lib/goodsrank/store.sqlite3"

[cache]
backend = "memory"
ttl_secs = 15
policy = "invalidate_on_write"

[ranking]
window_policy = "span"

[list]
default_limit = 25
"#,
        )?;

        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/goodsrank/store.sqlite3")
        );
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.ttl_secs, 15);
        assert_eq!(config.cache.policy, CachePolicy::InvalidateOnWrite);
        assert_eq!(config.ranking.window_policy, WindowPolicy::Span);
        assert_eq!(config.list.default_limit, 25);
        assert_eq!(config.notify.channel, "event");
        Ok(())
    });
}

#[test]
fn env_beats_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[cache]
ttl_secs = 15
"#,
        )?;
        jail.set_env("GOODSRANK_CACHE__TTL_SECS", "90");
        jail.set_env("GOODSRANK_NOTIFY__TOPIC", "audit-events");

        let config = AppConfig::load_from("custom.toml").expect("config loads");
        assert_eq!(config.cache.ttl_secs, 90);
        assert_eq!(config.notify.topic, "audit-events");
        Ok(())
    });
}

#[test]
fn zero_ttl_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("GOODSRANK_CACHE__TTL_SECS", "0");

        let err = AppConfig::load().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "cache.ttl_secs",
                ..
            }
        ));
        Ok(())
    });
}

#[test]
fn unknown_policy_value_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.set_env("GOODSRANK_RANKING__WINDOW_POLICY", "sideways");

        let err = AppConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
        Ok(())
    });
}

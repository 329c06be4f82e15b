//! Core domain logic for goodsrank.
//! This crate is the single source of truth for ordering invariants.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;
mod time;

pub use cache::{CachePolicy, GoodsCache, MemoryCache, ReadThrough, SqliteCache};
pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::good::{Good, GoodId, Group, GroupId, ValidationError};
pub use notify::{ChangeEvent, ChangeKind, ChangeNotifier, LogNotifier};
pub use repo::goods_repo::{
    GoodsRepository, RepoError, RepoResult, SqliteGoodsRepository, WindowPolicy,
};
pub use repo::group_repo::{GroupRepository, SqliteGroupRepository};
pub use service::goods_service::{
    GoodsMutation, GoodsPage, GoodsService, ListQuery, MutationOutcome, RankedGood,
    ServiceOptions,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

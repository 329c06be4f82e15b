use goodsrank_core::cache::{page_key, ALL_GOODS_KEY};
use goodsrank_core::db::open_db_in_memory;
use goodsrank_core::notify::NoopNotifier;
use goodsrank_core::{
    CachePolicy, GoodsCache, GoodsService, ListQuery, MemoryCache, ReadThrough, ServiceOptions,
    SqliteCache, SqliteGoodsRepository,
};
use rusqlite::Connection;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DEFAULT_GROUP: i64 = 1;

fn service_with<C: GoodsCache>(
    conn: &Connection,
    cache: C,
    ttl: Duration,
    cache_policy: CachePolicy,
) -> GoodsService<SqliteGoodsRepository<'_>, C> {
    GoodsService::new(
        SqliteGoodsRepository::new(conn),
        ReadThrough::new(cache, ttl),
        Box::new(NoopNotifier),
        ServiceOptions {
            cache_policy,
            ..ServiceOptions::default()
        },
    )
}

#[test]
fn page_reports_store_wide_counters() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with(
        &conn,
        MemoryCache::new(),
        Duration::from_secs(60),
        CachePolicy::TtlOnly,
    );
    for name in ["a", "b", "c"] {
        service.create_good(DEFAULT_GROUP, name).unwrap();
    }
    service.delete_good(2, DEFAULT_GROUP).unwrap();

    let page = service
        .list_goods(&ListQuery {
            limit: 2,
            offset: 1,
        })
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.removed, 1);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 1);
    let ids: Vec<i64> = page.goods.iter().map(|good| good.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn default_query_uses_first_ten_goods() {
    let query = ListQuery::default();
    assert_eq!(query.limit, 10);
    assert_eq!(query.offset, 0);
}

#[test]
fn warm_reads_match_cold_reads_and_populate_both_keys() {
    let conn = open_db_in_memory().unwrap();
    let cache = Arc::new(MemoryCache::new());
    let service = service_with(
        &conn,
        Arc::clone(&cache),
        Duration::from_secs(60),
        CachePolicy::TtlOnly,
    );
    service.create_good(DEFAULT_GROUP, "a").unwrap();

    let cold = service.list_goods(&ListQuery::default()).unwrap();
    let warm = service.list_goods(&ListQuery::default()).unwrap();

    assert_eq!(cold, warm);
    assert!(cache.get(ALL_GOODS_KEY).unwrap().is_some());
    assert!(cache.get(&page_key(10, 0)).unwrap().is_some());
}

#[test]
fn ttl_only_policy_serves_stale_listing_until_expiry() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with(
        &conn,
        MemoryCache::new(),
        Duration::from_millis(100),
        CachePolicy::TtlOnly,
    );
    service.create_good(DEFAULT_GROUP, "a").unwrap();

    let before = service.list_goods(&ListQuery::default()).unwrap();
    service.create_good(DEFAULT_GROUP, "b").unwrap();
    let stale = service.list_goods(&ListQuery::default()).unwrap();

    assert_eq!(stale, before);
    assert_eq!(stale.total, 1);

    thread::sleep(Duration::from_millis(200));
    let fresh = service.list_goods(&ListQuery::default()).unwrap();
    assert_eq!(fresh.total, 2);
    assert_eq!(fresh.goods.len(), 2);
}

#[test]
fn invalidate_on_write_policy_drops_cached_listings() {
    let conn = open_db_in_memory().unwrap();
    let cache = Arc::new(MemoryCache::new());
    let service = service_with(
        &conn,
        Arc::clone(&cache),
        Duration::from_secs(60),
        CachePolicy::InvalidateOnWrite,
    );
    service.create_good(DEFAULT_GROUP, "a").unwrap();
    service.list_goods(&ListQuery::default()).unwrap();
    service
        .list_goods(&ListQuery {
            limit: 5,
            offset: 0,
        })
        .unwrap();
    assert_eq!(cache.len(), 3);

    service.reprioritize_good(1, DEFAULT_GROUP, 4).unwrap();
    assert!(cache.is_empty());

    let page = service.list_goods(&ListQuery::default()).unwrap();
    assert_eq!(page.goods[0].priority, 4);
}

#[test]
fn page_entries_are_keyed_by_limit_and_offset() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with(
        &conn,
        MemoryCache::new(),
        Duration::from_secs(60),
        CachePolicy::TtlOnly,
    );
    for name in ["a", "b", "c", "d"] {
        service.create_good(DEFAULT_GROUP, name).unwrap();
    }

    let first = service
        .list_goods(&ListQuery {
            limit: 2,
            offset: 0,
        })
        .unwrap();
    let second = service
        .list_goods(&ListQuery {
            limit: 2,
            offset: 2,
        })
        .unwrap();

    assert_eq!(first.goods[0].name, "a");
    assert_eq!(second.goods[0].name, "c");
}

#[test]
fn sqlite_cache_is_shared_between_handles_on_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.sqlite3");
    let conn = open_db_in_memory().unwrap();

    let writer = service_with(
        &conn,
        SqliteCache::open(&cache_path).unwrap(),
        Duration::from_secs(60),
        CachePolicy::TtlOnly,
    );
    writer.create_good(DEFAULT_GROUP, "a").unwrap();
    let warmed = writer.list_goods(&ListQuery::default()).unwrap();

    // A write that bypasses the service stays invisible to cached readers.
    conn.execute("UPDATE goods SET name = 'renamed';", [])
        .unwrap();

    let reader = service_with(
        &conn,
        SqliteCache::open(&cache_path).unwrap(),
        Duration::from_secs(60),
        CachePolicy::TtlOnly,
    );
    let cached = reader.list_goods(&ListQuery::default()).unwrap();
    assert_eq!(cached, warmed);
    assert_eq!(cached.goods[0].name, "a");
}

use goodsrank_core::config::NotifyConfig;
use goodsrank_core::db::open_db_in_memory;
use goodsrank_core::notify::{ChannelNotifier, Forwarder, Published, DEFAULT_CHANNEL, DEFAULT_TOPIC};
use goodsrank_core::{
    ChangeEvent, ChangeKind, GoodsMutation, GoodsService, MemoryCache, MutationOutcome,
    RankedGood, ReadThrough, ServiceOptions, SqliteGoodsRepository,
};
use rusqlite::Connection;
use std::sync::mpsc::Receiver;
use std::time::Duration;

const DEFAULT_GROUP: i64 = 1;

fn service(
    conn: &Connection,
) -> (
    GoodsService<SqliteGoodsRepository<'_>, MemoryCache>,
    Receiver<Published>,
) {
    let (notifier, receiver) = ChannelNotifier::new();
    let service = GoodsService::new(
        SqliteGoodsRepository::new(conn),
        ReadThrough::new(MemoryCache::new(), Duration::from_secs(60)),
        Box::new(notifier),
        ServiceOptions::default(),
    );
    (service, receiver)
}

fn events(receiver: &Receiver<Published>) -> Vec<ChangeEvent> {
    receiver
        .try_iter()
        .map(|message| {
            assert_eq!(message.channel, DEFAULT_CHANNEL);
            serde_json::from_str(&message.payload).unwrap()
        })
        .collect()
}

#[test]
fn each_committed_mutation_publishes_its_event() {
    let conn = open_db_in_memory().unwrap();
    let (service, receiver) = service(&conn);

    let good = service.create_good(DEFAULT_GROUP, "desk").unwrap();
    service
        .update_good(good.id, DEFAULT_GROUP, "desk", "oak")
        .unwrap();
    service.delete_good(good.id, DEFAULT_GROUP).unwrap();

    let kinds: Vec<ChangeKind> = events(&receiver).iter().map(|event| event.event).collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::GoodCreated,
            ChangeKind::GoodUpdated,
            ChangeKind::GoodRemoved
        ]
    );
}

#[test]
fn reprioritize_publishes_one_event_per_window_member() {
    let conn = open_db_in_memory().unwrap();
    let (service, receiver) = service(&conn);
    for name in ["a", "b", "c"] {
        service.create_good(DEFAULT_GROUP, name).unwrap();
    }
    receiver.try_iter().for_each(drop);

    let window = service.reprioritize_good(2, DEFAULT_GROUP, 7).unwrap();

    assert_eq!(
        window,
        vec![
            RankedGood { id: 2, priority: 7 },
            RankedGood { id: 3, priority: 8 }
        ]
    );
    let published = events(&receiver);
    assert_eq!(published.len(), 2);
    assert!(published
        .iter()
        .all(|event| event.event == ChangeKind::GoodsReprioritized));
    assert_eq!(published[1].id, 3);
    assert_eq!(published[1].priority, 8);
}

#[test]
fn failed_mutations_publish_nothing() {
    let conn = open_db_in_memory().unwrap();
    let (service, receiver) = service(&conn);

    assert!(service.create_good(DEFAULT_GROUP, " ").is_err());
    assert!(service.delete_good(42, DEFAULT_GROUP).is_err());
    assert!(service.reprioritize_good(42, DEFAULT_GROUP, 1).is_err());

    assert!(events(&receiver).is_empty());
}

#[test]
fn mutate_dispatches_to_matching_use_case() {
    let conn = open_db_in_memory().unwrap();
    let (service, receiver) = service(&conn);

    let created = service
        .mutate(GoodsMutation::Create {
            group_id: DEFAULT_GROUP,
            name: "lamp".to_string(),
        })
        .unwrap();
    let MutationOutcome::Good(good) = created else {
        panic!("create must return the good");
    };

    let moved = service
        .mutate(GoodsMutation::Reprioritize {
            id: good.id,
            group_id: DEFAULT_GROUP,
            new_priority: 3,
        })
        .unwrap();
    assert_eq!(
        moved,
        MutationOutcome::Window(vec![RankedGood {
            id: good.id,
            priority: 3
        }])
    );
    assert_eq!(events(&receiver).len(), 2);
}

#[test]
fn forwarder_republishes_engine_events_to_downstream_topic() {
    let conn = open_db_in_memory().unwrap();
    let (service, receiver) = service(&conn);
    let (downstream, downstream_rx) = ChannelNotifier::new();
    let forwarder = Forwarder::new(DEFAULT_CHANNEL, DEFAULT_TOPIC, downstream);

    service.create_good(DEFAULT_GROUP, "desk").unwrap();
    assert_eq!(forwarder.drain(&receiver), 1);

    let relayed: Vec<Published> = downstream_rx.try_iter().collect();
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].channel, DEFAULT_TOPIC);
    let event: ChangeEvent = serde_json::from_str(&relayed[0].payload).unwrap();
    assert_eq!(event.event, ChangeKind::GoodCreated);
}

#[test]
fn forwarder_from_config_uses_configured_topic() {
    let conn = open_db_in_memory().unwrap();
    let (service, receiver) = service(&conn);
    let (downstream, downstream_rx) = ChannelNotifier::new();
    let notify = NotifyConfig {
        channel: DEFAULT_CHANNEL.to_string(),
        topic: "audit-events".to_string(),
    };
    let forwarder = Forwarder::from_config(&notify, downstream);

    service.create_good(DEFAULT_GROUP, "desk").unwrap();
    assert_eq!(forwarder.drain(&receiver), 1);

    let relayed: Vec<Published> = downstream_rx.try_iter().collect();
    assert_eq!(relayed[0].channel, "audit-events");
}

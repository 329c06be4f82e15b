//! Goods use-case service: the priority engine.
//!
//! # Responsibility
//! - Delegate mutations to the repository and publish change events once
//!   they committed.
//! - Serve listings through the read-through cache.
//!
//! # Invariants
//! - Writes never go through the cache; reads never fail because of it.
//! - Under `CachePolicy::TtlOnly` a write leaves cached listings stale until
//!   their TTL lapses.
//! - A publish failure never fails the mutation that produced it.

use crate::cache::{page_key, CachePolicy, GoodsCache, ReadThrough, ALL_GOODS_KEY};
use crate::config::{AppConfig, DEFAULT_LIST_LIMIT};
use crate::model::good::{Good, GoodId, GroupId};
use crate::notify::{ChangeEvent, ChangeKind, ChangeNotifier, DEFAULT_CHANNEL};
use crate::repo::goods_repo::{GoodsRepository, RepoError, RepoResult, WindowPolicy};
use log::{error, info, warn};
use serde::Serialize;

/// Behavior switches of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    pub cache_policy: CachePolicy,
    pub window_policy: WindowPolicy,
    /// Channel change events are published on.
    pub channel: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::default(),
            window_policy: WindowPolicy::default(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cache_policy: config.cache.policy,
            window_policy: config.ranking.window_policy,
            channel: config.notify.channel.clone(),
        }
    }
}

/// Page request for [`GoodsService::list_goods`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

/// One page of goods plus store-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsPage {
    pub goods: Vec<Good>,
    /// Every good ever created, removed ones included.
    pub total: usize,
    /// Goods with `removed = true`.
    pub removed: usize,
    pub limit: u32,
    pub offset: u32,
}

/// Post-reorder priority of one window member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankedGood {
    pub id: GoodId,
    pub priority: i64,
}

/// Mutating use case, for callers dispatching on one entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoodsMutation {
    Create {
        group_id: GroupId,
        name: String,
    },
    Update {
        id: GoodId,
        group_id: GroupId,
        name: String,
        description: String,
    },
    Delete {
        id: GoodId,
        group_id: GroupId,
    },
    Reprioritize {
        id: GoodId,
        group_id: GroupId,
        new_priority: i64,
    },
}

/// Result of [`GoodsService::mutate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Good(Good),
    Window(Vec<RankedGood>),
}

/// Priority engine over a goods repository, a cache and a notifier.
pub struct GoodsService<R: GoodsRepository, C: GoodsCache> {
    repo: R,
    cache: ReadThrough<C>,
    notifier: Box<dyn ChangeNotifier>,
    options: ServiceOptions,
}

impl<R: GoodsRepository, C: GoodsCache> GoodsService<R, C> {
    pub fn new(
        repo: R,
        cache: ReadThrough<C>,
        notifier: Box<dyn ChangeNotifier>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            repo,
            cache,
            notifier,
            options,
        }
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Creates a good ranked after every existing one.
    pub fn create_good(&self, group_id: GroupId, name: &str) -> RepoResult<Good> {
        let good = self
            .repo
            .create_good(group_id, name)
            .inspect_err(|err| {
                error!("event=good_create module=service status=error group_id={group_id} error={err}")
            })?;

        info!(
            "event=good_create module=service status=ok id={} group_id={} priority={}",
            good.id, good.group_id, good.priority
        );
        self.after_commit(ChangeKind::GoodCreated, std::slice::from_ref(&good));
        Ok(good)
    }

    /// Replaces name and description of one good.
    pub fn update_good(
        &self,
        id: GoodId,
        group_id: GroupId,
        name: &str,
        description: &str,
    ) -> RepoResult<Good> {
        let good = self
            .repo
            .update_good(id, group_id, name, description)
            .inspect_err(|err| {
                error!(
                    "event=good_update module=service status=error id={id} group_id={group_id} error={err}"
                )
            })?;

        info!("event=good_update module=service status=ok id={id} group_id={group_id}");
        self.after_commit(ChangeKind::GoodUpdated, std::slice::from_ref(&good));
        Ok(good)
    }

    /// Soft-deletes one good; its priority is kept.
    pub fn delete_good(&self, id: GoodId, group_id: GroupId) -> RepoResult<Good> {
        let good = self
            .repo
            .soft_delete_good(id, group_id)
            .inspect_err(|err| {
                error!(
                    "event=good_delete module=service status=error id={id} group_id={group_id} error={err}"
                )
            })?;

        info!("event=good_delete module=service status=ok id={id} group_id={group_id}");
        self.after_commit(ChangeKind::GoodRemoved, std::slice::from_ref(&good));
        Ok(good)
    }

    /// Lists one id-ordered page with store-wide `total` and `removed`.
    ///
    /// The snapshot behind the counters and the page are cached under two
    /// independent keys and may be stale independently.
    pub fn list_goods(&self, query: &ListQuery) -> RepoResult<GoodsPage> {
        let ListQuery { limit, offset } = *query;

        let (all, all_source) = self
            .cache
            .get_or_load::<Vec<Good>, RepoError, _>(ALL_GOODS_KEY, || self.repo.list_all_goods())
            .inspect_err(|err| {
                error!("event=goods_list module=service status=error scope=all error={err}")
            })?;
        let (goods, page_source) = self
            .cache
            .get_or_load::<Vec<Good>, RepoError, _>(&page_key(limit, offset), || {
                self.repo.list_goods_page(limit, offset)
            })
            .inspect_err(|err| {
                error!(
                    "event=goods_list module=service status=error scope=page limit={limit} offset={offset} error={err}"
                )
            })?;

        let removed = all.iter().filter(|good| good.removed).count();
        info!(
            "event=goods_list module=service status=ok limit={limit} offset={offset} total={} removed={removed} all_source={} page_source={}",
            all.len(),
            all_source.as_str(),
            page_source.as_str()
        );

        Ok(GoodsPage {
            goods,
            total: all.len(),
            removed,
            limit,
            offset,
        })
    }

    /// Renumbers the window of one good starting at `new_priority`.
    pub fn reprioritize_good(
        &self,
        id: GoodId,
        group_id: GroupId,
        new_priority: i64,
    ) -> RepoResult<Vec<RankedGood>> {
        let window = self
            .repo
            .reprioritize(id, group_id, new_priority, self.options.window_policy)
            .inspect_err(|err| {
                error!(
                    "event=good_reprioritize module=service status=error id={id} group_id={group_id} new_priority={new_priority} error={err}"
                )
            })?;

        info!(
            "event=good_reprioritize module=service status=ok id={id} group_id={group_id} new_priority={new_priority} window_len={}",
            window.len()
        );
        self.after_commit(ChangeKind::GoodsReprioritized, &window);
        Ok(window
            .iter()
            .map(|good| RankedGood {
                id: good.id,
                priority: good.priority,
            })
            .collect())
    }

    /// Applies one mutation through the matching use case.
    pub fn mutate(&self, mutation: GoodsMutation) -> RepoResult<MutationOutcome> {
        match mutation {
            GoodsMutation::Create { group_id, name } => self
                .create_good(group_id, &name)
                .map(MutationOutcome::Good),
            GoodsMutation::Update {
                id,
                group_id,
                name,
                description,
            } => self
                .update_good(id, group_id, &name, &description)
                .map(MutationOutcome::Good),
            GoodsMutation::Delete { id, group_id } => {
                self.delete_good(id, group_id).map(MutationOutcome::Good)
            }
            GoodsMutation::Reprioritize {
                id,
                group_id,
                new_priority,
            } => self
                .reprioritize_good(id, group_id, new_priority)
                .map(MutationOutcome::Window),
        }
    }

    fn after_commit(&self, kind: ChangeKind, goods: &[Good]) {
        for good in goods {
            match ChangeEvent::for_good(kind, good).to_payload() {
                Ok(payload) => self.notifier.publish(&self.options.channel, &payload),
                Err(err) => warn!(
                    "event=change_publish module=service status=error id={} error_code=encode_failed error={err}",
                    good.id
                ),
            }
        }

        if self.options.cache_policy == CachePolicy::InvalidateOnWrite {
            self.cache.invalidate_goods();
        }
    }
}


//! Versioned goods-store schema and its one-shot bootstrap.
//!
//! Pending schema steps and default-group seeding run in a single
//! immediate transaction, so a half-initialized store is never visible.

use super::{DbError, DbResult};
use crate::model::good::GroupId;
use log::info;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

/// Name of the group created when the store holds no group at all.
pub const DEFAULT_GROUP_NAME: &str = "First project";

struct SchemaStep {
    version: u32,
    label: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    label: "goods_and_groups",
    sql: include_str!("schema/0001_goods.sql"),
}];

/// Schema version this build writes.
pub fn schema_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// What one bootstrap did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bootstrap {
    pub from_version: u32,
    pub to_version: u32,
    /// Id of the default group when this bootstrap created it.
    pub seeded_group: Option<GroupId>,
}

/// Applies pending schema steps and seeds the default group.
pub(crate) fn bootstrap_store(conn: &mut Connection) -> DbResult<Bootstrap> {
    let found = stored_version(conn)?;
    let supported = schema_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Re-read under the write lock; a concurrent opener may have finished first.
    let from_version = stored_version(&tx)?;
    for step in STEPS.iter().filter(|step| step.version > from_version) {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::SchemaStep {
                version: step.version,
                label: step.label,
                source,
            })?;
        info!(
            "event=schema_step module=db status=ok version={} label={}",
            step.version, step.label
        );
    }
    let seeded_group = seed_default_group(&tx).map_err(DbError::Seed)?;
    tx.commit()?;

    Ok(Bootstrap {
        from_version,
        to_version: supported.max(from_version),
        seeded_group,
    })
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

fn seed_default_group(conn: &Connection) -> rusqlite::Result<Option<GroupId>> {
    conn.query_row(
        "INSERT INTO groups (name)
         SELECT ?1
         WHERE NOT EXISTS (SELECT 1 FROM groups)
         RETURNING id;",
        [DEFAULT_GROUP_NAME],
        |row| row.get(0),
    )
    .optional()
}

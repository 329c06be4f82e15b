//! Goods repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/update/soft-delete/list APIs over canonical `goods` storage.
//! - Own the reprioritization algorithm and its transaction contract.
//!
//! # Invariants
//! - New goods get `MAX(priority) + 1` over the whole store, or `1` when empty.
//! - Soft delete and reprioritize run inside one immediate transaction each;
//!   a failed row write leaves every row unchanged.
//! - Priorities stay inside `1..=MAX_PRIORITY`; a request leaving that range
//!   is rejected before any row is written.
//! - Listing order is deterministic: `id ASC` for pages, `priority ASC, id ASC`
//!   for priority windows.

use crate::db::tx::{run_in_transaction, TxError};
use crate::db::DbError;
use crate::model::good::{
    normalize_name, validate_description, validate_priority, window_end, Good, GoodId, GroupId,
    ValidationError, MAX_PRIORITY,
};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const GOOD_SELECT_SQL: &str = "SELECT
    id,
    group_id,
    name,
    description,
    priority,
    removed,
    created_at
FROM goods";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for goods persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Malformed input, rejected before any store mutation.
    Validation(ValidationError),
    /// No good with this id inside this group.
    NotFound { id: GoodId, group_id: GroupId },
    /// Connectivity or constraint failure outside a transaction.
    Store(DbError),
    /// Failure inside a serializable transaction; nothing was applied.
    Transaction(TxError),
    /// Persisted row cannot be converted into a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { id, group_id } => {
                write!(f, "good not found: id={id} group_id={group_id}")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted goods data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Transaction(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(DbError::Sqlite(value))
    }
}

impl From<TxError> for RepoError {
    fn from(value: TxError) -> Self {
        Self::Transaction(value)
    }
}

/// Selection rule for the set of goods renumbered by one reprioritize call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Target's old priority and everything ranked at or after it.
    ///
    /// Moving a good to an earlier priority may leave duplicates with goods
    /// ranked between the new and the old position.
    #[default]
    Tail,
    /// Everything ranked at or after `min(old, new)`, target first.
    Span,
}

/// Repository interface for goods operations.
pub trait GoodsRepository {
    /// Inserts a good at the end of the global priority order.
    fn create_good(&self, group_id: GroupId, name: &str) -> RepoResult<Good>;
    /// Loads one good by id inside its group.
    fn find_good(&self, id: GoodId, group_id: GroupId) -> RepoResult<Good>;
    /// Replaces name and description. Fetch-then-save, no transaction.
    fn update_good(
        &self,
        id: GoodId,
        group_id: GroupId,
        name: &str,
        description: &str,
    ) -> RepoResult<Good>;
    /// Marks one good removed inside a serializable transaction.
    fn soft_delete_good(&self, id: GoodId, group_id: GroupId) -> RepoResult<Good>;
    /// Every good row, removed included, ordered by id.
    fn list_all_goods(&self) -> RepoResult<Vec<Good>>;
    /// One page of the id-ordered listing.
    fn list_goods_page(&self, limit: u32, offset: u32) -> RepoResult<Vec<Good>>;
    /// Goods with `priority >= min_priority`, store-wide or for one group.
    fn goods_from_priority(
        &self,
        scope: Option<GroupId>,
        min_priority: i64,
    ) -> RepoResult<Vec<Good>>;
    /// Renumbers the window of `id` starting at `new_priority`.
    fn reprioritize(
        &self,
        id: GoodId,
        group_id: GroupId,
        new_priority: i64,
        policy: WindowPolicy,
    ) -> RepoResult<Vec<Good>>;
    /// Returns whether a group with this id exists.
    fn group_exists(&self, group_id: GroupId) -> RepoResult<bool>;
}

/// SQLite-backed goods repository.
pub struct SqliteGoodsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGoodsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl GoodsRepository for SqliteGoodsRepository<'_> {
    fn create_good(&self, group_id: GroupId, name: &str) -> RepoResult<Good> {
        let name = normalize_name(name)?;
        if !self.group_exists(group_id)? {
            return Err(ValidationError::UnknownGroup(group_id).into());
        }

        // Single statement: the max lookup and the insert cannot interleave
        // with another writer.
        let inserted = self.conn.execute(
            "INSERT INTO goods (group_id, name, description, priority, removed)
             SELECT ?1, ?2, '', next_priority, 0
             FROM (SELECT COALESCE(MAX(priority), 0) + 1 AS next_priority FROM goods)
             WHERE next_priority <= ?3;",
            params![group_id, name.as_str(), MAX_PRIORITY],
        )?;
        if inserted == 0 {
            error!(
                "event=good_create module=repo status=error group_id={group_id} error_code=priority_exhausted"
            );
            return Err(ValidationError::PriorityOutOfRange(MAX_PRIORITY + 1).into());
        }

        let id = self.conn.last_insert_rowid();
        load_good(self.conn, id, group_id)?.ok_or(RepoError::NotFound { id, group_id })
    }

    fn find_good(&self, id: GoodId, group_id: GroupId) -> RepoResult<Good> {
        load_good(self.conn, id, group_id)?.ok_or(RepoError::NotFound { id, group_id })
    }

    fn update_good(
        &self,
        id: GoodId,
        group_id: GroupId,
        name: &str,
        description: &str,
    ) -> RepoResult<Good> {
        let name = normalize_name(name)?;
        validate_description(description)?;

        let mut good = self.find_good(id, group_id)?;
        good.name = name;
        good.description = description.to_string();

        let changed = self.conn.execute(
            "UPDATE goods
             SET name = ?3,
                 description = ?4
             WHERE id = ?1
               AND group_id = ?2;",
            params![id, group_id, good.name.as_str(), good.description.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { id, group_id });
        }

        Ok(good)
    }

    fn soft_delete_good(&self, id: GoodId, group_id: GroupId) -> RepoResult<Good> {
        run_in_transaction(self.conn, "soft_delete", |tx| {
            let mut good = load_good(tx, id, group_id)
                .map_err(into_transaction_error)?
                .ok_or(RepoError::NotFound { id, group_id })?;

            good.removed = true;
            tx.execute(
                "UPDATE goods
                 SET removed = 1
                 WHERE id = ?1
                   AND group_id = ?2;",
                params![id, group_id],
            )
            .map_err(|err| {
                error!(
                    "event=good_delete module=repo status=error id={id} group_id={group_id} error={err}"
                );
                RepoError::Transaction(TxError::step(err))
            })?;

            Ok(good)
        })
    }

    fn list_all_goods(&self) -> RepoResult<Vec<Good>> {
        select_goods(
            self.conn,
            &format!("{GOOD_SELECT_SQL} ORDER BY id ASC;"),
            Vec::new(),
        )
    }

    fn list_goods_page(&self, limit: u32, offset: u32) -> RepoResult<Vec<Good>> {
        select_goods(
            self.conn,
            &format!("{GOOD_SELECT_SQL} ORDER BY id ASC LIMIT ? OFFSET ?;"),
            vec![
                Value::Integer(i64::from(limit)),
                Value::Integer(i64::from(offset)),
            ],
        )
    }

    fn goods_from_priority(
        &self,
        scope: Option<GroupId>,
        min_priority: i64,
    ) -> RepoResult<Vec<Good>> {
        window_from_priority(self.conn, scope, min_priority)
    }

    fn reprioritize(
        &self,
        id: GoodId,
        group_id: GroupId,
        new_priority: i64,
        policy: WindowPolicy,
    ) -> RepoResult<Vec<Good>> {
        validate_priority(new_priority)?;

        let members = run_in_transaction::<_, RepoError, _>(self.conn, "reprioritize", |tx| {
            let target = load_good(tx, id, group_id)
                .map_err(into_transaction_error)?
                .ok_or(RepoError::NotFound { id, group_id })?;
            let window = plan_window(tx, &target, new_priority, policy)
                .map_err(into_transaction_error)?;
            window_end(new_priority, window.len())?;

            for (index, good_id) in window.iter().enumerate() {
                let priority = new_priority + index as i64;
                tx.execute(
                    "UPDATE goods SET priority = ?2 WHERE id = ?1;",
                    params![good_id, priority],
                )
                .map_err(|err| {
                    error!(
                        "event=good_reprioritize module=repo status=error id={good_id} priority={priority} error={err}"
                    );
                    RepoError::Transaction(TxError::step(err))
                })?;
            }

            info!(
                "event=good_reprioritize module=repo status=ok id={id} old_priority={} new_priority={new_priority} window_len={}",
                target.priority,
                window.len()
            );
            Ok(window)
        })?;

        let members: HashSet<GoodId> = members.into_iter().collect();
        let window = window_from_priority(self.conn, None, new_priority)?
            .into_iter()
            .filter(|good| members.contains(&good.id))
            .collect();
        Ok(window)
    }

    fn group_exists(&self, group_id: GroupId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1);",
            [group_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

/// Ordered ids of the goods to renumber, in walk order.
fn plan_window(
    conn: &Connection,
    target: &Good,
    new_priority: i64,
    policy: WindowPolicy,
) -> RepoResult<Vec<GoodId>> {
    match policy {
        WindowPolicy::Tail => window_ids_from(conn, target.priority),
        WindowPolicy::Span => {
            let mut ids = window_ids_from(conn, target.priority.min(new_priority))?;
            ids.retain(|good_id| *good_id != target.id);
            ids.insert(0, target.id);
            Ok(ids)
        }
    }
}

fn window_ids_from(conn: &Connection, min_priority: i64) -> RepoResult<Vec<GoodId>> {
    let mut stmt = conn.prepare(
        "SELECT id
         FROM goods
         WHERE priority >= ?1
         ORDER BY priority ASC, id ASC;",
    )?;
    let ids = stmt
        .query_map([min_priority], |row| row.get::<_, GoodId>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn window_from_priority(
    conn: &Connection,
    scope: Option<GroupId>,
    min_priority: i64,
) -> RepoResult<Vec<Good>> {
    match scope {
        Some(group_id) => select_goods(
            conn,
            &format!(
                "{GOOD_SELECT_SQL}
                 WHERE priority >= ? AND group_id = ?
                 ORDER BY priority ASC, id ASC;"
            ),
            vec![Value::Integer(min_priority), Value::Integer(group_id)],
        ),
        None => select_goods(
            conn,
            &format!(
                "{GOOD_SELECT_SQL}
                 WHERE priority >= ?
                 ORDER BY priority ASC, id ASC;"
            ),
            vec![Value::Integer(min_priority)],
        ),
    }
}

fn load_good(conn: &Connection, id: GoodId, group_id: GroupId) -> RepoResult<Option<Good>> {
    let good = conn
        .query_row(
            &format!("{GOOD_SELECT_SQL} WHERE id = ?1 AND group_id = ?2;"),
            params![id, group_id],
            |row| Ok(parse_good_row(row)),
        )
        .optional()?;
    good.transpose()
}

fn select_goods(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Good>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut goods = Vec::new();
    while let Some(row) = rows.next()? {
        goods.push(parse_good_row(row)?);
    }
    Ok(goods)
}

fn parse_good_row(row: &Row<'_>) -> RepoResult<Good> {
    let removed = match row.get::<_, i64>("removed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid removed value `{other}` in goods.removed"
            )));
        }
    };

    Ok(Good {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        priority: row.get("priority")?,
        removed,
        created_at: row.get("created_at")?,
    })
}

/// Store errors raised inside a transaction body are transaction failures.
fn into_transaction_error(err: RepoError) -> RepoError {
    match err {
        RepoError::Store(DbError::Sqlite(source)) => RepoError::Transaction(TxError::step(source)),
        other => other,
    }
}

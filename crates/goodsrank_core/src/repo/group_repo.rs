//! Group repository: the namespaces that scope goods.
//!
//! Groups are read-only for the priority engine; creation exists for
//! bootstrap and administration.

use crate::model::good::{normalize_name, Group, GroupId};
use crate::repo::goods_repo::{RepoError, RepoResult};
use rusqlite::{Connection, OptionalExtension, Row};

const GROUP_SELECT_SQL: &str = "SELECT id, name, created_at FROM groups";

/// Repository interface for group operations.
pub trait GroupRepository {
    fn create_group(&self, name: &str) -> RepoResult<Group>;
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>>;
    fn list_groups(&self) -> RepoResult<Vec<Group>>;
}

/// SQLite-backed group repository.
pub struct SqliteGroupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGroupRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn create_group(&self, name: &str) -> RepoResult<Group> {
        let name = normalize_name(name)?;
        self.conn
            .execute("INSERT INTO groups (name) VALUES (?1);", [name.as_str()])?;
        let id = self.conn.last_insert_rowid();
        self.get_group(id)?
            .ok_or_else(|| RepoError::InvalidData(format!("inserted group {id} is missing")))
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        let group = self
            .conn
            .query_row(
                &format!("{GROUP_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_group_row,
            )
            .optional()?;
        Ok(group)
    }

    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} ORDER BY id ASC;"))?;
        let groups = stmt
            .query_map([], parse_group_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }
}

fn parse_group_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

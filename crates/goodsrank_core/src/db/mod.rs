//! SQLite storage bootstrap, schema versioning and transaction scoping.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the goods record store.
//! - Bring the `groups`/`goods` schema to the current version and seed the
//!   default group in one bootstrap transaction.
//! - Provide the scoped write-transaction guard used by multi-row mutations.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - At least one group exists once a connection is returned.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;
pub mod tx;

pub use open::{open_db, open_db_in_memory};
pub use schema::DEFAULT_GROUP_NAME;

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or bootstrapping the goods store.
#[derive(Debug)]
pub enum DbError {
    /// Connection-level failure outside the bootstrap steps.
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
    /// One schema step failed; the bootstrap transaction was rolled back.
    SchemaStep {
        version: u32,
        label: &'static str,
        source: rusqlite::Error,
    },
    /// The default group could not be created.
    Seed(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "goods store error: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "goods store schema v{found} is newer than this build (v{supported})"
            ),
            Self::SchemaStep {
                version,
                label,
                source,
            } => write!(f, "schema step v{version} ({label}) failed: {source}"),
            Self::Seed(err) => write!(f, "default group seeding failed: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Seed(err) => Some(err),
            Self::SchemaStep { source, .. } => Some(source),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

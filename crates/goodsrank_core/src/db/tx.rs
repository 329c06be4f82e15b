//! Scoped write transactions.
//!
//! # Responsibility
//! - Begin a serializable (`BEGIN IMMEDIATE`) transaction, run the caller's
//!   steps and commit only when every step succeeded.
//!
//! # Invariants
//! - Any early return, step error or unwinding panic leaves the store
//!   unchanged: `rusqlite::Transaction` rolls back on drop.
//! - Begin and commit failures surface as [`TxError`].

use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Phase of a scoped transaction in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Begin,
    Step,
    Commit,
}

impl TxStage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Step => "step",
            Self::Commit => "commit",
        }
    }
}

/// Failure inside a serializable transaction. The transaction was rolled back.
#[derive(Debug)]
pub struct TxError {
    pub stage: TxStage,
    pub source: rusqlite::Error,
}

impl TxError {
    pub fn new(stage: TxStage, source: rusqlite::Error) -> Self {
        Self { stage, source }
    }

    /// Wraps a failed row write issued from inside the transaction body.
    pub fn step(source: rusqlite::Error) -> Self {
        Self::new(TxStage::Step, source)
    }
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transaction failed during {}: {}",
            self.stage.as_str(),
            self.source
        )
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Runs `body` inside one immediate transaction on `conn`.
///
/// The body receives the open transaction; returning `Err` rolls back and
/// hands the error back unchanged.
pub fn run_in_transaction<T, E, F>(conn: &Connection, op: &'static str, body: F) -> Result<T, E>
where
    E: From<TxError>,
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|err| TxError::new(TxStage::Begin, err))?;
    debug!("event=tx_begin module=db op={op}");

    match body(&tx) {
        Ok(value) => {
            tx.commit()
                .map_err(|err| TxError::new(TxStage::Commit, err))?;
            debug!("event=tx_commit module=db op={op} status=ok");
            Ok(value)
        }
        Err(err) => {
            match tx.rollback() {
                Ok(()) => debug!("event=tx_rollback module=db op={op} status=ok"),
                Err(rollback_err) => warn!(
                    "event=tx_rollback module=db op={op} status=error error={rollback_err}"
                ),
            }
            Err(err)
        }
    }
}

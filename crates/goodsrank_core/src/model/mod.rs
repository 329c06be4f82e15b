//! Domain model for ranked goods and the groups scoping them.
//!
//! # Invariants
//! - Every good references an existing group.
//! - Deletion is represented by the `removed` flag, never by erasing rows.

pub mod good;

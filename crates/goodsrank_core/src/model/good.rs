//! Good and group records.
//!
//! # Responsibility
//! - Define the canonical persisted shapes of `Group` and `Good`.
//! - Provide input validation shared by repository and service layers.
//!
//! # Invariants
//! - `priority` is assigned by the store on creation and otherwise only
//!   changed by reprioritization.
//! - A removed good keeps its priority.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned good identifier.
pub type GoodId = i64;

/// Store-assigned group identifier.
pub type GroupId = i64;

/// Maximum accepted length of a good or group name, in characters.
pub const MAX_NAME_CHARS: usize = 100;

/// Maximum accepted length of a good description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 255;

/// Highest priority a good can hold; mirrored by the `goods.priority` CHECK.
pub const MAX_PRIORITY: i64 = i32::MAX as i64;

/// Project namespace scoping a set of goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Ranked catalog record.
///
/// Serialized with camelCase keys; this is also the cache payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Good {
    pub id: GoodId,
    pub group_id: GroupId,
    pub name: String,
    pub description: String,
    pub priority: i64,
    /// Soft-delete flag. Removed goods still count toward totals.
    pub removed: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl Good {
    /// Returns whether this good is not soft-deleted.
    pub fn is_active(&self) -> bool {
        !self.removed
    }
}

/// Rejected input for a good or group mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BlankName,
    NameTooLong { max_chars: usize },
    DescriptionTooLong { max_chars: usize },
    UnknownGroup(GroupId),
    PriorityOutOfRange(i64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::NameTooLong { max_chars } => {
                write!(f, "name must be at most {max_chars} characters")
            }
            Self::DescriptionTooLong { max_chars } => {
                write!(f, "description must be at most {max_chars} characters")
            }
            Self::UnknownGroup(id) => write!(f, "group does not exist: {id}"),
            Self::PriorityOutOfRange(value) => {
                write!(f, "priority must be in 1..={MAX_PRIORITY}, got {value}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Trims and checks a good or group name.
pub fn normalize_name(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankName);
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong {
            max_chars: MAX_NAME_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

/// Checks a description. Empty descriptions are allowed.
pub fn validate_description(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            max_chars: MAX_DESCRIPTION_CHARS,
        });
    }
    Ok(())
}

/// Checks a requested reprioritization target.
pub fn validate_priority(value: i64) -> Result<(), ValidationError> {
    if !(1..=MAX_PRIORITY).contains(&value) {
        return Err(ValidationError::PriorityOutOfRange(value));
    }
    Ok(())
}

/// Returns the priority the last of `window_len` renumbered goods receives.
///
/// Fails when the run starting at `start` would leave `1..=MAX_PRIORITY`.
pub fn window_end(start: i64, window_len: usize) -> Result<i64, ValidationError> {
    validate_priority(start)?;
    let span = i64::try_from(window_len.saturating_sub(1)).unwrap_or(i64::MAX);
    let end = start.saturating_add(span);
    validate_priority(end)?;
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_name, validate_description, validate_priority, window_end, Good,
        ValidationError, MAX_NAME_CHARS, MAX_PRIORITY,
    };

    #[test]
    fn normalize_name_trims_and_rejects_blank() {
        assert_eq!(normalize_name("  chair ").unwrap(), "chair");
        assert_eq!(normalize_name("   "), Err(ValidationError::BlankName));
    }

    #[test]
    fn normalize_name_rejects_overlong_input() {
        let long = "x".repeat(MAX_NAME_CHARS + 1);
        assert!(matches!(
            normalize_name(&long),
            Err(ValidationError::NameTooLong { .. })
        ));
    }

    #[test]
    fn description_and_priority_bounds() {
        assert!(validate_description("").is_ok());
        assert!(validate_description(&"d".repeat(256)).is_err());
        assert!(validate_priority(1).is_ok());
        assert_eq!(
            validate_priority(0),
            Err(ValidationError::PriorityOutOfRange(0))
        );
    }

    #[test]
    fn priority_ceiling_is_enforced() {
        assert!(validate_priority(MAX_PRIORITY).is_ok());
        assert_eq!(
            validate_priority(i64::MAX),
            Err(ValidationError::PriorityOutOfRange(i64::MAX))
        );
    }

    #[test]
    fn window_end_checks_the_last_assigned_priority() {
        assert_eq!(window_end(4, 3), Ok(6));
        assert_eq!(window_end(MAX_PRIORITY, 1), Ok(MAX_PRIORITY));
        assert_eq!(
            window_end(MAX_PRIORITY, 2),
            Err(ValidationError::PriorityOutOfRange(MAX_PRIORITY + 1))
        );
        assert_eq!(
            window_end(i64::MAX, 2),
            Err(ValidationError::PriorityOutOfRange(i64::MAX))
        );
    }

    #[test]
    fn good_serializes_with_camel_case_keys() {
        let good = Good {
            id: 7,
            group_id: 1,
            name: "lamp".to_string(),
            description: String::new(),
            priority: 3,
            removed: false,
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&good).unwrap();
        assert_eq!(json["groupId"], 1);
        assert_eq!(json["createdAt"], 1_700_000_000_000_i64);
        assert_eq!(json["removed"], false);
    }
}

//! Budget categories and their rollover policies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CategoryId, OwnerId};
use super::money::Money;

/// What happens to a category's remaining amount when its period closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RolloverPolicy {
    /// Carry only a surplus forward
    #[default]
    CarryUnspent,
    /// Carry only an overspend forward
    CarryDeficit,
    /// Carry surplus and overspend alike
    CarryBoth,
    /// Start every period fresh
    NoCarry,
}

impl RolloverPolicy {
    /// The amount to add to the next period's `rolled_in`
    pub fn carry(&self, remaining: Money) -> Money {
        match self {
            Self::CarryUnspent => remaining.max(Money::ZERO),
            Self::CarryDeficit => remaining.min(Money::ZERO),
            Self::CarryBoth => remaining,
            Self::NoCarry => Money::ZERO,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "carry_unspent" | "unspent" => Some(Self::CarryUnspent),
            "carry_deficit" | "deficit" => Some(Self::CarryDeficit),
            "carry_both" | "both" => Some(Self::CarryBoth),
            "no_carry" | "none" => Some(Self::NoCarry),
            _ => None,
        }
    }
}

impl fmt::Display for RolloverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CarryUnspent => write!(f, "carry-unspent"),
            Self::CarryDeficit => write!(f, "carry-deficit"),
            Self::CarryBoth => write!(f, "carry-both"),
            Self::NoCarry => write!(f, "no-carry"),
        }
    }
}

/// A budget category owned by a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub owner_id: OwnerId,
    pub name: String,
    pub rollover_policy: RolloverPolicy,

    /// Archived categories take no new postings or allocations but keep
    /// their history, summaries and rollovers
    #[serde(default)]
    pub archived: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(owner_id: OwnerId, name: impl Into<String>, rollover_policy: RolloverPolicy) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::new(),
            owner_id,
            name: name.into(),
            rollover_policy,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = Utc::now();
    }

    pub fn archive(&mut self) {
        self.archived = true;
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        if self.name.trim().is_empty() {
            return Err(CategoryValidationError::EmptyName);
        }
        if self.name.len() > 50 {
            return Err(CategoryValidationError::NameTooLong(self.name.len()));
        }
        Ok(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Validation errors for categories
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CategoryValidationError {
    #[error("Category name cannot be empty")]
    EmptyName,
    #[error("Category name too long ({0} chars, max 50)")]
    NameTooLong(usize),
}

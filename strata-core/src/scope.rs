//! Cache longevity scopes.

use crate::{ConfigError, StrataError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longevity level assigned to a cached object.
///
/// Scopes are totally ordered and double as indices into the per-scope
/// time buckets. `Call` objects live only in the call-scoped attribute
/// store; `Permanent` objects have no bucket and are never swept.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Call = 0,
    #[default]
    Short = 1,
    Medium = 2,
    Long = 3,
    VeryLong = 4,
    Permanent = 5,
}

impl Scope {
    /// All scopes in index order.
    pub const ALL: [Scope; 6] = [
        Scope::Call,
        Scope::Short,
        Scope::Medium,
        Scope::Long,
        Scope::VeryLong,
        Scope::Permanent,
    ];

    /// Scopes swept by the periodic timer.
    pub const SWEPT: [Scope; 4] = [Scope::Short, Scope::Medium, Scope::Long, Scope::VeryLong];

    /// Number of scopes that own a time bucket (everything below `Permanent`).
    pub const BUCKETED: usize = 5;

    /// Index of this scope (0 for `Call` through 5 for `Permanent`).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Scope for an index, or `None` when out of range.
    pub fn from_index(index: usize) -> Option<Scope> {
        Scope::ALL.get(index).copied()
    }

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Call => "CALL",
            Scope::Short => "SHORT",
            Scope::Medium => "MEDIUM",
            Scope::Long => "LONG",
            Scope::VeryLong => "VERY_LONG",
            Scope::Permanent => "PERMANENT",
        }
    }

    /// Whether objects of this scope are kept in a time bucket.
    pub fn is_bucketed(self) -> bool {
        self.index() < Scope::BUCKETED
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = StrataError;

    /// Case-insensitive; `REQUEST` is accepted as an alias of `CALL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CALL" | "REQUEST" => Ok(Scope::Call),
            "SHORT" => Ok(Scope::Short),
            "MEDIUM" => Ok(Scope::Medium),
            "LONG" => Ok(Scope::Long),
            "VERY_LONG" => Ok(Scope::VeryLong),
            "PERMANENT" => Ok(Scope::Permanent),
            _ => Err(ConfigError::UnknownScope {
                value: s.to_string(),
            }
            .into()),
        }
    }
}

//! Cache criteria: the value part of a cache key.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A single opaque criterion value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criterion {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Uuid(Uuid),
}

impl Criterion {
    pub fn is_null(&self) -> bool {
        matches!(self, Criterion::Null)
    }

    fn hash_value(&self) -> u64 {
        match self {
            Criterion::Null => 0,
            other => {
                let mut hasher = DefaultHasher::new();
                other.hash(&mut hasher);
                hasher.finish()
            }
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Null => f.write_str("NULL"),
            Criterion::Bool(b) => write!(f, "{b}"),
            Criterion::Int(i) => write!(f, "{i}"),
            Criterion::Text(s) => f.write_str(s),
            Criterion::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<i64> for Criterion {
    fn from(value: i64) -> Self {
        Criterion::Int(value)
    }
}

impl From<i32> for Criterion {
    fn from(value: i32) -> Self {
        Criterion::Int(value.into())
    }
}

impl From<u32> for Criterion {
    fn from(value: u32) -> Self {
        Criterion::Int(value.into())
    }
}

impl From<bool> for Criterion {
    fn from(value: bool) -> Self {
        Criterion::Bool(value)
    }
}

impl From<&str> for Criterion {
    fn from(value: &str) -> Self {
        Criterion::Text(value.to_string())
    }
}

impl From<String> for Criterion {
    fn from(value: String) -> Self {
        Criterion::Text(value)
    }
}

impl From<Uuid> for Criterion {
    fn from(value: Uuid) -> Self {
        Criterion::Uuid(value)
    }
}

impl<T: Into<Criterion>> From<Option<T>> for Criterion {
    fn from(value: Option<T>) -> Self {
        value.map_or(Criterion::Null, Into::into)
    }
}

/// Ordered, immutable sequence of criterion values.
///
/// The hash is computed once at construction. Equality is element-wise,
/// with two `Null`s comparing equal.
#[derive(Debug, Clone)]
pub struct CacheCriteria {
    values: Vec<Criterion>,
    hash: u64,
}

impl CacheCriteria {
    pub fn new(values: Vec<Criterion>) -> Self {
        let hash = values
            .iter()
            .fold(0u64, |acc, value| acc.wrapping_mul(31).wrapping_add(value.hash_value()));
        Self { values, hash }
    }

    /// Criteria holding a single value.
    pub fn single(value: impl Into<Criterion>) -> Self {
        Self::new(vec![value.into()])
    }

    /// Criteria with no values.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn values(&self) -> &[Criterion] {
        &self.values
    }

    pub fn first(&self) -> Option<&Criterion> {
        self.values.first()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The memoized hash value.
    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for CacheCriteria {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.values == other.values
    }
}

impl Eq for CacheCriteria {}

impl Hash for CacheCriteria {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl From<Vec<Criterion>> for CacheCriteria {
    fn from(values: Vec<Criterion>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<Criterion> for CacheCriteria {
    fn from_iter<I: IntoIterator<Item = Criterion>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for CacheCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return f.write_str("[ No criteria ]");
        }
        for (i, value) in self.values.iter().enumerate() {
            match value {
                Criterion::Null => write!(f, "[NULL{i}]")?,
                other => write!(f, "[{other}]")?,
            }
        }
        Ok(())
    }
}

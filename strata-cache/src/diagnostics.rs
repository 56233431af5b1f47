//! Read-only views of a cache for operators.

use crate::context::CallContext;
use crate::directory::CacheDirectory;
use crate::entity::CachedObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_core::format_age;

/// One mapped key and the state of its entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub key: String,
    pub last_access: Option<DateTime<Utc>>,
    /// Time since last access, e.g. `1M30.0S`
    pub age: String,
    pub bucketed: bool,
    pub has_object: bool,
}

impl CacheDirectory {
    /// `<last access> <key>` lines, sorted.
    pub fn output_contents(&self, ctx: &CallContext) -> Vec<String> {
        let mut lines: Vec<String> = self
            .cache(ctx)
            .entries()
            .into_iter()
            .map(|(key, entry)| {
                let at = DateTime::from_timestamp_millis(entry.last_access_millis())
                    .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
                    .unwrap_or_default();
                format!("{at} {key}")
            })
            .collect();
        lines.sort();
        lines
    }

    /// Every mapped key and the object it resolves to. Does not touch.
    pub fn contents(&self, ctx: &CallContext) -> BTreeMap<String, CachedObject> {
        self.cache(ctx)
            .entries()
            .into_iter()
            .filter_map(|(key, entry)| entry.peek_object().map(|object| (key, object)))
            .collect()
    }

    /// Serializable per-key snapshot, ordered by key.
    pub fn snapshot(&self, ctx: &CallContext) -> Vec<EntrySnapshot> {
        let now = self.clock().now_millis();
        let mut snapshot: Vec<EntrySnapshot> = self
            .cache(ctx)
            .entries()
            .into_iter()
            .map(|(key, entry)| {
                let last = entry.last_access_millis();
                EntrySnapshot {
                    key,
                    last_access: DateTime::from_timestamp_millis(last),
                    age: format_age(now - last),
                    bucketed: entry.is_bucketed(),
                    has_object: entry.has_object(),
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.key.cmp(&b.key));
        snapshot
    }
}

//! Normalized vehicle registration keys.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalized vehicle identifier: trimmed, uppercased, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputKey(String);

impl InputKey {
    /// Normalize raw input into a key. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InputKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trim, uppercase and collapse inner whitespace runs to a single space.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Normalize and deduplicate keys, preserving first-seen order.
pub fn normalize_keys<I, S>(raw: I) -> Vec<InputKey>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|s| InputKey::parse(s.as_ref()))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

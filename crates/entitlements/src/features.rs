//! Effective feature sets

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sentinel feature key meaning "every feature is granted"
pub const WILDCARD_FEATURE: &str = "*";

/// De-duplicated set of feature keys a user may use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The wildcard set `{"*"}`
    pub fn all() -> Self {
        Self(BTreeSet::from([WILDCARD_FEATURE.to_string()]))
    }

    pub fn grants_all(&self) -> bool {
        self.0.contains(WILDCARD_FEATURE)
    }

    /// Exact membership, ignoring the wildcard
    pub fn contains(&self, feature_key: &str) -> bool {
        self.0.contains(feature_key)
    }

    /// Whether `feature_key` is usable, honouring the wildcard
    pub fn allows(&self, feature_key: &str) -> bool {
        self.grants_all() || self.contains(feature_key)
    }

    pub fn insert(&mut self, feature_key: impl Into<String>) -> bool {
        self.0.insert(feature_key.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Extend<String> for FeatureSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> Extend<&'a String> for FeatureSet {
    fn extend<I: IntoIterator<Item = &'a String>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().cloned());
    }
}

impl FromIterator<String> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_allows_unknown_keys() {
        let all = FeatureSet::all();
        assert!(all.grants_all());
        assert!(all.allows("anything_at_all"));
        assert!(!all.contains("anything_at_all"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let set: FeatureSet = ["chat_rooms", "polls", "chat_rooms"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.allows("polls"));
        assert!(!set.allows("pledge_pool"));
    }

    #[test]
    fn test_serializes_as_sorted_list() {
        let set: FeatureSet = ["polls", "chat_rooms"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["chat_rooms","polls"]"#);
    }
}

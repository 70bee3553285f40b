use crate::tree::NodeId;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Sanitized first segment -> root node, ordered so that every key sharing a
/// prefix is one contiguous range.
#[derive(Debug, Default, Clone)]
pub struct RootIndex {
    roots: BTreeMap<String, NodeId>,
}

impl RootIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, sanitized: &str) -> Option<NodeId> {
        self.roots.get(sanitized).copied()
    }

    pub fn insert(&mut self, sanitized: String, id: NodeId) -> Option<NodeId> {
        self.roots.insert(sanitized, id)
    }

    pub fn remove(&mut self, sanitized: &str) -> Option<NodeId> {
        self.roots.remove(sanitized)
    }

    /// Roots whose key starts with `prefix`, in key order. An empty prefix
    /// yields every root.
    pub fn prefix_range<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, NodeId)> + 'a {
        self.roots
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(key, id)| (key.as_str(), *id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.roots.iter().map(|(key, id)| (key.as_str(), *id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MetadataTree;
    use pretty_assertions::assert_eq;

    #[test]
    fn prefix_range_is_contiguous_and_bounded() {
        let mut tree = MetadataTree::new();
        let mut index = RootIndex::new();
        for key in ["server", "spring", "springdoc", "management", "sp"] {
            index.insert(key.to_string(), tree.create_root(key));
        }

        let keys: Vec<&str> = index.prefix_range("spr").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["spring", "springdoc"]);

        let keys: Vec<&str> = index.prefix_range("sp").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["sp", "spring", "springdoc"]);

        assert_eq!(index.prefix_range("").count(), 5);
        assert_eq!(index.prefix_range("zzz").count(), 0);
    }
}

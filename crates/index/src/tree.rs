use crate::source::SourceId;
use crate::suggestion::{Suggestion, SuggestionIcon, SuggestionKind, SuggestionSet};
use keyhint_metadata::{
    declaration_link, join_path, sanitize, shortened_type, GroupRecord, HintRecord,
    PropertyRecord,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Stable handle of a node in a [`MetadataTree`].
///
/// Slots are reused after a node is released; the generation keeps a stale
/// handle from resolving to the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Record attached to the final node of an inserted path.
#[derive(Debug, Clone)]
pub enum MetadataRecord {
    Group(GroupRecord),
    Property(PropertyRecord),
}

#[derive(Debug, Clone)]
struct Contributed<T> {
    source: SourceId,
    record: T,
}

/// One key segment.
///
/// Records are kept per contributing source in insertion order; the first
/// one still present is the effective record.
#[derive(Debug, Clone)]
pub struct MetadataNode {
    segment_name: String,
    sanitized_name: String,
    depth: usize,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    groups: Vec<Contributed<GroupRecord>>,
    properties: Vec<Contributed<PropertyRecord>>,
    hints: Vec<Contributed<HintRecord>>,
    owners: BTreeSet<SourceId>,
}

impl MetadataNode {
    fn new(segment_name: &str, depth: usize, parent: Option<NodeId>) -> Self {
        Self {
            segment_name: segment_name.to_string(),
            sanitized_name: sanitize(segment_name),
            depth,
            parent,
            children: BTreeMap::new(),
            groups: Vec::new(),
            properties: Vec::new(),
            hints: Vec::new(),
            owners: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn segment_name(&self) -> &str {
        &self.segment_name
    }

    #[must_use]
    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    /// Number of segments in this node's full path; roots are at depth 1.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    #[must_use]
    pub fn child(&self, sanitized_name: &str) -> Option<NodeId> {
        self.children.get(sanitized_name).copied()
    }

    #[must_use]
    pub fn group(&self) -> Option<&GroupRecord> {
        self.groups.first().map(|c| &c.record)
    }

    #[must_use]
    pub fn property(&self) -> Option<&PropertyRecord> {
        self.properties.first().map(|c| &c.record)
    }

    #[must_use]
    pub fn hint(&self) -> Option<&HintRecord> {
        self.hints.first().map(|c| &c.record)
    }

    pub fn owners(&self) -> impl Iterator<Item = &SourceId> {
        self.owners.iter()
    }

    #[must_use]
    pub fn is_owned_by(&self, source: &SourceId) -> bool {
        self.owners.contains(source)
    }

    /// A property with nothing below it: completion continues with values.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && !self.properties.is_empty()
    }

    fn attach(&mut self, record: MetadataRecord, owner: &SourceId) {
        match record {
            MetadataRecord::Group(record) => {
                if !self.groups.iter().any(|c| &c.source == owner) {
                    self.groups.push(Contributed {
                        source: owner.clone(),
                        record,
                    });
                }
            }
            MetadataRecord::Property(record) => {
                if !self.properties.iter().any(|c| &c.source == owner) {
                    self.properties.push(Contributed {
                        source: owner.clone(),
                        record,
                    });
                }
            }
        }
    }

    fn forget(&mut self, owner: &SourceId) {
        self.owners.remove(owner);
        self.groups.retain(|c| &c.source != owner);
        self.properties.retain(|c| &c.source != owner);
        self.hints.retain(|c| &c.source != owner);
    }
}

/// Owned snapshot of a node, safe to hand out past the index lock.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub node: NodeId,
    pub segment_name: String,
    pub full_path: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<HintRecord>,
    pub owners: Vec<SourceId>,
    pub children: Vec<String>,
    pub leaf: bool,
}

impl NodeInfo {
    /// Markdown documentation of the effective record.
    #[must_use]
    pub fn documentation(&self) -> String {
        if let Some(property) = &self.property {
            return property.documentation(&self.full_path);
        }
        if let Some(group) = &self.group {
            return group.documentation(&self.full_path);
        }
        format!("**{}**", self.full_path)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<MetadataNode>,
}

/// Arena of metadata nodes. Roots are tracked outside the arena (see
/// [`crate::RootIndex`]); a node lives as long as some source owns it.
#[derive(Debug, Default)]
pub struct MetadataTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl MetadataTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&MetadataNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut MetadataNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: MetadataNode) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.node = Some(node);
                return NodeId {
                    index,
                    generation: slot.generation,
                };
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Creates an unowned root node; ownership is added by [`Self::insert_path`].
    pub fn create_root(&mut self, segment_name: &str) -> NodeId {
        self.alloc(MetadataNode::new(segment_name, 1, None))
    }

    /// Frees `id` and everything below it. The caller unlinks `id` from its
    /// parent (or from the root index) beforehand.
    pub fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let taken = match self.slots.get_mut(next.index as usize) {
                Some(slot) if slot.generation == next.generation => {
                    let node = slot.node.take();
                    if node.is_some() {
                        slot.generation = slot.generation.wrapping_add(1);
                    }
                    node
                }
                _ => None,
            };
            if let Some(node) = taken {
                self.free.push(next.index);
                self.live -= 1;
                stack.extend(node.children.into_values());
            }
        }
    }

    /// Inserts `segments` below `root` (which stands for `segments[0]`).
    ///
    /// Existing nodes are reused down to the deepest match and the remainder is
    /// created. `owner` is added to every node on the path and `record` is
    /// attached to the last one unless `owner` already contributed a record of
    /// that kind there. Records of other owners are never replaced.
    pub fn insert_path(
        &mut self,
        root: NodeId,
        segments: &[&str],
        record: MetadataRecord,
        owner: &SourceId,
    ) -> Option<NodeId> {
        let mut current = root;
        self.get_mut(current)?.owners.insert(owner.clone());

        for segment in segments.iter().skip(1) {
            let key = sanitize(segment);
            let (existing, depth) = {
                let node = self.get(current)?;
                (node.child(&key), node.depth)
            };
            let next = match existing {
                Some(child) => child,
                None => {
                    let child = self.alloc(MetadataNode::new(segment, depth + 1, Some(current)));
                    self.get_mut(current)?.children.insert(key, child);
                    child
                }
            };
            self.get_mut(next)?.owners.insert(owner.clone());
            current = next;
        }

        self.get_mut(current)?.attach(record, owner);
        Some(current)
    }

    /// Attaches `hint` to the property at `id`. Returns `false` (and drops the
    /// hint) when the node carries no property.
    pub fn attach_hint(&mut self, id: NodeId, hint: HintRecord, owner: &SourceId) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        if node.properties.is_empty() {
            return false;
        }
        if !node.hints.iter().any(|c| &c.source == owner) {
            node.hints.push(Contributed {
                source: owner.clone(),
                record: hint,
            });
        }
        true
    }

    /// Drops the hint `owner` attached at `id`. Hints may come from a source
    /// that does not own the node, so the owner sweep alone misses them.
    pub fn forget_hint(&mut self, id: NodeId, owner: &SourceId) {
        if let Some(node) = self.get_mut(id) {
            node.hints.retain(|c| &c.source != owner);
        }
    }

    /// Walks sanitized `segments` from index `from` below `start` for as long
    /// as children match, returning the deepest node reached.
    ///
    /// With `require_full_match` the walk must consume every segment.
    #[must_use]
    pub fn find_deepest_match(
        &self,
        start: NodeId,
        segments: &[String],
        from: usize,
        require_full_match: bool,
    ) -> Option<NodeId> {
        let mut current = start;
        let mut consumed = from;
        while let Some(segment) = segments.get(consumed) {
            match self.get(current)?.child(segment) {
                Some(child) => {
                    current = child;
                    consumed += 1;
                }
                None => break,
            }
        }
        if require_full_match && consumed < segments.len() {
            return None;
        }
        Some(current)
    }

    /// Drops `owner` from `id` and its subtree, freeing every descendant left
    /// without owners. Returns whether `id` itself is now ownerless; releasing
    /// it is then up to the caller.
    ///
    /// Subtrees not owned by `owner` are skipped: insertion adds an owner to
    /// every node on a path, so a node's owners include all of its children's.
    pub fn remove_owner(&mut self, id: NodeId, owner: &SourceId) -> bool {
        let children: Vec<(String, NodeId)> = match self.get(id) {
            Some(node) if node.is_owned_by(owner) => node
                .children
                .iter()
                .map(|(key, child)| (key.clone(), *child))
                .collect(),
            Some(node) => return node.owners.is_empty(),
            None => return true,
        };

        for (key, child) in children {
            if self.remove_owner(child, owner) {
                if let Some(node) = self.get_mut(id) {
                    node.children.remove(&key);
                }
                self.release(child);
            }
        }

        match self.get_mut(id) {
            Some(node) => {
                node.forget(owner);
                node.owners.is_empty()
            }
            None => true,
        }
    }

    #[must_use]
    pub fn full_path(&self, id: NodeId) -> String {
        self.path_from_depth(id, 1)
    }

    /// Dotted path of `id` starting at the ancestor with depth `origin_depth`.
    fn path_from_depth(&self, id: NodeId, origin_depth: usize) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.get(current) else {
                break;
            };
            if node.depth < origin_depth {
                break;
            }
            names.push(node.segment_name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        join_path(&names)
    }

    #[must_use]
    pub fn node_info(&self, id: NodeId) -> Option<NodeInfo> {
        let node = self.get(id)?;
        Some(NodeInfo {
            node: id,
            segment_name: node.segment_name.clone(),
            full_path: self.full_path(id),
            depth: node.depth,
            group: node.group().cloned(),
            property: node.property().cloned(),
            hint: node.hint().cloned(),
            owners: node.owners.iter().cloned().collect(),
            children: node
                .children()
                .filter_map(|child| self.get(child))
                .map(|child| child.segment_name.clone())
                .collect(),
            leaf: node.is_leaf(),
        })
    }

    /// Matches `query[start_with..]` against `id` and below.
    ///
    /// A node matches when its sanitized name starts with the current query
    /// segment; the last segment yields a suggestion, earlier ones descend into
    /// the children. With `proceed_till_leaf`, a non-matching node hands the
    /// same segment down to its children, so a segment may match at any depth.
    pub(crate) fn find_suggestions(
        &self,
        id: NodeId,
        query: &[String],
        origin_depth: usize,
        start_with: usize,
        proceed_till_leaf: bool,
        out: &mut SuggestionSet,
    ) {
        let Some(node) = self.get(id) else {
            return;
        };
        let Some(segment) = query.get(start_with) else {
            return;
        };

        if node.sanitized_name.starts_with(segment.as_str()) {
            if start_with + 1 == query.len() {
                out.insert(self.key_suggestion(id, node, origin_depth));
            } else {
                for child in node.children() {
                    self.find_suggestions(
                        child,
                        query,
                        origin_depth,
                        start_with + 1,
                        proceed_till_leaf,
                        out,
                    );
                }
            }
        } else if proceed_till_leaf {
            for child in node.children() {
                self.find_suggestions(child, query, origin_depth, start_with, true, out);
            }
        }
    }

    /// Runs [`Self::find_suggestions`] over the children of `start`, with
    /// suggestion text relative to those children.
    pub(crate) fn find_child_suggestions(
        &self,
        start: NodeId,
        query: &[String],
        start_with: usize,
        proceed_till_leaf: bool,
        out: &mut SuggestionSet,
    ) {
        let Some(node) = self.get(start) else {
            return;
        };
        let origin_depth = node.depth + 1;
        for child in node.children() {
            self.find_suggestions(child, query, origin_depth, start_with, proceed_till_leaf, out);
        }
    }

    /// Hinted values of the property at `id` whose text starts with `partial`
    /// (case-insensitive).
    pub(crate) fn value_suggestions(&self, id: NodeId, partial: &str, out: &mut SuggestionSet) {
        let Some(node) = self.get(id) else {
            return;
        };
        let Some(hint) = node.hint() else {
            return;
        };
        let property = node.property();
        let prefix = partial.trim().to_lowercase();
        let full_path = self.full_path(id);

        for value in &hint.values {
            let text = value.value_text();
            if !text.to_lowercase().starts_with(&prefix) {
                continue;
            }
            out.insert(Suggestion {
                display_text: text,
                full_path: full_path.clone(),
                description: value.description.clone(),
                declared_type: property
                    .and_then(|p| p.type_name.as_deref())
                    .map(shortened_type),
                doc_link: property.and_then(|p| declaration_link(p.source_type.as_deref(), None)),
                icon: SuggestionIcon::Value,
                kind: SuggestionKind::Value,
                deprecated: false,
                node: id,
            });
        }
    }

    fn key_suggestion(&self, id: NodeId, node: &MetadataNode, origin_depth: usize) -> Suggestion {
        let display_text = self.path_from_depth(id, origin_depth);
        let full_path = self.full_path(id);

        let property = node.property().filter(|_| node.is_leaf() || node.group().is_none());
        if let Some(property) = property {
            let has_hint_values = node.hint().is_some_and(|h| !h.values.is_empty());
            return Suggestion {
                display_text,
                full_path,
                description: property.description.clone(),
                declared_type: property.type_name.as_deref().map(shortened_type),
                doc_link: declaration_link(property.source_type.as_deref(), None),
                icon: SuggestionIcon::for_property(property.type_name.as_deref(), has_hint_values),
                kind: SuggestionKind::Key,
                deprecated: property.is_deprecated(),
                node: id,
            };
        }

        let group = node.group();
        Suggestion {
            display_text,
            full_path,
            description: group.and_then(|g| g.description.clone()),
            declared_type: group
                .and_then(|g| g.type_name.as_deref())
                .map(shortened_type),
            doc_link: group.and_then(|g| {
                declaration_link(g.source_type.as_deref(), g.source_method.as_deref())
            }),
            icon: SuggestionIcon::Group,
            kind: SuggestionKind::Key,
            deprecated: false,
            node: id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn property(name: &str, description: &str) -> MetadataRecord {
        MetadataRecord::Property(PropertyRecord {
            name: name.to_string(),
            type_name: Some("java.lang.String".to_string()),
            description: Some(description.to_string()),
            source_type: None,
            default_value: None,
            deprecated: false,
            deprecation: None,
        })
    }

    fn insert(tree: &mut MetadataTree, root: NodeId, path: &str, owner: &SourceId) -> NodeId {
        let segments: Vec<&str> = path.split('.').collect();
        tree.insert_path(root, &segments, property(path, owner.as_str()), owner)
            .unwrap()
    }

    fn sanitized(path: &str) -> Vec<String> {
        path.split('.').map(sanitize).collect()
    }

    #[test]
    fn insert_reuses_existing_prefix() {
        let mut tree = MetadataTree::new();
        let a = SourceId::from("a.jar");
        let root = tree.create_root("server");
        insert(&mut tree, root, "server.port", &a);
        insert(&mut tree, root, "server.address", &a);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(root).unwrap().children().count(), 2);
    }

    #[test]
    fn spelling_variants_share_a_node() {
        let mut tree = MetadataTree::new();
        let a = SourceId::from("a.jar");
        let root = tree.create_root("server");
        let kebab = insert(&mut tree, root, "server.max-http-size", &a);
        let camel = insert(&mut tree, root, "server.maxHttpSize", &a);

        assert_eq!(kebab, camel);
        assert_eq!(tree.get(kebab).unwrap().segment_name(), "max-http-size");
    }

    #[test]
    fn first_writer_wins_until_removed() {
        let mut tree = MetadataTree::new();
        let (a, b) = (SourceId::from("a.jar"), SourceId::from("b.jar"));
        let root = tree.create_root("a");
        let first = insert(&mut tree, root, "a.b.c", &a);
        let second = insert(&mut tree, root, "a.b.c", &b);
        assert_eq!(first, second);
        assert_eq!(
            tree.get(first).unwrap().property().unwrap().description.as_deref(),
            Some("a.jar")
        );

        assert!(!tree.remove_owner(root, &a));
        let node = tree.get(first).unwrap();
        assert_eq!(node.property().unwrap().description.as_deref(), Some("b.jar"));
        assert_eq!(node.owners().cloned().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn reinserting_same_owner_does_not_duplicate() {
        let mut tree = MetadataTree::new();
        let a = SourceId::from("a.jar");
        let root = tree.create_root("x");
        let id = insert(&mut tree, root, "x.y", &a);
        insert(&mut tree, root, "x.y", &a);

        let node = tree.get(id).unwrap();
        assert_eq!(node.owners().count(), 1);
        assert_eq!(node.properties.len(), 1);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn removing_last_owner_frees_subtree() {
        let mut tree = MetadataTree::new();
        let (a, b) = (SourceId::from("a.jar"), SourceId::from("b.jar"));
        let root = tree.create_root("x");
        let only_a = insert(&mut tree, root, "x.y.z", &a);
        let shared = insert(&mut tree, root, "x.w", &b);

        assert!(!tree.remove_owner(root, &a));
        assert!(tree.get(only_a).is_none());
        assert!(tree.get(shared).is_some());
        assert_eq!(tree.len(), 2);

        assert!(tree.remove_owner(root, &b));
        tree.release(root);
        assert!(tree.is_empty());
    }

    #[test]
    fn released_handles_do_not_resolve_to_new_nodes() {
        let mut tree = MetadataTree::new();
        let a = SourceId::from("a.jar");
        let root = tree.create_root("x");
        let stale = insert(&mut tree, root, "x.y", &a);
        assert!(!tree.remove_owner(stale, &SourceId::from("other")));
        tree.remove_owner(root, &a);
        tree.release(root);

        let fresh_root = tree.create_root("q");
        assert!(tree.get(stale).is_none());
        assert!(tree.get(root).is_none());
        assert_eq!(tree.get(fresh_root).unwrap().segment_name(), "q");
    }

    #[test]
    fn deepest_match_stops_at_first_miss() {
        let mut tree = MetadataTree::new();
        let a = SourceId::from("a.jar");
        let root = tree.create_root("spring");
        let datasource = insert(&mut tree, root, "spring.datasource", &a);
        let url = insert(&mut tree, root, "spring.datasource.url", &a);

        let partial = sanitized("spring.data-source.hikari");
        assert_eq!(tree.find_deepest_match(root, &partial, 1, false), Some(datasource));
        assert_eq!(tree.find_deepest_match(root, &partial, 1, true), None);
        assert_eq!(
            tree.find_deepest_match(root, &sanitized("spring.dataSource.URL"), 1, true),
            Some(url)
        );
    }

    #[test]
    fn hint_requires_property() {
        let mut tree = MetadataTree::new();
        let a = SourceId::from("a.jar");
        let root = tree.create_root("x");
        let leaf = insert(&mut tree, root, "x.mode", &a);
        let hint = HintRecord {
            name: "x.mode".into(),
            values: vec![],
        };

        assert!(tree.attach_hint(leaf, hint.clone(), &a));
        assert!(!tree.attach_hint(root, hint, &a));
        assert!(tree.get(leaf).unwrap().hint().is_some());
    }

    #[test]
    fn forgetting_hint_keeps_other_contributors() {
        let mut tree = MetadataTree::new();
        let (a, b) = (SourceId::from("a.jar"), SourceId::from("b.jar"));
        let root = tree.create_root("x");
        let leaf = insert(&mut tree, root, "x.mode", &a);
        let hint = |value: &str| HintRecord {
            name: "x.mode".into(),
            values: vec![keyhint_metadata::HintValue {
                value: value.into(),
                description: None,
            }],
        };
        assert!(tree.attach_hint(leaf, hint("from-b"), &b));
        assert!(tree.attach_hint(leaf, hint("from-a"), &a));

        tree.forget_hint(leaf, &b);
        let node = tree.get(leaf).unwrap();
        assert_eq!(node.hint().unwrap().values[0].value_text(), "from-a");
        assert!(node.is_owned_by(&a));
        assert!(!node.is_owned_by(&b));
    }

    #[test]
    fn suggestion_text_is_relative_to_origin() {
        let mut tree = MetadataTree::new();
        let a = SourceId::from("a.jar");
        let root = tree.create_root("server");
        insert(&mut tree, root, "server.ssl.key-store", &a);

        let mut out = SuggestionSet::default();
        tree.find_suggestions(root, &sanitized("keys"), 1, 0, true, &mut out);
        let texts: Vec<String> = out
            .into_sorted_vec()
            .into_iter()
            .map(|s| s.display_text)
            .collect();
        assert_eq!(texts, vec!["server.ssl.key-store".to_string()]);

        let mut out = SuggestionSet::default();
        tree.find_child_suggestions(root, &sanitized("ssl.k"), 0, false, &mut out);
        let texts: Vec<String> = out
            .into_sorted_vec()
            .into_iter()
            .map(|s| s.display_text)
            .collect();
        assert_eq!(texts, vec!["ssl.key-store".to_string()]);
    }
}

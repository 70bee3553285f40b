use crate::tree::NodeId;
use keyhint_metadata::ValueKind;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// A key (group or property) to complete.
    Key,
    /// An allowed value of a property.
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionIcon {
    Group,
    Boolean,
    Number,
    Char,
    String,
    Enum,
    Map,
    Iterable,
    Array,
    Class,
    Value,
    Unknown,
}

impl SuggestionIcon {
    /// Icon of a property with the given declared type. Properties restricted
    /// to hinted values read as enumerations unless their type says otherwise.
    #[must_use]
    pub fn for_property(type_name: Option<&str>, has_hint_values: bool) -> Self {
        match ValueKind::classify(type_name) {
            ValueKind::Boolean => Self::Boolean,
            ValueKind::Number => Self::Number,
            ValueKind::Char => Self::Char,
            ValueKind::String if has_hint_values => Self::Enum,
            ValueKind::String => Self::String,
            ValueKind::Map => Self::Map,
            ValueKind::Iterable => Self::Iterable,
            ValueKind::Array => Self::Array,
            ValueKind::Class | ValueKind::Unknown if has_hint_values => Self::Enum,
            ValueKind::Class => Self::Class,
            ValueKind::Unknown => Self::Unknown,
        }
    }
}

/// One autocomplete candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Text to insert: the dotted path from the level the search started at,
    /// or the value itself for value suggestions.
    pub display_text: String,
    pub full_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared type with package qualifiers stripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    pub icon: SuggestionIcon,
    pub kind: SuggestionKind,
    pub deprecated: bool,
    /// Tree node this suggestion was produced from.
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SuggestionKey {
    Node(NodeId),
    Value(NodeId, String),
}

/// Suggestions of one query, deduplicated by the node (or value) they stand for.
#[derive(Debug, Default)]
pub(crate) struct SuggestionSet {
    entries: HashMap<SuggestionKey, Suggestion>,
}

impl SuggestionSet {
    pub(crate) fn insert(&mut self, suggestion: Suggestion) {
        let key = match suggestion.kind {
            SuggestionKind::Key => SuggestionKey::Node(suggestion.node),
            SuggestionKind::Value => {
                SuggestionKey::Value(suggestion.node, suggestion.display_text.clone())
            }
        };
        self.entries.entry(key).or_insert(suggestion);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_sorted_vec(self) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = self.entries.into_values().collect();
        suggestions.sort_by(|a, b| {
            a.display_text
                .cmp(&b.display_text)
                .then_with(|| a.full_path.cmp(&b.full_path))
        });
        suggestions
    }
}

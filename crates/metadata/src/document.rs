use crate::error::{MetadataError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A `groups[]` entry: a key prefix that aggregates properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deprecation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

/// A `properties[]` entry: a settable key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation: Option<Deprecation>,
}

impl PropertyRecord {
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        self.deprecated || self.deprecation.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintValue {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HintValue {
    /// Text form of the allowed value; strings are not quoted.
    #[must_use]
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A `hints[]` entry: allowed values for the property of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintRecord {
    pub name: String,
    #[serde(default)]
    pub values: Vec<HintValue>,
}

/// One parsed metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataDocument {
    pub groups: Vec<GroupRecord>,
    pub properties: Vec<PropertyRecord>,
    pub hints: Vec<HintRecord>,
    /// Entries that could not be decoded and were left out.
    #[serde(skip)]
    pub skipped: usize,
}

impl MetadataDocument {
    /// Parses a metadata document.
    ///
    /// Decoding is best effort: missing or `null` arrays are empty, unknown
    /// fields are ignored, and individual entries that fail to decode (or have
    /// an empty name) are dropped and counted in [`MetadataDocument::skipped`].
    /// Only a document that is not JSON, or not a JSON object, is an error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let root: Value = serde_json::from_slice(bytes)?;
        let Value::Object(mut root) = root else {
            return Err(MetadataError::NotAnObject);
        };

        let mut skipped = 0usize;
        let groups = decode_entries::<GroupRecord>(root.remove("groups"), &mut skipped, |g| {
            &g.name
        });
        let properties =
            decode_entries::<PropertyRecord>(root.remove("properties"), &mut skipped, |p| {
                &p.name
            });
        let hints =
            decode_entries::<HintRecord>(root.remove("hints"), &mut skipped, |h| &h.name);

        if skipped > 0 {
            log::debug!("Skipped {skipped} undecodable metadata entries");
        }

        Ok(Self {
            groups,
            properties,
            hints,
            skipped,
        })
    }

    /// Appends the records of `other` after this document's records.
    pub fn extend(&mut self, other: Self) {
        self.groups.extend(other.groups);
        self.properties.extend(other.properties);
        self.hints.extend(other.hints);
        self.skipped += other.skipped;
    }

    /// Orders every record list by name. Sorting is stable, so records sharing
    /// a name keep their document order.
    pub fn sort_by_name(&mut self) {
        self.groups.sort_by(|a, b| a.name.cmp(&b.name));
        self.properties.sort_by(|a, b| a.name.cmp(&b.name));
        self.hints.sort_by(|a, b| a.name.cmp(&b.name));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.properties.is_empty() && self.hints.is_empty()
    }
}

fn decode_entries<T: DeserializeOwned>(
    raw: Option<Value>,
    skipped: &mut usize,
    name_of: impl Fn(&T) -> &String,
) -> Vec<T> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };

    let mut decoded = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<T>(entry) {
            Ok(record) if !name_of(&record).trim().is_empty() => decoded.push(record),
            Ok(_) => *skipped += 1,
            Err(err) => {
                log::trace!("Dropping metadata entry: {err}");
                *skipped += 1;
            }
        }
    }
    decoded
}

use crate::document::{GroupRecord, PropertyRecord};
use crate::value_type::remove_generics;
use serde_json::Value;

/// Location a record was declared at: the source type without generics, with
/// `#method` appended when the declaring method is known.
#[must_use]
pub fn declaration_link(source_type: Option<&str>, source_method: Option<&str>) -> Option<String> {
    let source_type = source_type.map(str::trim).filter(|s| !s.is_empty())?;
    let mut link = remove_generics(source_type);
    if let Some(method) = source_method.map(str::trim).filter(|m| !m.is_empty()) {
        link.push('#');
        link.push_str(method);
    }
    Some(link)
}

impl GroupRecord {
    /// Markdown documentation for the group at `full_path`.
    #[must_use]
    pub fn documentation(&self, full_path: &str) -> String {
        render(
            full_path,
            self.type_name.as_deref(),
            self.description.as_deref(),
            None,
            declaration_link(self.source_type.as_deref(), self.source_method.as_deref()),
            false,
        )
    }
}

impl PropertyRecord {
    /// Markdown documentation for the property at `full_path`.
    #[must_use]
    pub fn documentation(&self, full_path: &str) -> String {
        render(
            full_path,
            self.type_name.as_deref(),
            self.description.as_deref(),
            self.default_value.as_ref(),
            declaration_link(self.source_type.as_deref(), None),
            self.is_deprecated(),
        )
    }
}

fn render(
    full_path: &str,
    type_name: Option<&str>,
    description: Option<&str>,
    default_value: Option<&Value>,
    declared_at: Option<String>,
    deprecated: bool,
) -> String {
    let mut doc = format!("**{full_path}**");
    if let Some(type_name) = type_name {
        doc.push_str(&format!(" (`{type_name}`)"));
    }
    if deprecated {
        doc.push_str("\n\n*Deprecated*");
    }
    if let Some(description) = description {
        doc.push_str("\n\n");
        doc.push_str(description);
    }
    if let Some(default_value) = default_value {
        let text = match default_value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        doc.push_str(&format!("\n\nDefault: `{text}`"));
    }
    // Pointing at the type itself adds nothing.
    if let Some(declared_at) = declared_at.filter(|d| Some(d.as_str()) != type_name) {
        doc.push_str(&format!("\n\nDeclared at `{declared_at}`"));
    }
    doc
}

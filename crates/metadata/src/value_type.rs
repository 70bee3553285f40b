use serde::Serialize;

/// Drops generic arguments: `java.util.Map<java.lang.String,java.lang.Long>` becomes `java.util.Map`.
#[must_use]
pub fn remove_generics(type_name: &str) -> String {
    match type_name.find('<') {
        Some(idx) => type_name[..idx].trim().to_string(),
        None => type_name.trim().to_string(),
    }
}

/// Strips package qualifiers from every type named in `type_name`, keeping
/// generic and array punctuation.
///
/// `java.util.Map<java.lang.String,java.lang.Integer>` becomes `Map<String,Integer>`.
#[must_use]
pub fn shortened_type(type_name: &str) -> String {
    let mut shortened = String::with_capacity(type_name.len());
    let mut token = String::new();

    let flush = |token: &mut String, out: &mut String| {
        if !token.is_empty() {
            let simple = token.rsplit('.').next().unwrap_or(token.as_str());
            out.push_str(simple);
            token.clear();
        }
    };

    for c in type_name.trim().chars() {
        if c.is_alphanumeric() || matches!(c, '.' | '$' | '_') {
            token.push(c);
        } else {
            flush(&mut token, &mut shortened);
            shortened.push(c);
        }
    }
    flush(&mut token, &mut shortened);
    shortened
}

/// Coarse classification of a declared type, used to pick suggestion icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Number,
    Char,
    String,
    Map,
    Iterable,
    Array,
    Class,
    Unknown,
}

impl ValueKind {
    #[must_use]
    pub fn classify(type_name: Option<&str>) -> Self {
        let Some(type_name) = type_name.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::Unknown;
        };

        if type_name.ends_with("[]") {
            return Self::Array;
        }

        match remove_generics(type_name).as_str() {
            "boolean" | "java.lang.Boolean" => Self::Boolean,
            "byte" | "short" | "int" | "long" | "float" | "double" | "java.lang.Byte"
            | "java.lang.Short" | "java.lang.Integer" | "java.lang.Long" | "java.lang.Float"
            | "java.lang.Double" | "java.math.BigInteger" | "java.math.BigDecimal" => {
                Self::Number
            }
            "char" | "java.lang.Character" => Self::Char,
            "java.lang.String" | "java.lang.CharSequence" => Self::String,
            "java.util.Map" | "java.util.HashMap" | "java.util.LinkedHashMap"
            | "java.util.TreeMap" | "java.util.SortedMap" | "java.util.Properties" => Self::Map,
            "java.lang.Iterable" | "java.util.Collection" | "java.util.List"
            | "java.util.ArrayList" | "java.util.LinkedList" | "java.util.Set"
            | "java.util.HashSet" | "java.util.LinkedHashSet" | "java.util.SortedSet"
            | "java.util.TreeSet" => Self::Iterable,
            other if other.contains('.') => Self::Class,
            _ => Self::Unknown,
        }
    }
}

/// Separator between key segments.
pub const PATH_SEPARATOR: char = '.';

/// Canonical form of a key or key segment.
///
/// Case is folded and `-`/`_` are dropped, which makes kebab-case, snake_case
/// and camelCase spellings of the same name collide. The path separator is
/// left alone, so sanitizing a full dotted key keeps its segment boundaries.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Splits a dotted key into its raw segments. Empty segments are kept: a key
/// typed as `server.` yields `["server", ""]`.
#[must_use]
pub fn to_path_segments(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).collect()
}

#[must_use]
pub fn sanitized_segments(path: &str) -> Vec<String> {
    to_path_segments(path).into_iter().map(sanitize).collect()
}

/// Flattens a list of (possibly dotted) keys into one segment list.
///
/// Editors hand over ancestor keys one per nesting level, but a single level
/// may itself be a dotted key (`server.ssl:` in YAML).
#[must_use]
pub fn flatten_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .flat_map(|key| {
            to_path_segments(key.as_ref())
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[must_use]
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut joined = String::new();
    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            joined.push(PATH_SEPARATOR);
        }
        joined.push_str(segment.as_ref());
    }
    joined
}

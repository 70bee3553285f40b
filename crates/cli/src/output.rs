use anyhow::Result;
use keyhint_index::{IndexStats, IndexUpdate, NodeInfo, ScopeId, ScopeStats, Suggestion};
use serde::Serialize;
use std::collections::BTreeMap;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn render_index_stats(stats: &IndexStats) -> String {
    format!(
        "Indexed {} module(s) in {}ms: {} added, {} modified, {} removed, {} unchanged, {} failed ({} records, {} hints dropped)",
        stats.scopes,
        stats.duration.as_millis(),
        stats.sources_added,
        stats.sources_modified,
        stats.sources_removed,
        stats.sources_unchanged,
        stats.sources_failed,
        stats.records_inserted,
        stats.hints_dropped
    )
}

pub fn render_suggestions(suggestions: Option<&[Suggestion]>) -> String {
    let Some(suggestions) = suggestions else {
        return "Nothing to suggest from: scope not indexed or ancestor key unknown".to_string();
    };
    if suggestions.is_empty() {
        return "No matches".to_string();
    }

    let width = suggestions
        .iter()
        .map(|s| s.display_text.len())
        .max()
        .unwrap_or(0);
    let mut lines = Vec::with_capacity(suggestions.len());
    for suggestion in suggestions {
        let mut line = format!("{:<width$}", suggestion.display_text);
        if let Some(declared_type) = &suggestion.declared_type {
            line.push_str(&format!("  {declared_type}"));
        }
        if suggestion.deprecated {
            line.push_str("  [deprecated]");
        }
        if let Some(summary) = suggestion
            .description
            .as_deref()
            .and_then(|d| d.lines().next())
        {
            line.push_str(&format!("  - {summary}"));
        }
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

pub fn render_lookup(info: Option<&NodeInfo>) -> String {
    let Some(info) = info else {
        return "No such key".to_string();
    };
    let mut out = info.documentation();
    if !info.children.is_empty() {
        out.push_str(&format!("\n\nChildren: {}", info.children.join(", ")));
    }
    if let Some(hint) = &info.hint {
        let values: Vec<String> = hint.values.iter().map(|v| v.value_text()).collect();
        out.push_str(&format!("\n\nValues: {}", values.join(", ")));
    }
    let owners: Vec<&str> = info.owners.iter().map(|o| o.as_str()).collect();
    out.push_str(&format!("\n\nSources: {}", owners.join(", ")));
    out
}

pub fn render_scope_stats(stats: &BTreeMap<ScopeId, ScopeStats>) -> String {
    let mut lines = vec![format!("{:<24} {:>8} {:>8} {:>8}", "scope", "roots", "nodes", "sources")];
    for (scope, stats) in stats {
        lines.push(format!(
            "{:<24} {:>8} {:>8} {:>8}",
            scope.to_string(),
            stats.roots,
            stats.nodes,
            stats.sources
        ));
    }
    lines.join("\n")
}

pub fn render_update(update: &IndexUpdate) -> String {
    match (&update.stats, &update.error) {
        (_, Some(error)) => format!("Reindex #{} failed: {error}", update.generation),
        (Some(stats), None) => format!("#{} {}", update.generation, render_index_stats(stats)),
        (None, None) => format!("Reindex #{} finished", update.generation),
    }
}

//! Reindexing and query resolution through IndexCoordinator

use keyhint_index::{
    ClasspathEnvironment, IndexCoordinator, InMemoryClasspath, ReindexTarget, ScopeId,
    SourceId, SuggestionIcon, SuggestionKind,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const SERVER_DOC: &str = r#"{
    "groups": [{"name": "server", "type": "org.example.ServerProperties", "description": "Web server."}],
    "properties": [
        {"name": "server.port", "type": "int", "description": "Server HTTP port.", "defaultValue": 8080}
    ]
}"#;

fn setup() -> (Arc<InMemoryClasspath>, IndexCoordinator) {
    let classpath = Arc::new(InMemoryClasspath::new());
    let environment: Arc<dyn ClasspathEnvironment> = classpath.clone();
    (classpath, IndexCoordinator::new(environment))
}

fn property_doc(name: &str, description: &str) -> String {
    format!(r#"{{"properties":[{{"name":"{name}","type":"java.lang.String","description":"{description}"}}]}}"#)
}

fn texts(suggestions: Option<Vec<keyhint_index::Suggestion>>) -> Vec<String> {
    suggestions
        .expect("start node")
        .into_iter()
        .map(|s| s.display_text)
        .collect()
}

fn app() -> ScopeId {
    ScopeId::module("app")
}

#[test]
fn test_top_level_and_child_queries() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(SERVER_DOC));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();

    let top = coordinator.compute_suggestions(&app(), None, "ser").unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].display_text, "server");
    assert_eq!(top[0].icon, SuggestionIcon::Group);
    assert_eq!(top[0].description.as_deref(), Some("Web server."));

    let children = coordinator
        .compute_suggestions(&app(), Some(&["server"]), "po")
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].display_text, "port");
    assert_eq!(children[0].full_path, "server.port");
    assert_eq!(children[0].kind, SuggestionKind::Key);
    assert_eq!(children[0].icon, SuggestionIcon::Number);
    assert_eq!(children[0].declared_type.as_deref(), Some("int"));
}

#[test]
fn test_spelling_variants_resolve_to_one_node() {
    let (classpath, coordinator) = setup();
    classpath.put_root(
        "app",
        "a.jar",
        Some(&property_doc("server.max-http-header-size", "Limit.")),
    );
    coordinator.reindex_now(&ReindexTarget::All).unwrap();

    for spelling in [
        ["server", "max-http-header-size"],
        ["server", "maxHttpHeaderSize"],
        ["server", "max_http_header_size"],
    ] {
        let info = coordinator
            .find_deepest_exact_match(&app(), &spelling)
            .expect("node for every spelling");
        assert_eq!(info.full_path, "server.max-http-header-size");
        assert_eq!(info.owners, vec![SourceId::from("a.jar")]);
        assert!(info.leaf);
    }
}

#[test]
fn test_first_writer_wins_until_removed() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(&property_doc("a.b.c", "from A")));
    classpath.put_root("app", "b.jar", Some(&property_doc("a.b.c", "from B")));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();

    let info = coordinator
        .find_deepest_exact_match(&app(), &["a.b.c"])
        .unwrap();
    assert_eq!(info.owners.len(), 2);
    assert_eq!(
        info.property.unwrap().description.as_deref(),
        Some("from A")
    );

    classpath.remove_root("app", "a.jar");
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.sources_removed, 1);

    let info = coordinator
        .find_deepest_exact_match(&app(), &["a", "b", "c"])
        .unwrap();
    assert_eq!(info.owners, vec![SourceId::from("b.jar")]);
    assert_eq!(
        info.property.unwrap().description.as_deref(),
        Some("from B")
    );
    assert_eq!(
        texts(coordinator.compute_suggestions(&app(), Some(&["a", "b"]), "c")),
        vec!["c"]
    );
}

#[test]
fn test_removed_root_disappears() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(&property_doc("x.y", "only")));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert!(coordinator.can_provide_suggestions(&app()));

    classpath.remove_root("app", "a.jar");
    coordinator.reindex_now(&ReindexTarget::All).unwrap();

    assert_eq!(coordinator.compute_suggestions(&app(), Some(&["x"]), ""), None);
    assert!(coordinator.find_deepest_exact_match(&app(), &["x", "y"]).is_none());
    assert!(!coordinator.can_provide_suggestions(&app()));
    assert!(!coordinator.can_provide_suggestions(&ScopeId::Project));
}

#[test]
fn test_unchanged_reindex_is_a_noop() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(SERVER_DOC));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    let before = coordinator.scope_stats();

    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert!(!stats.changed());
    assert_eq!(stats.sources_unchanged, 1);
    assert_eq!(coordinator.scope_stats(), before);

    let info = coordinator
        .find_deepest_exact_match(&app(), &["server.port"])
        .unwrap();
    assert_eq!(info.owners.len(), 1);
}

#[test]
fn test_modified_source_is_replaced() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(&property_doc("old.key", "v1")));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();

    classpath.put_root("app", "a.jar", Some(&property_doc("new.key", "v2")));
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.sources_modified, 1);

    assert!(coordinator.find_deepest_exact_match(&app(), &["old.key"]).is_none());
    assert!(coordinator.find_deepest_exact_match(&app(), &["new.key"]).is_some());
    assert_eq!(coordinator.scope_stats()[&app()].nodes, 2);
}

#[test]
fn test_hints_attach_to_exact_property() {
    let (classpath, coordinator) = setup();
    classpath.put_root(
        "app",
        "a.jar",
        Some(
            r#"{
                "properties": [{"name": "logging.level", "type": "java.lang.String"}],
                "hints": [
                    {"name": "logging.level", "values": [
                        {"value": "info", "description": "Default."},
                        {"value": "debug"}
                    ]},
                    {"name": "logging.missing", "values": [{"value": "x"}]}
                ]
            }"#,
        ),
    );
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.hints_dropped, 1);

    let values = coordinator
        .compute_suggestions(&app(), Some(&["logging", "level"]), "")
        .unwrap();
    let texts: Vec<&str> = values.iter().map(|s| s.display_text.as_str()).collect();
    assert_eq!(texts, vec!["debug", "info"]);
    assert!(values.iter().all(|s| s.kind == SuggestionKind::Value));
    assert_eq!(values[1].description.as_deref(), Some("Default."));

    let key = coordinator
        .compute_suggestions(&app(), Some(&["logging"]), "le")
        .unwrap();
    assert_eq!(key[0].icon, SuggestionIcon::Enum);
}

fn hint_doc(value: &str) -> String {
    format!(
        r#"{{"properties":[{{"name":"other.k","type":"java.lang.String"}}],
            "hints":[{{"name":"x.mode","values":[{{"value":"{value}"}}]}}]}}"#
    )
}

fn mode_values(coordinator: &IndexCoordinator, scope: &ScopeId) -> Vec<String> {
    texts(coordinator.compute_suggestions(scope, Some(&["x", "mode"]), ""))
}

#[test]
fn test_hint_from_another_source_follows_that_source() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(&property_doc("x.mode", "Mode.")));
    classpath.put_root("app", "b.jar", Some(&hint_doc("old")));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(mode_values(&coordinator, &app()), vec!["old"]);

    classpath.put_root("app", "b.jar", Some(&hint_doc("new")));
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.sources_modified, 1);
    assert_eq!(mode_values(&coordinator, &app()), vec!["new"]);
    assert_eq!(mode_values(&coordinator, &ScopeId::Project), vec!["new"]);

    classpath.put_root("app", "b.jar", None);
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert!(mode_values(&coordinator, &app()).is_empty());
    assert!(mode_values(&coordinator, &ScopeId::Project).is_empty());

    classpath.put_root("app", "b.jar", Some(&hint_doc("again")));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    classpath.remove_root("app", "b.jar");
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert!(mode_values(&coordinator, &app()).is_empty());
    assert!(mode_values(&coordinator, &ScopeId::Project).is_empty());

    let mode = coordinator
        .find_deepest_exact_match(&app(), &["x.mode"])
        .unwrap();
    assert_eq!(mode.owners, vec![SourceId::from("a.jar")]);
    assert!(mode.hint.is_none());
}

#[test]
fn test_malformed_source_is_retried() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "good.jar", Some(SERVER_DOC));
    classpath.put_root("app", "bad.jar", Some("{ not json"));
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.sources_failed, 1);
    assert!(coordinator.can_provide_suggestions(&app()));

    // Still unseen, so the next run parses it again.
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.sources_added, 1);
    assert_eq!(stats.sources_failed, 1);

    classpath.put_root("app", "bad.jar", Some(&property_doc("fixed.key", "ok")));
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.sources_failed, 0);
    assert!(coordinator.find_deepest_exact_match(&app(), &["fixed.key"]).is_some());
}

#[test]
fn test_project_aggregate_tracks_shared_sources() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "shared.jar", Some(&property_doc("shared.key", "s")));
    classpath.put_root("app", "app.jar", Some(&property_doc("app.key", "a")));
    classpath.put_root("lib", "shared.jar", Some(&property_doc("shared.key", "s")));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();

    let project = ScopeId::Project;
    assert!(coordinator.find_deepest_exact_match(&project, &["app.key"]).is_some());
    let shared = coordinator
        .find_deepest_exact_match(&project, &["shared.key"])
        .unwrap();
    assert_eq!(shared.owners, vec![SourceId::from("shared.jar")]);

    // One holder left: the aggregate keeps the shared source.
    classpath.remove_root("app", "shared.jar");
    coordinator.reindex_now(&ReindexTarget::module("app")).unwrap();
    assert!(coordinator.find_deepest_exact_match(&project, &["shared.key"]).is_some());
    assert!(coordinator
        .find_deepest_exact_match(&app(), &["shared.key"])
        .is_none());

    classpath.remove_root("lib", "shared.jar");
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert!(coordinator.find_deepest_exact_match(&project, &["shared.key"]).is_none());
    assert_eq!(
        texts(coordinator.compute_suggestions(&project, None, "")),
        vec!["app"]
    );
}

#[test]
fn test_vanished_module_is_dropped() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(SERVER_DOC));
    classpath.put_root("gone", "g.jar", Some(&property_doc("gone.key", "g")));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(coordinator.modules(), vec!["app".to_string(), "gone".to_string()]);

    classpath.remove_module("gone");
    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert_eq!(stats.scopes_dropped, 1);
    assert_eq!(coordinator.modules(), vec!["app".to_string()]);
    assert!(coordinator
        .find_deepest_exact_match(&ScopeId::Project, &["gone.key"])
        .is_none());
    assert!(!coordinator.can_provide_suggestions(&ScopeId::module("gone")));
}

#[test]
fn test_superseded_run_stops_and_next_run_catches_up() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(SERVER_DOC));

    let stale = coordinator.begin_reindex();
    let _newer = coordinator.begin_reindex();
    let stats = coordinator.reindex(&ReindexTarget::All, &stale).unwrap();
    assert!(stats.cancelled);
    assert!(!coordinator.can_provide_suggestions(&app()));

    let stats = coordinator.reindex_now(&ReindexTarget::All).unwrap();
    assert!(!stats.cancelled);
    assert!(coordinator.can_provide_suggestions(&app()));
}

#[test]
fn test_unindexed_scopes_answer_none() {
    let (_classpath, coordinator) = setup();
    assert_eq!(coordinator.compute_suggestions(&app(), None, "s"), None);
    assert_eq!(coordinator.compute_suggestions(&ScopeId::Project, None, "s"), None);
    assert!(coordinator.find_deepest_exact_match(&app(), &["s"]).is_none());
    assert!(!coordinator.can_provide_suggestions(&ScopeId::Project));
}

#[test]
fn test_documentation_of_lookup() {
    let (classpath, coordinator) = setup();
    classpath.put_root("app", "a.jar", Some(SERVER_DOC));
    coordinator.reindex_now(&ReindexTarget::All).unwrap();

    let doc = coordinator
        .find_deepest_exact_match(&app(), &["server", "port"])
        .unwrap()
        .documentation();
    assert!(doc.starts_with("**server.port** (`int`)"));
    assert!(doc.contains("Server HTTP port."));
    assert!(doc.contains("`8080`"));
}

//! Tests for elicit-core: config defaults, strategy catalog, focus
//! variants, methodology registry, and error kinds.

use elicit_core::config::ScorersConfig;
use elicit_core::*;

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn default_tier2_weights_sum_to_one() {
    let scorers = ScorersConfig::default();
    let total: f64 = scorers.tier2.iter().filter_map(|s| s.weight).sum();
    assert!(
        (total - 1.0).abs() < 0.01,
        "tier-2 weights must sum to 1.0, got {}",
        total
    );
}

#[test]
fn default_config_has_expected_knobs() {
    let config = InterviewConfig::default();
    assert_eq!(config.canonical_min_support_nodes, 2);
    assert!(config.canonical_similarity_threshold > 0.0);
    assert_eq!(config.max_turns, 10);
    assert_eq!(config.phases.exploratory_turns, 8);
    assert!(config.engine.veto_on_first);
    assert_eq!(config.engine.alternatives_count, 3);
}

#[test]
fn config_load_falls_back_to_defaults_for_missing_file() {
    let config = InterviewConfig::load(std::path::Path::new("/nonexistent/elicit.json")).unwrap();
    assert_eq!(config.max_turns, 10);
}

#[test]
fn scorer_lookup_spans_both_tiers() {
    let config = InterviewConfig::default();
    assert!(config.scorer("saturation").is_some());
    assert!(config.scorer("consecutive_exhaustion").is_some());
    assert!(config.scorer("no_such_scorer").is_none());
}

// ===========================================================================
// Strategy catalog and focuses
// ===========================================================================

#[test]
fn builtin_catalog_contains_core_strategies() {
    let catalog = strategy::builtin_strategies();
    let kinds: Vec<StrategyKind> = catalog.iter().map(|s| s.kind).collect();
    for expected in [
        StrategyKind::Deepen,
        StrategyKind::Broaden,
        StrategyKind::CoverElement,
        StrategyKind::Closing,
        StrategyKind::Reflection,
        StrategyKind::Synthesis,
        StrategyKind::Laddering,
    ] {
        assert!(kinds.contains(&expected), "missing {:?}", expected);
    }

    let closing = catalog.iter().find(|s| s.kind == StrategyKind::Closing).unwrap();
    assert_eq!(closing.min_turns, Some(8));
    assert!(closing.priority_base < 1.0);

    let reflection = catalog
        .iter()
        .find(|s| s.kind == StrategyKind::Reflection)
        .unwrap();
    assert!(reflection.emergency_only);
}

#[test]
fn asks_for_more_matches_veto_target_set() {
    assert!(StrategyKind::Deepen.asks_for_more());
    assert!(StrategyKind::Broaden.asks_for_more());
    assert!(StrategyKind::CoverElement.asks_for_more());
    assert!(!StrategyKind::Synthesis.asks_for_more());
    assert!(!StrategyKind::Closing.asks_for_more());
}

#[test]
fn focus_accessors_by_variant() {
    let depth = Focus::DepthExploration {
        node_id: Some("node_1".to_string()),
        description: "Deepen: creamy texture".to_string(),
        confidence: 0.8,
    };
    assert_eq!(depth.node_id(), Some("node_1"));
    assert_eq!(depth.element_id(), None);
    assert_eq!(depth.type_name(), "depth_exploration");

    let gap = Focus::CoverageGap {
        element_id: "texture".to_string(),
        description: "Cover: texture".to_string(),
    };
    assert_eq!(gap.element_id(), Some("texture"));
    assert_eq!(gap.node_id(), None);
}

#[test]
fn focus_serializes_with_tag() {
    let focus = Focus::BreadthExploration {
        description: "Explore new aspects".to_string(),
    };
    let value = serde_json::to_value(&focus).unwrap();
    assert_eq!(value["focus_type"], "breadth_exploration");
}

// ===========================================================================
// Methodology registry
// ===========================================================================

const TEST_YAML: &str = r#"
method:
  name: test_method
  version: "1.0"
  goal: test goal
  opening_bias: start concrete
ontology:
  nodes:
    - name: attribute
      description: A property
      examples: ["one", "two", "three", "four"]
    - name: outcome
      description: A result
  edges:
    - name: leads_to
      description: causal
      permitted_connections:
        - [attribute, outcome]
"#;

#[test]
fn registry_caches_inserted_schemas() {
    let registry = MethodologyRegistry::new("/nonexistent");
    let schema = MethodologySchema::from_yaml_str(TEST_YAML).unwrap();
    registry.insert("test_method", schema);

    let loaded = registry.get("test_method").unwrap();
    assert!(loaded.is_valid_node_type("attribute"));
    assert!(!loaded.is_valid_node_type("unknown"));
    assert!(loaded.is_valid_connection("leads_to", "attribute", "outcome"));
    assert!(!loaded.is_valid_connection("leads_to", "outcome", "attribute"));
}

#[test]
fn registry_unknown_name_is_not_found() {
    let registry = MethodologyRegistry::new("/nonexistent");
    match registry.get("missing") {
        Err(Error::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|s| s.method.name.clone())),
    }
}

#[test]
fn undefined_connection_type_rejected_at_load() {
    let yaml = TEST_YAML.replace("- [attribute, outcome]", "- [attribute, ghost]");
    assert!(MethodologySchema::from_yaml_str(&yaml).is_err());
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_kinds_are_stable() {
    assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
    assert_eq!(Error::SessionCompleted("x".into()).kind(), "session_completed");
    assert_eq!(
        Error::scorer_failure("saturation", "boom").kind(),
        "scorer_failure"
    );
    assert_eq!(Error::Cancelled.kind(), "cancelled");
}

// ===========================================================================
// Session ids
// ===========================================================================

#[test]
fn session_id_roundtrip() {
    let id = SessionId::new("sess_abc");
    assert_eq!(id.as_str(), "sess_abc");
    assert_eq!(format!("{}", id), "sess_abc");

    let generated = SessionId::generate();
    assert!(generated.as_str().starts_with("sess_"));
}

//! Integration tests for the engine crate: extraction filtering, slot
//! merging, strategy fallback, and the full turn pipeline against
//! scripted LLM clients.

use elicit_core::{
    ConceptCatalog, ConceptElement, ConceptRegistry, Error, InterviewConfig, InterviewMode,
    MethodologyRegistry, MethodologySchema, SessionId, Speaker, StrategyKind,
};
use elicit_engine::{
    CanonicalSlotService, ExtractionService, QuestionService, SessionService, SignalExtractor,
    StrategyService,
};
use elicit_graph::{EmbeddingService, MemoryStore, SlotStatus};
use elicit_llm::{LlmClient, LlmError, LlmRequest, LlmResponse, LlmResult};
use elicit_scoring::{build_engine, Tier1Output, TwoTierEngine, VetoScorer};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ===========================================================================
// Scripted LLM client
// ===========================================================================

struct ScriptedClient {
    name: &'static str,
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedClient {
    fn new(name: &'static str, responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            responses: Mutex::new(responses.into()),
        })
    }

    fn empty(name: &'static str) -> Arc<Self> {
        Self::new(name, Vec::new())
    }

    fn push(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(
        &self,
        _request: LlmRequest,
        _cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmResponse> {
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::RequestFailed("script exhausted".to_string()))?;
        Ok(LlmResponse {
            content,
            model: "scripted-model".to_string(),
            input_tokens: Some(100),
            output_tokens: Some(50),
            latency_ms: 3,
        })
    }
}

// ===========================================================================
// Fixtures
// ===========================================================================

const MEC_YAML: &str = r#"
method:
  name: means_end_chain
  version: "1.0"
  goal: Trace attribute-consequence-value chains
  opening_bias: Start with concrete attributes
ontology:
  nodes:
    - name: attribute
      description: Concrete product property
      examples: ["creamy texture", "price"]
      level: 0
    - name: functional_consequence
      description: Practical outcome
      examples: ["satisfying"]
      level: 1
    - name: value
      description: Personal value
      level: 2
      terminal: true
  edges:
    - name: leads_to
      description: Causal step up the chain
      permitted_connections:
        - [attribute, functional_consequence]
        - [functional_consequence, value]
    - name: revises
      description: Belief revision
      permitted_connections:
        - ["*", "*"]
"#;

fn methodology_registry() -> Arc<MethodologyRegistry> {
    let registry = MethodologyRegistry::new("/nonexistent");
    registry.insert(
        "means_end_chain",
        MethodologySchema::from_yaml_str(MEC_YAML).unwrap(),
    );
    Arc::new(registry)
}

fn concept_registry() -> Arc<ConceptRegistry> {
    let registry = ConceptRegistry::new("/nonexistent");
    registry.insert(ConceptCatalog {
        id: "oat-milk".to_string(),
        name: "oat milk".to_string(),
        description: "oat drink".to_string(),
        objective: "Understand what oat milk attributes matter and why".to_string(),
        elements: vec![
            ConceptElement {
                id: "texture".to_string(),
                label: "texture".to_string(),
                aliases: vec!["creaminess".to_string(), "creamy".to_string()],
            },
            ConceptElement {
                id: "price".to_string(),
                label: "price".to_string(),
                aliases: vec!["cost".to_string()],
            },
        ],
    });
    Arc::new(registry)
}

struct TestHarness {
    service: SessionService,
    extraction_client: Arc<ScriptedClient>,
    slots_client: Arc<ScriptedClient>,
    generation_client: Arc<ScriptedClient>,
}

fn harness() -> TestHarness {
    let config = InterviewConfig::default();
    let store = Arc::new(MemoryStore::new());
    let embeddings = Arc::new(EmbeddingService::new());
    let methodologies = methodology_registry();

    let extraction_client = ScriptedClient::empty("extraction");
    let slots_client = ScriptedClient::empty("slots");
    let scoring_client = ScriptedClient::empty("scoring");
    let generation_client = ScriptedClient::empty("generation");

    let engine = build_engine(&config).unwrap();
    let service = SessionService::new(
        store.clone(),
        methodologies.clone(),
        concept_registry(),
        ExtractionService::new(
            extraction_client.clone(),
            methodologies,
            0.3,
            2000,
            Duration::from_secs(30),
        ),
        CanonicalSlotService::new(slots_client.clone(), store, embeddings, &config),
        SignalExtractor::new(scoring_client),
        StrategyService::new(engine, &config.phases, &config.engine),
        QuestionService::new(generation_client.clone()),
        config,
    );

    TestHarness {
        service,
        extraction_client,
        slots_client,
        generation_client,
    }
}

// ===========================================================================
// Extraction service
// ===========================================================================

#[tokio::test]
async fn extraction_filters_invalid_types_and_connections() {
    let client = ScriptedClient::new(
        "extraction",
        vec![r#"{
            "concepts": [
                {"text": "creamy texture", "node_type": "attribute", "confidence": 0.9},
                {"text": "satisfying", "node_type": "functional_consequence", "confidence": 0.85},
                {"text": "ghost", "node_type": "not_a_type", "confidence": 0.9}
            ],
            "relationships": [
                {"source_text": "creamy texture", "target_text": "satisfying", "relationship_type": "leads_to", "confidence": 0.9},
                {"source_text": "satisfying", "target_text": "creamy texture", "relationship_type": "leads_to", "confidence": 0.9},
                {"source_text": "creamy texture", "target_text": "ghost", "relationship_type": "leads_to", "confidence": 0.9}
            ],
            "discourse_markers": ["because"]
        }"#
        .to_string()],
    );
    let service = ExtractionService::new(
        client,
        methodology_registry(),
        0.3,
        2000,
        Duration::from_secs(30),
    );

    let result = service
        .extract(
            "I love the creamy texture because it's really satisfying",
            Some("What do you like about oat milk?"),
            "means_end_chain",
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.is_extractable);
    assert_eq!(result.concepts.len(), 2);
    // Only the admissible attribute -> functional_consequence edge
    // survives the filter.
    assert_eq!(result.relationships.len(), 1);
    assert_eq!(result.relationships[0].source_text, "creamy texture");
    assert_eq!(result.discourse_markers, vec!["because"]);
}

#[tokio::test]
async fn short_utterances_skip_extraction() {
    // No scripted response: a call would error, proving no call happens.
    let service = ExtractionService::new(
        ScriptedClient::empty("extraction"),
        methodology_registry(),
        0.3,
        2000,
        Duration::from_secs(30),
    );
    let result = service
        .extract("ok", None, "means_end_chain", CancellationToken::new())
        .await
        .unwrap();
    assert!(!result.is_extractable);
    assert!(result.concepts.is_empty());
}

#[tokio::test]
async fn llm_failure_degrades_to_empty_extraction() {
    let service = ExtractionService::new(
        ScriptedClient::empty("extraction"),
        methodology_registry(),
        0.3,
        2000,
        Duration::from_secs(30),
    );
    let result = service
        .extract(
            "a perfectly extractable sentence about texture",
            None,
            "means_end_chain",
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(!result.is_extractable);
    assert!(result.concepts.is_empty());
}

// ===========================================================================
// Canonical slot merge: silky foam / creamy foam collapse
// ===========================================================================

#[tokio::test]
async fn paraphrased_surface_nodes_merge_into_one_slot() {
    let config = InterviewConfig::default();
    let store = Arc::new(MemoryStore::new());
    let embeddings = Arc::new(EmbeddingService::new());
    let methodologies = methodology_registry();
    let schema = methodologies.get("means_end_chain").unwrap();
    let client = ScriptedClient::empty("slots");
    let service = CanonicalSlotService::new(client.clone(), store.clone(), embeddings, &config);

    let session = SessionId::new("sess_merge");
    let now = chrono::Utc::now();
    store
        .create_session(elicit_core::Session {
            id: session.clone(),
            methodology: "means_end_chain".to_string(),
            concept_id: "oat-milk".to_string(),
            mode: InterviewMode::CoverageDriven,
            status: elicit_core::SessionStatus::Active,
            turn_count: 0,
            max_turns: 10,
            config: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let descriptions = schema.node_descriptions();

    // Turn A: "silky foam" plus its consequence.
    let silky = store
        .create_node(&schema, &session, "silky foam", "attribute", 0.9, serde_json::Map::new(), vec![])
        .unwrap();
    let satisfying_a = store
        .create_node(&schema, &session, "satisfying", "functional_consequence", 0.9, serde_json::Map::new(), vec![])
        .unwrap();
    let edge_a = store
        .create_edge(&schema, &session, &silky.id, &satisfying_a.id, "leads_to", 0.9, serde_json::Map::new(), vec![])
        .unwrap();

    client.push(format!(
        r#"{{"groupings": {{
            "attribute": {{"proposed_slots": [{{"slot_name": "silky_foam", "description": "smooth creamy foam texture", "surface_node_ids": ["{}"]}}]}},
            "functional_consequence": {{"proposed_slots": [{{"slot_name": "satisfaction", "description": "feels satisfying to drink", "surface_node_ids": ["{}"]}}]}}
        }}}}"#,
        silky.id, satisfying_a.id
    ));
    service
        .discover_slots(&session, &[silky.clone(), satisfying_a.clone()], 1, &descriptions, CancellationToken::new())
        .await
        .unwrap();
    service.aggregate_edges(&session, &[edge_a]).unwrap();

    // Turn B: "creamy foam" - same latent concept, different words.
    let creamy = store
        .create_node(&schema, &session, "creamy foam", "attribute", 0.9, serde_json::Map::new(), vec![])
        .unwrap();
    let edge_b = store
        .create_edge(&schema, &session, &creamy.id, &satisfying_a.id, "leads_to", 0.9, serde_json::Map::new(), vec![])
        .unwrap();

    client.push(format!(
        r#"{{"groupings": {{
            "attribute": {{"proposed_slots": [{{"slot_name": "creamy_foam", "description": "smooth silky foam texture", "surface_node_ids": ["{}"]}}]}}
        }}}}"#,
        creamy.id
    ));
    service
        .discover_slots(&session, &[creamy.clone()], 2, &descriptions, CancellationToken::new())
        .await
        .unwrap();
    service.aggregate_edges(&session, &[edge_b.clone()]).unwrap();

    // Both surface nodes share one slot with support 2, promoted at
    // the min-support threshold.
    let mapping_a = store.mapping_for(&silky.id).unwrap();
    let mapping_b = store.mapping_for(&creamy.id).unwrap();
    assert_eq!(mapping_a.canonical_slot_id, mapping_b.canonical_slot_id);

    let slot = store.get_slot(&mapping_a.canonical_slot_id).unwrap();
    assert_eq!(slot.support_count, 2);
    assert_eq!(slot.status, SlotStatus::Active);
    assert_eq!(slot.slot_name, "silky_foam");

    // Surface nodes stay distinct.
    assert_eq!(store.active_nodes(&session).len(), 3);

    // The shared relationship aggregates into one canonical edge with
    // both surface edges as provenance.
    let canonical_edges = store.canonical_edges_for(&session);
    assert_eq!(canonical_edges.len(), 1);
    assert_eq!(canonical_edges[0].support_count, 2);
    assert_eq!(canonical_edges[0].surface_edge_ids.len(), 2);
}

#[tokio::test]
async fn hallucinated_surface_ids_are_dropped() {
    let config = InterviewConfig::default();
    let store = Arc::new(MemoryStore::new());
    let embeddings = Arc::new(EmbeddingService::new());
    let client = ScriptedClient::new(
        "slots",
        vec![r#"{"groupings": {"attribute": {"proposed_slots": [
            {"slot_name": "phantom", "description": "never seen", "surface_node_ids": ["node_made_up"]}
        ]}}}"#
            .to_string()],
    );
    let service = CanonicalSlotService::new(client, store.clone(), embeddings, &config);
    let schema = methodology_registry().get("means_end_chain").unwrap();

    let session = SessionId::new("sess_halluc");
    let now = chrono::Utc::now();
    store
        .create_session(elicit_core::Session {
            id: session.clone(),
            methodology: "means_end_chain".to_string(),
            concept_id: "oat-milk".to_string(),
            mode: InterviewMode::CoverageDriven,
            status: elicit_core::SessionStatus::Active,
            turn_count: 0,
            max_turns: 10,
            config: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    let node = store
        .create_node(&schema, &session, "real node", "attribute", 0.9, serde_json::Map::new(), vec![])
        .unwrap();

    let slots = service
        .discover_slots(&session, &[node], 1, &schema.node_descriptions(), CancellationToken::new())
        .await
        .unwrap();
    assert!(slots.is_empty());
}

// ===========================================================================
// Signal extractor fast path
// ===========================================================================

#[tokio::test]
async fn signals_fast_path_below_two_user_turns() {
    let extractor = SignalExtractor::new(ScriptedClient::empty("scoring"));
    let history = vec![elicit_core::Utterance {
        id: "utt_1".to_string(),
        session_id: SessionId::new("s"),
        turn_number: 1,
        speaker: Speaker::User,
        text: "hello".to_string(),
        created_at: chrono::Utc::now(),
    }];
    let set = extractor.extract(&history, 1, CancellationToken::new()).await;
    assert_eq!(set.signal_count(), 0);
    assert!(set.extraction_errors.is_empty());
}

// ===========================================================================
// Strategy fallback rules
// ===========================================================================

struct VetoAll;
impl VetoScorer for VetoAll {
    fn id(&self) -> &'static str {
        "veto_all"
    }
    fn evaluate(
        &self,
        _strategy: &elicit_core::Strategy,
        _focus: &elicit_core::Focus,
        _ctx: &elicit_scoring::ScoringContext<'_>,
    ) -> elicit_core::Result<Tier1Output> {
        Ok(Tier1Output::veto("veto_all", "always"))
    }
}

fn all_veto_strategy_service() -> StrategyService {
    let config = InterviewConfig::default();
    let engine = TwoTierEngine::new(vec![Box::new(VetoAll)], vec![], true, 0.01).unwrap();
    StrategyService::new(engine, &config.phases, &config.engine)
}

#[test]
fn all_vetoed_before_min_turns_falls_back_to_reflection() {
    let service = all_veto_strategy_service();
    let mut state = elicit_graph::GraphState::empty(InterviewMode::CoverageDriven);
    state.turn_count = 3;

    let selection = service.select(&mut state, &[], &[], &[], &[], 10).unwrap();
    assert_eq!(selection.strategy.kind, StrategyKind::Reflection);
    assert_eq!(state.strategy_history.last(), Some(&StrategyKind::Reflection));
}

#[test]
fn all_vetoed_after_min_turns_falls_back_to_closing() {
    let service = all_veto_strategy_service();
    let mut state = elicit_graph::GraphState::empty(InterviewMode::CoverageDriven);
    state.turn_count = 9;

    let selection = service.select(&mut state, &[], &[], &[], &[], 20).unwrap();
    assert_eq!(selection.strategy.kind, StrategyKind::Closing);
}

#[test]
fn reflection_is_never_an_ordinary_candidate() {
    // With the real engine nothing vetoes reflection, so if it were
    // enumerated its 0.7 base would outrank closing's 0.5 and the
    // fallback order could never produce closing. It must only be
    // reachable through the fallback.
    let config = InterviewConfig::default();
    let engine = build_engine(&config).unwrap();
    let service = StrategyService::new(engine, &config.phases, &config.engine);
    let mut state = elicit_graph::GraphState::empty(InterviewMode::CoverageDriven);
    state.turn_count = 3;

    let selection = service.select(&mut state, &[], &[], &[], &[], 10).unwrap();
    assert_ne!(selection.strategy.kind, StrategyKind::Reflection);
    assert!(selection
        .all_results
        .iter()
        .all(|r| r.strategy != StrategyKind::Reflection));
}

#[test]
fn turn_cap_forces_closing_over_scoring_preference() {
    // At the cap, depth/coverage candidates outscore closing's 0.5
    // base; the selector must still hand back closing.
    let config = InterviewConfig::default();
    let engine = build_engine(&config).unwrap();
    let service = StrategyService::new(engine, &config.phases, &config.engine);
    let mut state = elicit_graph::GraphState::empty(InterviewMode::CoverageDriven);
    state.turn_count = 8;

    let selection = service.select(&mut state, &[], &[], &[], &[], 8).unwrap();
    assert_eq!(selection.strategy.kind, StrategyKind::Closing);
    assert_eq!(selection.focus.type_name(), "closing");
    assert_eq!(state.strategy_history.last(), Some(&StrategyKind::Closing));
    // turn_count >= min_turns, so a scored closing candidate backs the
    // forced selection.
    assert!(selection.scoring.is_some());
}

#[test]
fn phase_boundaries_are_deterministic() {
    let config = InterviewConfig::default();
    let engine = build_engine(&config).unwrap();
    let service = StrategyService::new(engine, &config.phases, &config.engine);

    assert_eq!(service.determine_phase(0), elicit_core::Phase::Exploratory);
    assert_eq!(service.determine_phase(7), elicit_core::Phase::Exploratory);
    assert_eq!(service.determine_phase(8), elicit_core::Phase::Focused);
    assert_eq!(service.determine_phase(19), elicit_core::Phase::Focused);
    assert_eq!(service.determine_phase(20), elicit_core::Phase::Closing);
}

// ===========================================================================
// Session pipeline end-to-end
// ===========================================================================

#[tokio::test]
async fn fresh_interview_opening() {
    let h = harness();
    let session = h
        .service
        .create_session(
            "means_end_chain",
            "oat-milk",
            InterviewMode::CoverageDriven,
            None,
            serde_json::Map::new(),
        )
        .unwrap();

    h.generation_client
        .push("What comes to mind when you think about oat milk");
    let question = h
        .service
        .start_session(&session.id, CancellationToken::new())
        .await
        .unwrap();

    assert!(!question.is_empty());
    assert!(question.ends_with('?'));

    let utterances = h.service.utterances(&session.id).unwrap();
    assert_eq!(utterances.len(), 1);
    assert_eq!(utterances[0].turn_number, 1);
    assert_eq!(utterances[0].speaker, Speaker::System);

    // Starting twice is an input error.
    let again = h
        .service
        .start_session(&session.id, CancellationToken::new())
        .await;
    assert!(matches!(again, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn first_turn_with_laddering_extraction() {
    let h = harness();
    let session = h
        .service
        .create_session(
            "means_end_chain",
            "oat-milk",
            InterviewMode::CoverageDriven,
            None,
            serde_json::Map::new(),
        )
        .unwrap();

    h.generation_client.push("What do you like about oat milk");
    h.service
        .start_session(&session.id, CancellationToken::new())
        .await
        .unwrap();

    h.extraction_client.push(
        r#"{
            "concepts": [
                {"text": "creamy texture", "node_type": "attribute", "confidence": 0.9},
                {"text": "satisfying", "node_type": "functional_consequence", "confidence": 0.85}
            ],
            "relationships": [
                {"source_text": "creamy texture", "target_text": "satisfying", "relationship_type": "leads_to", "confidence": 0.9}
            ],
            "discourse_markers": ["because"]
        }"#,
    );
    h.slots_client.push(r#"{"groupings": {}}"#);
    h.generation_client.push("Why does that satisfaction matter to you");

    let result = h
        .service
        .process_turn(
            &session.id,
            "I love the creamy texture because it's really satisfying",
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.turn_number, 1);
    assert!(result.should_continue);
    assert!(result.question.ends_with('?'));

    let labels: Vec<&str> = result.nodes.iter().map(|n| n.label.as_str()).collect();
    assert!(labels.contains(&"creamy texture"));
    assert!(labels.contains(&"satisfying"));
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].edge_type, "leads_to");

    assert_eq!(result.graph_state.strategy_history.len(), 1);
    assert_eq!(
        result.graph_state.strategy_history.last(),
        Some(&result.selected_strategy)
    );

    // Coverage picked up the texture element via the "creamy" alias.
    let coverage = result.graph_state.coverage.as_ref().unwrap();
    assert!(coverage.elements["texture"].covered);
    assert!(!coverage.elements["price"].covered);

    // system opening, user answer, system follow-up.
    let utterances = h.service.utterances(&session.id).unwrap();
    assert_eq!(utterances.len(), 3);
    assert_eq!(
        utterances.iter().map(|u| u.turn_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(utterances[0].speaker, Speaker::System);
    assert_eq!(utterances[1].speaker, Speaker::User);
    assert_eq!(utterances[2].speaker, Speaker::System);

    // The scoring trace persisted one winner row.
    let trace = h.service.scoring_for_turn(&session.id, 1).unwrap();
    assert!(!trace.candidates.is_empty());
    assert_eq!(trace.candidates.iter().filter(|c| c.winner).count(), 1);
}

#[tokio::test]
async fn forced_closing_at_max_turns() {
    let h = harness();
    let session = h
        .service
        .create_session(
            "means_end_chain",
            "oat-milk",
            InterviewMode::CoverageDriven,
            Some(1),
            serde_json::Map::new(),
        )
        .unwrap();

    h.generation_client.push("What do you think of oat milk");
    h.service
        .start_session(&session.id, CancellationToken::new())
        .await
        .unwrap();

    h.extraction_client.push(
        r#"{"concepts": [{"text": "price", "node_type": "attribute", "confidence": 0.8}], "relationships": [], "discourse_markers": []}"#,
    );
    h.slots_client.push(r#"{"groupings": {}}"#);
    h.generation_client
        .push("Thanks for sharing - any final thoughts");

    let result = h
        .service
        .process_turn(&session.id, "mostly I care about the price", CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.should_continue);
    // The final question is generated under the closing strategy even
    // though scoring would have preferred a depth or coverage move.
    assert_eq!(result.selected_strategy, StrategyKind::Closing);
    assert_eq!(
        result.graph_state.strategy_history.last(),
        Some(&StrategyKind::Closing)
    );
    let closed = h.service.get_session(&session.id).unwrap();
    assert_eq!(closed.status, elicit_core::SessionStatus::Closed);

    // Turns on a closed session fail with SessionCompleted.
    let after = h
        .service
        .process_turn(&session.id, "one more thing", CancellationToken::new())
        .await;
    assert!(matches!(after, Err(Error::SessionCompleted(_))));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = harness();
    let missing = SessionId::new("sess_missing");
    let result = h
        .service
        .process_turn(&missing, "hello there friend", CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn create_session_validates_methodology_and_concept() {
    let h = harness();
    assert!(matches!(
        h.service.create_session(
            "ghost_method",
            "oat-milk",
            InterviewMode::CoverageDriven,
            None,
            serde_json::Map::new()
        ),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        h.service.create_session(
            "means_end_chain",
            "ghost-concept",
            InterviewMode::CoverageDriven,
            None,
            serde_json::Map::new()
        ),
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn question_generation_failure_fails_the_turn() {
    let h = harness();
    let session = h
        .service
        .create_session(
            "means_end_chain",
            "oat-milk",
            InterviewMode::CoverageDriven,
            None,
            serde_json::Map::new(),
        )
        .unwrap();
    h.generation_client.push("Opening question");
    h.service
        .start_session(&session.id, CancellationToken::new())
        .await
        .unwrap();

    h.extraction_client.push(r#"{"concepts": [], "relationships": [], "discourse_markers": []}"#);
    h.slots_client.push(r#"{"groupings": {}}"#);
    // No generation response scripted: the turn must fail, and no
    // system utterance may be persisted.
    let result = h
        .service
        .process_turn(&session.id, "a reasonably long answer", CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::LlmFailure { .. })));

    let utterances = h.service.utterances(&session.id).unwrap();
    assert_eq!(utterances.len(), 2); // opening + user only
    assert_eq!(utterances.last().unwrap().speaker, Speaker::User);
}

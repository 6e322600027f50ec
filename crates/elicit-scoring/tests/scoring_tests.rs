//! Tests for the two-tier scoring engine and its scorers.

use elicit_core::signals::{UncertaintySignal, UncertaintyType};
use elicit_core::{
    strategy::builtin_strategies, Focus, InterviewConfig, InterviewMode, Phase, SessionId,
    SignalSet, Speaker, Strategy, StrategyKind, Utterance,
};
use elicit_graph::{ElementCoverage, GraphState, KGNode};
use elicit_scoring::tier1::{ConsecutiveExhaustionScorer, RecentRedundancyScorer};
use elicit_scoring::tier2::{CoverageGapScorer, NoveltyScorer, StrategyDiversityScorer};
use elicit_scoring::{
    build_engine, ScoringContext, Tier1Output, TwoTierEngine, VetoScorer, WeightedScorer,
};

fn strategy(kind: StrategyKind) -> Strategy {
    builtin_strategies()
        .into_iter()
        .find(|s| s.kind == kind)
        .unwrap()
}

fn utterance(speaker: Speaker, turn: u32, text: &str) -> Utterance {
    Utterance {
        id: format!("utt_{}", turn),
        session_id: SessionId::new("s1"),
        turn_number: turn,
        speaker,
        text: text.to_string(),
        created_at: chrono::Utc::now(),
    }
}

fn node(id: &str, label: &str, node_type: &str) -> KGNode {
    KGNode {
        id: id.to_string(),
        session_id: SessionId::new("s1"),
        label: label.to_string(),
        node_type: node_type.to_string(),
        confidence: 0.9,
        properties: serde_json::Map::new(),
        source_utterance_ids: vec![],
        recorded_at: chrono::Utc::now(),
        seq: 0,
        superseded_by: None,
    }
}

fn empty_state() -> GraphState {
    GraphState::empty(InterviewMode::CoverageDriven)
}

macro_rules! ctx {
    ($state:expr, $history:expr) => {
        ScoringContext::new($state, &[], &[], &[], $history, Phase::Exploratory)
    };
}

// ===========================================================================
// Engine construction and arithmetic
// ===========================================================================

struct FixedScorer {
    id: &'static str,
    weight: f64,
    raw: f64,
}

impl WeightedScorer for FixedScorer {
    fn id(&self) -> &'static str {
        self.id
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn score(
        &self,
        _strategy: &Strategy,
        _focus: &Focus,
        _ctx: &ScoringContext<'_>,
    ) -> elicit_core::Result<elicit_scoring::Tier2Output> {
        Ok(elicit_scoring::Tier2Output::new(
            self.id,
            self.weight,
            self.raw,
            "fixed",
            serde_json::Map::new(),
        ))
    }
}

struct VetoAll;

impl VetoScorer for VetoAll {
    fn id(&self) -> &'static str {
        "veto_all"
    }
    fn evaluate(
        &self,
        _strategy: &Strategy,
        _focus: &Focus,
        _ctx: &ScoringContext<'_>,
    ) -> elicit_core::Result<Tier1Output> {
        Ok(Tier1Output::veto("veto_all", "always"))
    }
}

struct FailingScorer;

impl WeightedScorer for FailingScorer {
    fn id(&self) -> &'static str {
        "failing"
    }
    fn weight(&self) -> f64 {
        1.0
    }
    fn score(
        &self,
        _strategy: &Strategy,
        _focus: &Focus,
        _ctx: &ScoringContext<'_>,
    ) -> elicit_core::Result<elicit_scoring::Tier2Output> {
        Err(elicit_core::Error::InvalidInput("boom".to_string()))
    }
}

#[test]
fn weights_must_sum_to_one() {
    let bad = TwoTierEngine::new(
        vec![],
        vec![
            Box::new(FixedScorer { id: "a", weight: 0.5, raw: 1.0 }),
            Box::new(FixedScorer { id: "b", weight: 0.3, raw: 1.0 }),
        ],
        true,
        0.01,
    );
    assert!(bad.is_err());

    let good = TwoTierEngine::new(
        vec![],
        vec![
            Box::new(FixedScorer { id: "a", weight: 0.5, raw: 1.0 }),
            Box::new(FixedScorer { id: "b", weight: 0.5, raw: 1.0 }),
        ],
        true,
        0.01,
    );
    assert!(good.is_ok());
}

#[test]
fn default_config_builds_a_valid_engine() {
    let engine = build_engine(&InterviewConfig::default()).unwrap();
    assert_eq!(engine.tier1_count(), 6);
    assert_eq!(engine.tier2_count(), 10);
}

#[test]
fn contributions_sum_to_final_minus_base() {
    let engine = TwoTierEngine::new(
        vec![],
        vec![
            Box::new(FixedScorer { id: "a", weight: 0.6, raw: 1.5 }),
            Box::new(FixedScorer { id: "b", weight: 0.4, raw: 0.5 }),
        ],
        true,
        0.01,
    )
    .unwrap();

    let state = empty_state();
    let deepen = strategy(StrategyKind::Deepen);
    let focus = Focus::BreadthExploration { description: "x".to_string() };
    let result = engine
        .score_candidate(&deepen, &focus, &ctx!(&state, &[]))
        .unwrap();

    let contribution_sum: f64 = result.tier2.iter().map(|t| t.contribution).sum();
    assert!((result.final_score - result.base_score - contribution_sum).abs() < 1e-9);
    assert!(result.vetoed_by.is_none());
    assert!((result.base_score - deepen.priority_base).abs() < 1e-9);
}

#[test]
fn veto_zeroes_score_and_skips_tier2() {
    let engine = TwoTierEngine::new(
        vec![Box::new(VetoAll)],
        vec![Box::new(FixedScorer { id: "a", weight: 1.0, raw: 2.0 })],
        true,
        0.01,
    )
    .unwrap();

    let state = empty_state();
    let result = engine
        .score_candidate(
            &strategy(StrategyKind::Deepen),
            &Focus::BreadthExploration { description: "x".to_string() },
            &ctx!(&state, &[]),
        )
        .unwrap();

    assert_eq!(result.vetoed_by.as_deref(), Some("veto_all"));
    assert_eq!(result.final_score, 0.0);
    assert!(result.tier2.is_empty());
}

#[test]
fn tier2_failure_is_fatal() {
    let engine =
        TwoTierEngine::new(vec![], vec![Box::new(FailingScorer)], true, 0.01).unwrap();
    let state = empty_state();
    let result = engine.score_candidate(
        &strategy(StrategyKind::Deepen),
        &Focus::BreadthExploration { description: "x".to_string() },
        &ctx!(&state, &[]),
    );
    match result {
        Err(elicit_core::Error::ScorerFailure { scorer, .. }) => assert_eq!(scorer, "failing"),
        other => panic!("expected ScorerFailure, got {:?}", other.map(|r| r.final_score)),
    }
}

#[test]
fn score_all_sorts_non_vetoed_first_then_by_score() {
    struct VetoDeepen;
    impl VetoScorer for VetoDeepen {
        fn id(&self) -> &'static str {
            "veto_deepen"
        }
        fn evaluate(
            &self,
            strategy: &Strategy,
            _focus: &Focus,
            _ctx: &ScoringContext<'_>,
        ) -> elicit_core::Result<Tier1Output> {
            Ok(if strategy.kind == StrategyKind::Deepen {
                Tier1Output::veto("veto_deepen", "no depth")
            } else {
                Tier1Output::pass("veto_deepen", "ok")
            })
        }
    }

    let engine = TwoTierEngine::new(
        vec![Box::new(VetoDeepen)],
        vec![Box::new(FixedScorer { id: "a", weight: 1.0, raw: 1.0 })],
        true,
        0.01,
    )
    .unwrap();

    let state = empty_state();
    let focus = Focus::BreadthExploration { description: "x".to_string() };
    let candidates = vec![
        (strategy(StrategyKind::Deepen), focus.clone()),
        (strategy(StrategyKind::Broaden), focus.clone()),
        (strategy(StrategyKind::CoverElement), focus),
    ];
    let results = engine.score_all(&candidates, &ctx!(&state, &[])).unwrap();

    assert!(!results[0].is_vetoed());
    // cover_element (base 1.1) beats broaden (0.9) among survivors.
    assert_eq!(results[0].strategy, StrategyKind::CoverElement);
    assert_eq!(results[1].strategy, StrategyKind::Broaden);
    assert!(results[2].is_vetoed());
}

// ===========================================================================
// RecentRedundancyScorer - duplicate question veto
// ===========================================================================

#[test]
fn redundancy_vetoes_duplicate_question() {
    let scorer = RecentRedundancyScorer::default();
    let history = vec![
        utterance(Speaker::System, 1, "Why is feeling satisfying important to you?"),
        utterance(Speaker::User, 2, "Because it keeps me going"),
        utterance(Speaker::System, 3, "Why is feeling satisfying important to you?"),
        utterance(Speaker::User, 4, "I already said"),
    ];
    let state = empty_state();
    let focus = Focus::DepthExploration {
        node_id: None,
        description: "Why is feeling satisfying important to you?".to_string(),
        confidence: 0.8,
    };
    let output = scorer
        .evaluate(&strategy(StrategyKind::Deepen), &focus, &ctx!(&state, &history))
        .unwrap();

    assert!(output.is_veto);
    let similarity = output.signals["similarity"].as_f64().unwrap();
    assert!(similarity >= 0.85, "similarity {}", similarity);
}

#[test]
fn redundancy_passes_distinct_question() {
    let scorer = RecentRedundancyScorer::default();
    let history = vec![utterance(
        Speaker::System,
        1,
        "Why is feeling satisfying important to you?",
    )];
    let state = empty_state();
    let focus = Focus::BreadthExploration {
        description: "Tell me about the packaging".to_string(),
    };
    let output = scorer
        .evaluate(&strategy(StrategyKind::Broaden), &focus, &ctx!(&state, &history))
        .unwrap();
    assert!(!output.is_veto);
}

// ===========================================================================
// ConsecutiveExhaustionScorer - exhaustion veto chain
// ===========================================================================

fn exhausted_history() -> Vec<Utterance> {
    vec![
        utterance(Speaker::System, 1, "What do you like about oat milk?"),
        utterance(Speaker::User, 2, "nothing"),
        utterance(Speaker::System, 3, "What else comes to mind?"),
        utterance(Speaker::User, 4, "nothing else"),
        utterance(Speaker::System, 5, "Anything more?"),
        utterance(Speaker::User, 6, "nothing really"),
    ]
}

#[test]
fn exhaustion_vetoes_more_seeking_strategies_only() {
    let scorer = ConsecutiveExhaustionScorer::default();
    let history = exhausted_history();
    let state = empty_state();
    let focus = Focus::BreadthExploration { description: "Explore new aspects".to_string() };

    for kind in [StrategyKind::Deepen, StrategyKind::Broaden, StrategyKind::CoverElement] {
        let output = scorer
            .evaluate(&strategy(kind), &focus, &ctx!(&state, &history))
            .unwrap();
        assert!(output.is_veto, "{:?} should be vetoed", kind);
    }
    for kind in [
        StrategyKind::Synthesis,
        StrategyKind::Reflection,
        StrategyKind::Laddering,
        StrategyKind::Closing,
    ] {
        let output = scorer
            .evaluate(&strategy(kind), &focus, &ctx!(&state, &history))
            .unwrap();
        assert!(!output.is_veto, "{:?} should survive", kind);
    }
}

#[test]
fn substantive_response_resets_exhaustion_count() {
    let scorer = ConsecutiveExhaustionScorer::default();
    let mut history = exhausted_history();
    history.push(utterance(Speaker::System, 7, "How about the taste?"));
    history.push(utterance(
        Speaker::User,
        8,
        "Oh the taste is actually great, slightly sweet",
    ));
    let state = empty_state();
    let focus = Focus::BreadthExploration { description: "Explore new aspects".to_string() };
    let output = scorer
        .evaluate(&strategy(StrategyKind::Deepen), &focus, &ctx!(&state, &history))
        .unwrap();
    assert!(!output.is_veto);
}

// ===========================================================================
// Full engine over the exhaustion scenario: synthesis survives
// ===========================================================================

#[test]
fn exhaustion_scenario_synthesis_survives_full_engine() {
    let engine = build_engine(&InterviewConfig::default()).unwrap();
    let history = exhausted_history();
    let state = empty_state();
    let ctx = ctx!(&state, &history);

    let candidates = vec![
        (
            strategy(StrategyKind::Deepen),
            Focus::DepthExploration {
                node_id: None,
                description: "Deepen understanding".to_string(),
                confidence: 0.5,
            },
        ),
        (
            strategy(StrategyKind::Broaden),
            Focus::BreadthExploration { description: "Explore new aspects".to_string() },
        ),
        (
            strategy(StrategyKind::Synthesis),
            Focus::Reflection {
                description: "Play back what we've heard and check it resonates".to_string(),
            },
        ),
    ];
    let results = engine.score_all(&candidates, &ctx).unwrap();

    let winner = results.iter().find(|r| !r.is_vetoed()).unwrap();
    assert_eq!(winner.strategy, StrategyKind::Synthesis);
    for result in &results {
        if result.strategy.asks_for_more() {
            assert_eq!(result.vetoed_by.as_deref(), Some("consecutive_exhaustion"));
        }
    }
}

// ===========================================================================
// Clarification veto via LLM signals
// ===========================================================================

#[test]
fn clarification_signal_vetoes_deepen_but_not_ease() {
    use elicit_scoring::tier1::ClarificationVetoScorer;
    let scorer = ClarificationVetoScorer::default();

    let mut state = empty_state();
    let mut signals = SignalSet::empty(3);
    signals.uncertainty = Some(UncertaintySignal {
        uncertainty_type: UncertaintyType::ConceptualClarity,
        confidence: 0.9,
        severity: 0.6,
        examples: vec![],
        reasoning: "asked what laddering means".to_string(),
    });
    state.signals = Some(signals);

    let focus = Focus::BreadthExploration { description: "x".to_string() };
    let vetoed = scorer
        .evaluate(&strategy(StrategyKind::Deepen), &focus, &ctx!(&state, &[]))
        .unwrap();
    assert!(vetoed.is_veto);

    let exempt = scorer
        .evaluate(&strategy(StrategyKind::Ease), &focus, &ctx!(&state, &[]))
        .unwrap();
    assert!(!exempt.is_veto);
}

// ===========================================================================
// Question repetition counter
// ===========================================================================

#[test]
fn question_repetition_vetoes_at_threshold_and_resets() {
    use elicit_scoring::tier1::QuestionRepetitionScorer;
    let scorer = QuestionRepetitionScorer::default();

    let mut state = empty_state();
    state.repetition_count = 2;

    let repetitive = Focus::BreadthExploration {
        description: "What else stands out about the texture?".to_string(),
    };
    let output = scorer
        .evaluate(&strategy(StrategyKind::Broaden), &repetitive, &ctx!(&state, &[]))
        .unwrap();
    assert!(output.is_veto);

    // Deepen is allowed even over the threshold.
    let allowed = scorer
        .evaluate(&strategy(StrategyKind::Deepen), &repetitive, &ctx!(&state, &[]))
        .unwrap();
    assert!(!allowed.is_veto);

    // A non-repetitive question resets the effective counter.
    let fresh = Focus::BreadthExploration {
        description: "How does the price feel to you?".to_string(),
    };
    let reset = scorer
        .evaluate(&strategy(StrategyKind::Broaden), &fresh, &ctx!(&state, &[]))
        .unwrap();
    assert!(!reset.is_veto);
    assert_eq!(reset.signals["current_count"].as_u64(), Some(0));
}

// ===========================================================================
// Tier-2 behaviors
// ===========================================================================

#[test]
fn coverage_gap_boosts_uncovered_elements() {
    let scorer = CoverageGapScorer::default();
    let mut state = empty_state();
    let mut coverage = elicit_graph::CoverageState::default();
    coverage.elements.insert(
        "texture".to_string(),
        ElementCoverage {
            element_id: "texture".to_string(),
            label: "texture".to_string(),
            covered: false,
            depth_score: 0.0,
            shallow: false,
        },
    );
    coverage.elements.insert(
        "taste".to_string(),
        ElementCoverage {
            element_id: "taste".to_string(),
            label: "taste".to_string(),
            covered: true,
            depth_score: 0.3,
            shallow: true,
        },
    );
    state.coverage = Some(coverage);
    let ctx = ctx!(&state, &[]);

    let uncovered = scorer
        .score(
            &strategy(StrategyKind::CoverElement),
            &Focus::CoverageGap {
                element_id: "texture".to_string(),
                description: "Cover: texture".to_string(),
            },
            &ctx,
        )
        .unwrap();
    // Uncovered element: 2 gaps -> 1.0 + 0.30.
    assert!((uncovered.raw_score - 1.30).abs() < 1e-9);

    let shallow = scorer
        .score(
            &strategy(StrategyKind::CoverElement),
            &Focus::CoverageGap {
                element_id: "taste".to_string(),
                description: "Cover: taste".to_string(),
            },
            &ctx,
        )
        .unwrap();
    // Shallow element: 1 gap -> 1.15.
    assert!((shallow.raw_score - 1.15).abs() < 1e-9);

    let non_coverage = scorer
        .score(
            &strategy(StrategyKind::Deepen),
            &Focus::DepthExploration {
                node_id: None,
                description: "Deepen".to_string(),
                confidence: 0.5,
            },
            &ctx,
        )
        .unwrap();
    assert!((non_coverage.raw_score - 0.85).abs() < 1e-9);
}

#[test]
fn strategy_diversity_penalizes_overuse() {
    let scorer = StrategyDiversityScorer::default();
    let mut state = empty_state();
    state.strategy_history = vec![
        StrategyKind::Deepen,
        StrategyKind::Deepen,
        StrategyKind::Broaden,
        StrategyKind::Deepen,
    ];
    let ctx = ctx!(&state, &[]);
    let focus = Focus::BreadthExploration { description: "x".to_string() };

    let overused = scorer
        .score(&strategy(StrategyKind::Deepen), &focus, &ctx)
        .unwrap();
    assert!((overused.raw_score - 0.6).abs() < 1e-9);

    let moderate = scorer
        .score(&strategy(StrategyKind::Broaden), &focus, &ctx)
        .unwrap();
    assert!((moderate.raw_score - 1.0).abs() < 1e-9);
}

#[test]
fn novelty_rewards_fresh_focus() {
    let scorer = NoveltyScorer::default();
    let state = empty_state();
    let history = vec![
        utterance(Speaker::User, 1, "the texture is creamy and thick"),
        utterance(Speaker::User, 2, "texture really matters to me"),
        utterance(Speaker::User, 3, "did I mention the texture"),
        utterance(Speaker::User, 4, "texture again"),
    ];
    let recent = [node("n1", "texture", "attribute")];
    let ctx = ScoringContext::new(&state, &recent, &[], &[], &history, Phase::Exploratory);

    let stale = scorer
        .score(
            &strategy(StrategyKind::Deepen),
            &Focus::DepthExploration {
                node_id: Some("n1".to_string()),
                description: "Deepen: texture creaminess".to_string(),
                confidence: 0.8,
            },
            &ctx,
        )
        .unwrap();
    assert!((stale.raw_score - 0.7).abs() < 1e-9, "got {}", stale.raw_score);

    let fresh = scorer
        .score(
            &strategy(StrategyKind::Broaden),
            &Focus::BreadthExploration { description: "Explore packaging sustainability".to_string() },
            &ctx,
        )
        .unwrap();
    assert!((fresh.raw_score - 1.2).abs() < 1e-9);
}

#[test]
fn saturation_scorer_redirects_depth_to_breadth() {
    use elicit_scoring::tier2::SaturationScorer;
    let scorer = SaturationScorer::default();

    let mut state = empty_state();
    // All doubletons: Chao1 ratio 1.0 > 0.90 threshold.
    state.nodes_by_type.insert("attribute".to_string(), 2);
    state.nodes_by_type.insert("value".to_string(), 2);
    state.node_count = 4;
    let ctx = ctx!(&state, &[]);
    let focus = Focus::BreadthExploration { description: "x".to_string() };

    let depth = scorer
        .score(&strategy(StrategyKind::Deepen), &focus, &ctx)
        .unwrap();
    assert!((depth.raw_score - 0.7).abs() < 1e-9);

    let breadth = scorer
        .score(&strategy(StrategyKind::Broaden), &focus, &ctx)
        .unwrap();
    assert!((breadth.raw_score - 1.5).abs() < 1e-9);

    let closing = scorer
        .score(&strategy(StrategyKind::Closing), &focus, &ctx)
        .unwrap();
    assert!((closing.raw_score - 1.0).abs() < 1e-9);
}

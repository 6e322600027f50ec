//! Strategy selection - enumerate (strategy, focus) candidates, score
//! them through the two-tier engine, pick the winner, keep alternatives.

use elicit_core::{Focus, Phase, Result, Strategy, StrategyKind, Utterance};
use elicit_core::config::{EngineConfig, PhaseConfig};
use elicit_graph::{GraphState, KGEdge, KGNode};
use elicit_scoring::tier1::question_repetition::DEFAULT_REPETITION_PATTERNS;
use elicit_scoring::{ScoringContext, ScoringResult, TwoTierEngine};
use tracing::{debug, info, warn};

pub struct SelectionResult {
    pub strategy: Strategy,
    pub focus: Focus,
    pub final_score: f64,
    /// Full two-tier result for the winner; None on fallback paths.
    pub scoring: Option<ScoringResult>,
    pub alternatives: Vec<ScoringResult>,
    /// Every scored candidate, for the persisted trace.
    pub all_results: Vec<ScoringResult>,
}

pub struct StrategyService {
    engine: TwoTierEngine,
    strategies: Vec<Strategy>,
    exploratory_end: u32,
    focused_end: u32,
    alternatives_count: usize,
    alternatives_min_score: f64,
}

impl StrategyService {
    pub fn new(engine: TwoTierEngine, phases: &PhaseConfig, engine_config: &EngineConfig) -> Self {
        let strategies: Vec<Strategy> = elicit_core::strategy::builtin_strategies()
            .into_iter()
            .filter(|s| s.enabled)
            .collect();
        info!(
            num_strategies = strategies.len(),
            "strategy service initialized (two-tier)"
        );
        Self {
            engine,
            strategies,
            exploratory_end: phases.exploratory_turns,
            focused_end: phases.exploratory_turns + phases.focused_turns,
            alternatives_count: engine_config.alternatives_count,
            alternatives_min_score: engine_config.alternatives_min_score,
        }
    }

    /// Phase is deterministic from turn count alone.
    pub fn determine_phase(&self, turn_count: u32) -> Phase {
        if turn_count < self.exploratory_end {
            Phase::Exploratory
        } else if turn_count < self.focused_end {
            Phase::Focused
        } else {
            Phase::Closing
        }
    }

    /// Select the best strategy for the current state. Writes phase,
    /// strategy history and the repetition counter back into
    /// `graph_state` for the winning candidate.
    ///
    /// Emergency-only strategies (reflection) are never enumerated as
    /// ordinary candidates; they are reachable only through the
    /// all-vetoed fallback. A session at its `max_turns` cap always
    /// selects closing, whatever scoring preferred.
    pub fn select(
        &self,
        graph_state: &mut GraphState,
        recent_nodes: &[KGNode],
        nodes: &[KGNode],
        edges: &[KGEdge],
        history: &[Utterance],
        max_turns: u32,
    ) -> Result<SelectionResult> {
        let phase = self.determine_phase(graph_state.turn_count);
        graph_state.phase = Some(phase);

        let mut candidates: Vec<(Strategy, Focus)> = Vec::new();
        for strategy in self.strategies.iter().filter(|s| !s.emergency_only) {
            let focuses = self.possible_focuses(strategy, graph_state, recent_nodes);
            if focuses.is_empty() {
                debug!(strategy = %strategy.kind, "no focuses generated");
                continue;
            }
            for focus in focuses {
                candidates.push((strategy.clone(), focus));
            }
        }

        let results = {
            let ctx = ScoringContext::new(graph_state, recent_nodes, nodes, edges, history, phase);
            self.engine.score_all(&candidates, &ctx)?
        };

        let winner = results.iter().find(|r| !r.is_vetoed()).cloned();

        let mut selection = match winner {
            Some(top) => {
                let alternatives: Vec<ScoringResult> = results
                    .iter()
                    .filter(|r| !r.is_vetoed())
                    .skip(1)
                    .take(self.alternatives_count)
                    .filter(|r| r.final_score >= self.alternatives_min_score)
                    .cloned()
                    .collect();

                info!(
                    strategy = %top.strategy,
                    focus_type = top.focus.type_name(),
                    score = top.final_score,
                    num_alternatives = alternatives.len(),
                    "strategy selected (two-tier)"
                );

                SelectionResult {
                    strategy: self.strategy_by_kind(top.strategy),
                    focus: top.focus.clone(),
                    final_score: top.final_score,
                    scoring: Some(top),
                    alternatives,
                    all_results: results,
                }
            }
            None => {
                warn!("all candidates vetoed - using fallback");
                let mut fallback = self.fallback(graph_state.turn_count);
                fallback.all_results = results;
                fallback
            }
        };

        // Final turn: the wrap-up question is asked under the closing
        // strategy regardless of what scoring preferred.
        if max_turns > 0
            && graph_state.turn_count >= max_turns
            && selection.strategy.kind != StrategyKind::Closing
        {
            info!(
                turn = graph_state.turn_count,
                max_turns, "turn cap reached - forcing closing strategy"
            );
            let all_results = std::mem::take(&mut selection.all_results);
            let closing_result = all_results
                .iter()
                .find(|r| r.strategy == StrategyKind::Closing && !r.is_vetoed())
                .cloned();
            let focus = closing_result
                .as_ref()
                .map(|r| r.focus.clone())
                .unwrap_or_else(|| Focus::Closing {
                    description: "Closing interview - thank you for sharing".to_string(),
                });
            let final_score = closing_result.as_ref().map(|r| r.final_score).unwrap_or(0.0);
            selection = SelectionResult {
                strategy: self.strategy_by_kind(StrategyKind::Closing),
                focus,
                final_score,
                scoring: closing_result,
                alternatives: Vec::new(),
                all_results,
            };
        }

        graph_state.strategy_history.push(selection.strategy.kind);
        graph_state.repetition_count = if is_repetitive(selection.focus.description()) {
            graph_state.repetition_count + 1
        } else {
            0
        };

        Ok(selection)
    }

    fn strategy_by_kind(&self, kind: StrategyKind) -> Strategy {
        self.strategies
            .iter()
            .find(|s| s.kind == kind)
            .cloned()
            .expect("catalog strategy vanished")
    }

    fn possible_focuses(
        &self,
        strategy: &Strategy,
        graph_state: &GraphState,
        recent_nodes: &[KGNode],
    ) -> Vec<Focus> {
        let most_recent = recent_nodes.first();
        match strategy.kind {
            StrategyKind::Deepen => vec![match most_recent {
                Some(node) => Focus::DepthExploration {
                    node_id: Some(node.id.clone()),
                    description: format!("Deepen: {}", node.label),
                    confidence: 0.8,
                },
                None => Focus::DepthExploration {
                    node_id: None,
                    description: "Deepen understanding".to_string(),
                    confidence: 0.5,
                },
            }],
            StrategyKind::Broaden => vec![Focus::BreadthExploration {
                description: "Explore new aspects".to_string(),
            }],
            StrategyKind::CoverElement => graph_state
                .coverage
                .as_ref()
                .map(|coverage| {
                    coverage
                        .elements
                        .values()
                        .filter(|e| !e.covered)
                        .map(|e| Focus::CoverageGap {
                            element_id: e.element_id.clone(),
                            description: format!("Cover: {}", e.label),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            StrategyKind::Closing => {
                let min_turns = strategy.min_turns.unwrap_or(8);
                if graph_state.turn_count >= min_turns {
                    vec![Focus::Closing {
                        description: "Closing interview - thank you for sharing".to_string(),
                    }]
                } else {
                    Vec::new()
                }
            }
            StrategyKind::Reflection => vec![Focus::Reflection {
                description: "Is there anything else you'd like to share?".to_string(),
            }],
            StrategyKind::Synthesis => vec![Focus::Reflection {
                description: "Play back what we've heard and check it resonates".to_string(),
            }],
            StrategyKind::Laddering => most_recent
                .map(|node| {
                    vec![Focus::DepthExploration {
                        node_id: Some(node.id.clone()),
                        description: format!("Ladder up: why does {} matter", node.label),
                        confidence: 0.8,
                    }]
                })
                .unwrap_or_default(),
            StrategyKind::Ease => vec![Focus::BreadthExploration {
                description: "A lighter angle to rebuild comfort".to_string(),
            }],
            StrategyKind::Bridge => most_recent
                .map(|node| {
                    vec![Focus::DepthExploration {
                        node_id: Some(node.id.clone()),
                        description: format!("Bridge from {} to a related area", node.label),
                        confidence: 0.7,
                    }]
                })
                .unwrap_or_default(),
            StrategyKind::Contrast => most_recent
                .map(|node| {
                    vec![Focus::DepthExploration {
                        node_id: Some(node.id.clone()),
                        description: format!("Contrast: the opposite view of {}", node.label),
                        confidence: 0.7,
                    }]
                })
                .unwrap_or_default(),
        }
    }

    /// All-vetoed fallback: closing when eligible, else reflection,
    /// else a hardcoded broaden.
    fn fallback(&self, turn_count: u32) -> SelectionResult {
        let closing = self.strategies.iter().find(|s| s.kind == StrategyKind::Closing);
        if let Some(closing) = closing {
            if turn_count >= closing.min_turns.unwrap_or(8) {
                return SelectionResult {
                    strategy: closing.clone(),
                    focus: Focus::Closing {
                        description: "Closing interview".to_string(),
                    },
                    final_score: 0.0,
                    scoring: None,
                    alternatives: Vec::new(),
                    all_results: Vec::new(),
                };
            }
        }
        if let Some(reflection) = self
            .strategies
            .iter()
            .find(|s| s.kind == StrategyKind::Reflection)
        {
            return SelectionResult {
                strategy: reflection.clone(),
                focus: Focus::Reflection {
                    description: "Is there anything else you'd like to share?".to_string(),
                },
                final_score: 0.0,
                scoring: None,
                alternatives: Vec::new(),
                all_results: Vec::new(),
            };
        }
        let broaden = self
            .strategies
            .iter()
            .find(|s| s.kind == StrategyKind::Broaden)
            .cloned()
            .unwrap_or_else(|| {
                elicit_core::strategy::builtin_strategies()
                    .into_iter()
                    .find(|s| s.kind == StrategyKind::Broaden)
                    .expect("broaden in builtin catalog")
            });
        SelectionResult {
            strategy: broaden,
            focus: Focus::BreadthExploration {
                description: "Let's explore something new".to_string(),
            },
            final_score: 0.0,
            scoring: None,
            alternatives: Vec::new(),
            all_results: Vec::new(),
        }
    }
}

fn is_repetitive(question: &str) -> bool {
    let lower = question.to_lowercase();
    DEFAULT_REPETITION_PATTERNS
        .iter()
        .any(|p| lower.contains(*p))
}

//! Two-tier hybrid scoring engine.

use elicit_core::{Error, Focus, Phase, Result, Strategy, StrategyKind, Utterance};
use elicit_graph::{GraphState, KGEdge, KGNode};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::{debug, info};

use crate::tier2::graph_utils::Clusters;

/// Everything a scorer may look at. Pure state - scorers never mutate.
pub struct ScoringContext<'a> {
    pub graph_state: &'a GraphState,
    pub recent_nodes: &'a [KGNode],
    /// All active nodes/edges, for cluster-level metrics.
    pub nodes: &'a [KGNode],
    pub edges: &'a [KGEdge],
    pub history: &'a [Utterance],
    pub phase: Phase,
    /// Connected components, computed once per turn.
    pub clusters: Clusters,
}

impl<'a> ScoringContext<'a> {
    pub fn new(
        graph_state: &'a GraphState,
        recent_nodes: &'a [KGNode],
        nodes: &'a [KGNode],
        edges: &'a [KGEdge],
        history: &'a [Utterance],
        phase: Phase,
    ) -> Self {
        Self {
            graph_state,
            recent_nodes,
            nodes,
            edges,
            history,
            phase,
            clusters: Clusters::build(nodes, edges),
        }
    }

    /// Last `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> &[Utterance] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    /// User texts among the last `n` history entries, oldest first.
    pub fn recent_user_texts(&self, n: usize) -> Vec<&str> {
        self.recent_history(n)
            .iter()
            .filter(|u| u.is_user())
            .map(|u| u.text.as_str())
            .collect()
    }

    /// System questions among the last `n` history entries, oldest first.
    pub fn recent_system_texts(&self, n: usize) -> Vec<&str> {
        self.recent_history(n)
            .iter()
            .filter(|u| u.is_system())
            .map(|u| u.text.as_str())
            .collect()
    }
}

/// Output of a Tier-1 hard constraint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tier1Output {
    pub scorer_id: String,
    pub is_veto: bool,
    pub reasoning: String,
    #[serde(default)]
    pub signals: Map<String, serde_json::Value>,
}

impl Tier1Output {
    pub fn pass(scorer_id: &str, reasoning: impl Into<String>) -> Self {
        Self {
            scorer_id: scorer_id.to_string(),
            is_veto: false,
            reasoning: reasoning.into(),
            signals: Map::new(),
        }
    }

    pub fn veto(scorer_id: &str, reasoning: impl Into<String>) -> Self {
        Self {
            scorer_id: scorer_id.to_string(),
            is_veto: true,
            reasoning: reasoning.into(),
            signals: Map::new(),
        }
    }

    pub fn with_signals(mut self, signals: Map<String, serde_json::Value>) -> Self {
        self.signals = signals;
        self
    }
}

/// Output of a Tier-2 weighted scorer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tier2Output {
    pub scorer_id: String,
    /// Clamped to [0, 2]; 1.0 is neutral.
    pub raw_score: f64,
    pub weight: f64,
    /// weight × raw_score.
    pub contribution: f64,
    pub reasoning: String,
    #[serde(default)]
    pub signals: Map<String, serde_json::Value>,
}

impl Tier2Output {
    pub fn new(
        scorer_id: &str,
        weight: f64,
        raw_score: f64,
        reasoning: impl Into<String>,
        signals: Map<String, serde_json::Value>,
    ) -> Self {
        let clamped = raw_score.clamp(0.0, 2.0);
        Self {
            scorer_id: scorer_id.to_string(),
            raw_score: clamped,
            weight,
            contribution: weight * clamped,
            reasoning: reasoning.into(),
            signals,
        }
    }
}

/// Tier-1 hard constraint: a single boolean veto decision.
pub trait VetoScorer: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(
        &self,
        strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier1Output>;
}

/// Tier-2 weighted scorer: one orthogonal dimension in [0, 2].
pub trait WeightedScorer: Send + Sync {
    fn id(&self) -> &'static str;
    fn weight(&self) -> f64;
    fn score(
        &self,
        strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier2Output>;
}

/// Complete result from scoring one (strategy, focus) candidate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringResult {
    pub strategy: StrategyKind,
    pub focus: Focus,
    pub base_score: f64,
    pub final_score: f64,
    pub tier1: Vec<Tier1Output>,
    pub tier2: Vec<Tier2Output>,
    pub vetoed_by: Option<String>,
    pub reasoning_trace: Vec<String>,
}

impl ScoringResult {
    pub fn is_vetoed(&self) -> bool {
        self.vetoed_by.is_some()
    }
}

pub struct TwoTierEngine {
    tier1: Vec<Box<dyn VetoScorer>>,
    tier2: Vec<Box<dyn WeightedScorer>>,
    veto_on_first: bool,
}

impl TwoTierEngine {
    /// Tier-2 weights must sum to 1.0 within `weight_tolerance`; a
    /// mismatch is a fatal configuration error.
    pub fn new(
        tier1: Vec<Box<dyn VetoScorer>>,
        tier2: Vec<Box<dyn WeightedScorer>>,
        veto_on_first: bool,
        weight_tolerance: f64,
    ) -> Result<Self> {
        if !tier2.is_empty() {
            let total: f64 = tier2.iter().map(|s| s.weight()).sum();
            if (total - 1.0).abs() > weight_tolerance {
                return Err(Error::ConfigError(format!(
                    "tier-2 weights must sum to 1.0 (current: {:.4}, scorers: {:?})",
                    total,
                    tier2.iter().map(|s| (s.id(), s.weight())).collect::<Vec<_>>()
                )));
            }
        }
        info!(
            num_tier1 = tier1.len(),
            num_tier2 = tier2.len(),
            "two-tier engine initialized"
        );
        Ok(Self {
            tier1,
            tier2,
            veto_on_first,
        })
    }

    pub fn tier1_count(&self) -> usize {
        self.tier1.len()
    }

    pub fn tier2_count(&self) -> usize {
        self.tier2.len()
    }

    /// Score one candidate. Scorer errors are fatal (fail-fast): they
    /// propagate as `ScorerFailure` and fail the turn.
    pub fn score_candidate(
        &self,
        strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<ScoringResult> {
        let base_score = strategy.priority_base;
        let mut reasoning_trace = vec![format!("base={:.4}", base_score)];
        let mut tier1_outputs = Vec::new();

        for scorer in &self.tier1 {
            let output = scorer
                .evaluate(strategy, focus, ctx)
                .map_err(|e| Error::scorer_failure(scorer.id(), e.to_string()))?;
            reasoning_trace.push(format!(
                "{}: {} - {}",
                output.scorer_id,
                if output.is_veto { "VETO" } else { "PASS" },
                output.reasoning
            ));

            let vetoed = output.is_veto;
            tier1_outputs.push(output);

            if vetoed && self.veto_on_first {
                let vetoed_by = tier1_outputs.last().map(|o| o.scorer_id.clone());
                info!(
                    scorer = vetoed_by.as_deref().unwrap_or("?"),
                    strategy = %strategy.kind,
                    focus_type = focus.type_name(),
                    "candidate vetoed"
                );
                return Ok(ScoringResult {
                    strategy: strategy.kind,
                    focus: focus.clone(),
                    base_score,
                    final_score: 0.0,
                    tier1: tier1_outputs,
                    tier2: Vec::new(),
                    vetoed_by,
                    reasoning_trace,
                });
            }
        }

        let mut final_score = base_score;
        let mut tier2_outputs = Vec::new();
        for scorer in &self.tier2 {
            let output = scorer
                .score(strategy, focus, ctx)
                .map_err(|e| Error::scorer_failure(scorer.id(), e.to_string()))?;
            final_score += output.contribution;
            reasoning_trace.push(format!(
                "{}: {:.4} × {:.2} = {:.4} → cumulative={:.4} ({})",
                output.scorer_id,
                output.raw_score,
                output.weight,
                output.contribution,
                final_score,
                output.reasoning
            ));
            tier2_outputs.push(output);
        }

        debug!(
            strategy = %strategy.kind,
            focus_type = focus.type_name(),
            final_score,
            "candidate scored"
        );

        Ok(ScoringResult {
            strategy: strategy.kind,
            focus: focus.clone(),
            base_score,
            final_score,
            tier1: tier1_outputs,
            tier2: tier2_outputs,
            vetoed_by: None,
            reasoning_trace,
        })
    }

    /// Score all candidates, sorted non-vetoed first then by score
    /// descending.
    pub fn score_all(
        &self,
        candidates: &[(Strategy, Focus)],
        ctx: &ScoringContext<'_>,
    ) -> Result<Vec<ScoringResult>> {
        let mut results = Vec::with_capacity(candidates.len());
        for (strategy, focus) in candidates {
            results.push(self.score_candidate(strategy, focus, ctx)?);
        }
        results.sort_by(|a, b| {
            let veto_order = a.is_vetoed().cmp(&b.is_vetoed());
            veto_order.then(
                b.final_score
                    .partial_cmp(&a.final_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        info!(
            total = candidates.len(),
            vetoed = results.iter().filter(|r| r.is_vetoed()).count(),
            top_score = results.first().map(|r| r.final_score).unwrap_or(0.0),
            "scored all candidates"
        );
        Ok(results)
    }
}

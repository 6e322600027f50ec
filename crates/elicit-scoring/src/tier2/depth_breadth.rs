//! Keeps the interview from going monotonically deep or wide by
//! comparing strategy direction against the current balance need.
//!
//! The depth measure sits behind `DepthProbe`. The shipped probe is the
//! edges-per-node proxy; a BFS chain-length probe can replace it
//! without touching the scorer.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyCategory};
use elicit_graph::GraphState;
use serde_json::json;

const SCORER_ID: &str = "depth_breadth_balance";

pub trait DepthProbe: Send + Sync {
    fn depth(&self, graph_state: &GraphState) -> f64;
}

/// `min(5, edges/nodes × 2)` - a coarse proxy; sparse graphs land in
/// 0.15-0.30.
pub struct EdgeRatioDepthProbe;

impl DepthProbe for EdgeRatioDepthProbe {
    fn depth(&self, graph_state: &GraphState) -> f64 {
        if graph_state.node_count == 0 {
            return 0.0;
        }
        let ratio = graph_state.edge_count as f64 / graph_state.node_count as f64;
        (ratio * 2.0).min(5.0)
    }
}

pub struct DepthBreadthBalanceScorer {
    weight: f64,
    low_breadth_threshold: f64,
    low_depth_threshold: f64,
    probe: Box<dyn DepthProbe>,
}

impl Default for DepthBreadthBalanceScorer {
    fn default() -> Self {
        Self {
            weight: 0.20,
            low_breadth_threshold: 0.4,
            low_depth_threshold: 0.5,
            probe: Box::new(EdgeRatioDepthProbe),
        }
    }
}

impl DepthBreadthBalanceScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.20),
            low_breadth_threshold: config.param_f64("low_breadth_threshold").unwrap_or(0.4),
            low_depth_threshold: config.param_f64("low_depth_threshold").unwrap_or(0.5),
            probe: Box::new(EdgeRatioDepthProbe),
        }
    }

    /// Covered elements / total; node-type diversity (5 types = full
    /// breadth) when no coverage model is present.
    fn breadth_pct(graph_state: &GraphState) -> f64 {
        match &graph_state.coverage {
            Some(coverage) if coverage.total() > 0 => coverage.breadth_pct(),
            _ => {
                let unique_types = graph_state
                    .nodes_by_type
                    .values()
                    .filter(|&&count| count > 0)
                    .count();
                (unique_types as f64 / 5.0).min(1.0)
            }
        }
    }
}

impl WeightedScorer for DepthBreadthBalanceScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(
        &self,
        strategy: &Strategy,
        _focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier2Output> {
        let breadth_pct = Self::breadth_pct(ctx.graph_state);
        let depth_avg = self.probe.depth(ctx.graph_state);

        let breadth_needed = breadth_pct < self.low_breadth_threshold;
        let depth_needed = depth_avg < self.low_depth_threshold;

        let is_wide = matches!(
            strategy.category,
            StrategyCategory::Breadth | StrategyCategory::Coverage
        );
        let is_deep = strategy.category == StrategyCategory::Depth;

        let (raw_score, reasoning) = if breadth_needed {
            if is_wide {
                (
                    1.5,
                    format!("breadth needed ({:.0}%), strategy is {}", breadth_pct * 100.0, strategy.kind),
                )
            } else if is_deep {
                (
                    0.7,
                    format!("breadth needed ({:.0}%), but strategy is {}", breadth_pct * 100.0, strategy.kind),
                )
            } else {
                (
                    0.9,
                    format!("breadth needed ({:.0}%), but strategy is {}", breadth_pct * 100.0, strategy.kind),
                )
            }
        } else if depth_needed {
            if is_deep {
                (1.5, format!("depth needed ({:.1}), strategy is {}", depth_avg, strategy.kind))
            } else if is_wide {
                (0.7, format!("depth needed ({:.1}), but strategy is {}", depth_avg, strategy.kind))
            } else {
                (0.9, format!("depth needed ({:.1}), but strategy is {}", depth_avg, strategy.kind))
            }
        } else {
            (
                1.1,
                format!("balanced (breadth: {:.0}%, depth: {:.1})", breadth_pct * 100.0, depth_avg),
            )
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("breadth_pct", json!(breadth_pct)),
                ("depth_avg", json!(depth_avg)),
                ("breadth_needed", json!(breadth_needed)),
                ("depth_needed", json!(depth_needed)),
            ]),
        ))
    }
}

//! Topic-exhaustion detection via the Chao1 richness estimator plus
//! consecutive low-information turn tracking. The turn pipeline calls
//! `compute_saturation_metrics` during state recomputation; the scorer
//! reads the stored metrics and adjusts depth/breadth candidates.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyCategory};
use elicit_graph::{GraphState, KGNode, SaturationMetrics};
use serde_json::json;
use std::collections::HashMap;

const SCORER_ID: &str = "saturation";

/// Chao1 coverage ratio from the per-type frequency histogram.
///
/// `Chao1 = S_obs + f1²/(2·f2)`, or the bias-corrected
/// `S_obs + f1(f1-1)/2` when no doubletons exist. The coverage ratio
/// `S_obs / Chao1` approaches 1.0 as saturation increases.
pub fn chao1_coverage_ratio(graph_state: &GraphState, recent_nodes: &[KGNode]) -> f64 {
    let mut counts: HashMap<&str, usize> = graph_state
        .nodes_by_type
        .iter()
        .map(|(node_type, count)| (node_type.as_str(), *count))
        .collect();
    for node in recent_nodes {
        *counts.entry(node.node_type.as_str()).or_default() += 1;
    }
    if counts.is_empty() {
        return 0.0;
    }

    let s_obs = counts.len() as f64;
    let f1 = counts.values().filter(|&&c| c == 1).count() as f64;
    let f2 = counts.values().filter(|&&c| c == 2).count() as f64;

    let chao1 = if f2 > 0.0 {
        s_obs + (f1 * f1) / (2.0 * f2)
    } else {
        s_obs + f1 * (f1 - 1.0) / 2.0
    };

    if chao1 <= 0.0 {
        return 0.0;
    }
    (s_obs / chao1).min(1.0)
}

/// Saturation metrics written into the graph state each turn.
/// `new_info_rate` is new concepts this turn over total; a turn is
/// low-info when the rate drops under `new_info_threshold`.
pub fn compute_saturation_metrics(
    graph_state: &GraphState,
    recent_nodes: &[KGNode],
    new_nodes_this_turn: usize,
    previous: Option<&SaturationMetrics>,
    chao1_threshold: f64,
    new_info_threshold: f64,
    run_length: u32,
) -> SaturationMetrics {
    let chao1_ratio = chao1_coverage_ratio(graph_state, recent_nodes);
    let new_info_rate = if graph_state.node_count == 0 {
        1.0
    } else {
        new_nodes_this_turn as f64 / graph_state.node_count as f64
    };
    let consecutive_low_info = if new_info_rate < new_info_threshold {
        previous.map(|p| p.consecutive_low_info).unwrap_or(0) + 1
    } else {
        0
    };
    let is_saturated = chao1_ratio > chao1_threshold || consecutive_low_info >= run_length;

    SaturationMetrics {
        chao1_ratio,
        new_info_rate,
        consecutive_low_info,
        is_saturated,
    }
}

pub struct SaturationScorer {
    weight: f64,
    chao1_threshold: f64,
    run_length: u32,
    saturated_penalty: f64,
    breadth_boost: f64,
}

impl Default for SaturationScorer {
    fn default() -> Self {
        Self {
            weight: 0.15,
            chao1_threshold: 0.90,
            run_length: 2,
            saturated_penalty: 0.7,
            breadth_boost: 1.5,
        }
    }
}

impl SaturationScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.15),
            chao1_threshold: config.param_f64("chao1_threshold").unwrap_or(0.90),
            run_length: config.param_u64("run_length").unwrap_or(2) as u32,
            saturated_penalty: config.param_f64("saturated_penalty").unwrap_or(0.7),
            breadth_boost: config.param_f64("breadth_boost").unwrap_or(1.5),
        }
    }
}

impl WeightedScorer for SaturationScorer {
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
        let chao1_ratio = chao1_coverage_ratio(ctx.graph_state, ctx.recent_nodes);
        let (new_info_rate, consecutive_low_info) = ctx
            .graph_state
            .saturation
            .as_ref()
            .map(|s| (s.new_info_rate, s.consecutive_low_info))
            .unwrap_or((1.0, 0));

        let is_saturated =
            chao1_ratio > self.chao1_threshold || consecutive_low_info >= self.run_length;

        let (raw_score, reasoning) = if !is_saturated {
            (1.0, "topic not saturated - no adjustment".to_string())
        } else {
            match strategy.category {
                StrategyCategory::Depth => (
                    self.saturated_penalty,
                    format!(
                        "topic saturated (Chao1={:.2}, new_info_rate={:.2}, low_info_turns={}) - depth strategy penalized",
                        chao1_ratio, new_info_rate, consecutive_low_info
                    ),
                ),
                StrategyCategory::Breadth => (
                    self.breadth_boost,
                    format!(
                        "topic saturated (Chao1={:.2}) - breadth strategy encouraged to switch topics",
                        chao1_ratio
                    ),
                ),
                _ => (
                    1.0,
                    format!("topic saturated but {:?} strategy - neutral adjustment", strategy.category),
                ),
            }
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score.clamp(0.5, 1.8),
            reasoning,
            signal_map([
                ("chao1_ratio", json!(chao1_ratio)),
                ("new_info_rate", json!(new_info_rate)),
                ("consecutive_low_info", json!(consecutive_low_info)),
                ("is_saturated", json!(is_saturated)),
            ]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elicit_core::InterviewMode;

    fn state_with_types(counts: &[(&str, usize)]) -> GraphState {
        let mut state = GraphState::empty(InterviewMode::CoverageDriven);
        for (node_type, count) in counts {
            state
                .nodes_by_type
                .insert(node_type.to_string(), *count);
            state.node_count += count;
        }
        state
    }

    #[test]
    fn chao1_all_doubletons_is_fully_saturated() {
        // f1 = 0 -> Chao1 = S_obs -> ratio 1.0.
        let state = state_with_types(&[("attribute", 2), ("value", 2)]);
        assert!((chao1_coverage_ratio(&state, &[]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn chao1_many_singletons_is_unsaturated() {
        // f1 = 4, f2 = 0 -> Chao1 = 4 + 6 = 10 -> ratio 0.4.
        let state = state_with_types(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]);
        let ratio = chao1_coverage_ratio(&state, &[]);
        assert!((ratio - 0.4).abs() < 1e-9, "got {}", ratio);
    }

    #[test]
    fn empty_graph_has_zero_ratio() {
        let state = GraphState::empty(InterviewMode::CoverageDriven);
        assert_eq!(chao1_coverage_ratio(&state, &[]), 0.0);
    }

    #[test]
    fn low_info_run_counts_consecutively() {
        let mut state = state_with_types(&[("attribute", 6)]);
        state.node_count = 6;
        let first = compute_saturation_metrics(&state, &[], 0, None, 0.90, 0.05, 2);
        assert_eq!(first.consecutive_low_info, 1);
        assert!(!first.is_saturated || first.chao1_ratio > 0.90);

        let second = compute_saturation_metrics(&state, &[], 0, Some(&first), 0.90, 0.05, 2);
        assert_eq!(second.consecutive_low_info, 2);
        assert!(second.is_saturated);

        let recovered = compute_saturation_metrics(&state, &[], 3, Some(&second), 0.90, 0.05, 2);
        assert_eq!(recovered.consecutive_low_info, 0);
    }
}

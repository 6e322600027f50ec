//! Penalizes strategies leaned on too often in the last few turns.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "strategy_diversity";

pub struct StrategyDiversityScorer {
    weight: f64,
    lookback_window: usize,
    moderate_penalty: f64,
    overuse_penalty: f64,
}

impl Default for StrategyDiversityScorer {
    fn default() -> Self {
        Self {
            weight: 0.10,
            lookback_window: 5,
            moderate_penalty: 0.8,
            overuse_penalty: 0.6,
        }
    }
}

impl StrategyDiversityScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.10),
            lookback_window: config.param_u64("lookback_window").unwrap_or(5) as usize,
            moderate_penalty: config.param_f64("moderate_penalty").unwrap_or(0.8),
            overuse_penalty: config.param_f64("overuse_penalty").unwrap_or(0.6),
        }
    }
}

impl WeightedScorer for StrategyDiversityScorer {
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
        let history = &ctx.graph_state.strategy_history;
        let start = history.len().saturating_sub(self.lookback_window);
        let recent_uses = history[start..]
            .iter()
            .filter(|k| **k == strategy.kind)
            .count();

        let (raw_score, reasoning) = match recent_uses {
            0 => (1.0, format!("strategy {} not used recently", strategy.kind)),
            1 => (1.0, format!("strategy {} used once recently (neutral)", strategy.kind)),
            2 => (
                self.moderate_penalty,
                format!("strategy {} used {} times recently (moderate penalty)", strategy.kind, recent_uses),
            ),
            _ => (
                self.overuse_penalty,
                format!("strategy {} used {} times recently (strong penalty)", strategy.kind, recent_uses),
            ),
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("recent_uses", json!(recent_uses)),
                ("lookback_window", json!(self.lookback_window)),
            ]),
        ))
    }
}

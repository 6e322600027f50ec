//! Distributes attention: fresh focus targets get a boost,
//! over-discussed ones a penalty.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "novelty";

pub struct NoveltyScorer {
    weight: f64,
    lookback_window: usize,
    fresh_threshold: usize,
    overdiscussed_threshold: usize,
    fresh_boost: f64,
    overdiscussed_penalty: f64,
}

impl Default for NoveltyScorer {
    fn default() -> Self {
        Self {
            weight: 0.10,
            lookback_window: 8,
            fresh_threshold: 1,
            overdiscussed_threshold: 4,
            fresh_boost: 1.2,
            overdiscussed_penalty: 0.7,
        }
    }
}

impl NoveltyScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.10),
            lookback_window: config.param_u64("lookback_window").unwrap_or(8) as usize,
            fresh_threshold: config.param_u64("fresh_threshold").unwrap_or(1) as usize,
            overdiscussed_threshold: config.param_u64("overdiscussed_threshold").unwrap_or(4)
                as usize,
            fresh_boost: config.param_f64("fresh_boost").unwrap_or(1.2),
            overdiscussed_penalty: config.param_f64("overdiscussed_penalty").unwrap_or(0.7),
        }
    }
}

impl WeightedScorer for NoveltyScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(
        &self,
        _strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier2Output> {
        let mut mention_count = 0usize;

        if let Some(node_id) = focus.node_id() {
            mention_count += ctx
                .recent_nodes
                .iter()
                .take(self.lookback_window)
                .filter(|n| n.id == node_id)
                .count();
        }

        // Key terms from the focus description against recent turns.
        let key_terms: Vec<String> = focus
            .description()
            .to_lowercase()
            .split_whitespace()
            .take(3)
            .filter(|w| w.len() > 3)
            .map(String::from)
            .collect();
        if !key_terms.is_empty() {
            mention_count += ctx
                .recent_history(self.lookback_window)
                .iter()
                .filter(|turn| {
                    let lower = turn.text.to_lowercase();
                    key_terms.iter().any(|term| lower.contains(term.as_str()))
                })
                .count();
        }

        let (raw_score, reasoning) = if mention_count <= self.fresh_threshold {
            (
                self.fresh_boost,
                format!("focus is fresh (mentioned {} times recently)", mention_count),
            )
        } else if mention_count < self.overdiscussed_threshold {
            (
                1.0,
                format!("focus moderately discussed (mentioned {} times recently)", mention_count),
            )
        } else {
            (
                self.overdiscussed_penalty,
                format!("focus overdiscussed (mentioned {} times recently)", mention_count),
            )
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("mention_count", json!(mention_count)),
                ("node_id", json!(focus.node_id())),
                ("element_id", json!(focus.element_id())),
            ]),
        ))
    }
}

//! Boosts clarification of low-confidence, hedge-heavy focus areas.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "ambiguity";

const HEDGE_WORDS: &[&str] = &[
    "maybe",
    "perhaps",
    "possibly",
    "sort of",
    "kind of",
    "i think",
    "i guess",
    "probably",
    "not sure",
    "uncertain",
];

pub struct AmbiguityScorer {
    weight: f64,
    high_clarity_threshold: f64,
    low_clarity_threshold: f64,
}

impl Default for AmbiguityScorer {
    fn default() -> Self {
        Self {
            weight: 0.15,
            high_clarity_threshold: 0.8,
            low_clarity_threshold: 0.5,
        }
    }
}

impl AmbiguityScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.15),
            high_clarity_threshold: config.param_f64("high_clarity_threshold").unwrap_or(0.8),
            low_clarity_threshold: config.param_f64("low_clarity_threshold").unwrap_or(0.5),
        }
    }
}

impl WeightedScorer for AmbiguityScorer {
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
        let mut hedge_count = 0usize;

        let confidence = focus
            .node_id()
            .and_then(|node_id| ctx.recent_nodes.iter().find(|n| n.id == node_id))
            .map(|node| {
                let lower = node.label.to_lowercase();
                hedge_count += HEDGE_WORDS.iter().filter(|w| lower.contains(**w)).count();
                node.confidence
            })
            .unwrap_or(0.7);

        for text in ctx.recent_user_texts(3) {
            let lower = text.to_lowercase();
            hedge_count += HEDGE_WORDS.iter().filter(|w| lower.contains(**w)).count();
        }

        let (raw_score, reasoning) = if confidence > self.high_clarity_threshold && hedge_count == 0
        {
            (0.9, format!("high clarity (confidence: {:.2})", confidence))
        } else if confidence < self.low_clarity_threshold || hedge_count >= 2 {
            (
                1.5,
                format!(
                    "low clarity (confidence: {:.2}, hedges: {})",
                    confidence, hedge_count
                ),
            )
        } else {
            (
                1.2,
                format!(
                    "medium clarity (confidence: {:.2}, hedges: {})",
                    confidence, hedge_count
                ),
            )
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("confidence", json!(confidence)),
                ("hedge_count", json!(hedge_count)),
                ("node_id", json!(focus.node_id())),
            ]),
        ))
    }
}

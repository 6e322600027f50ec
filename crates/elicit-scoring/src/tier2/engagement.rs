//! Adapts strategy complexity to respondent momentum: back off depth
//! when energy is low, lean in when it is high.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyCategory};
use serde_json::json;

const SCORER_ID: &str = "engagement";

const ELABORATION_MARKERS: &[&str] = &[
    "because",
    "since",
    "for example",
    "specifically",
    "such as",
    "meaning",
];

const ENTHUSIASM_MARKERS: &[&str] = &[
    "!",
    "really",
    "absolutely",
    "love",
    "great",
    "perfect",
    "excited",
];

pub struct EngagementScorer {
    weight: f64,
    low_momentum_threshold: f64,
    high_momentum_threshold: f64,
}

impl Default for EngagementScorer {
    fn default() -> Self {
        Self {
            weight: 0.10,
            low_momentum_threshold: 30.0,
            high_momentum_threshold: 70.0,
        }
    }
}

impl EngagementScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.10),
            low_momentum_threshold: config.param_f64("low_momentum_threshold").unwrap_or(30.0),
            high_momentum_threshold: config.param_f64("high_momentum_threshold").unwrap_or(70.0),
        }
    }

    /// 5×words + 20×elaboration + 15×enthusiasm.
    fn momentum(text: &str) -> f64 {
        let lower = text.to_lowercase();
        let length_score = text.split_whitespace().count() as f64 * 5.0;
        let elaboration: f64 = ELABORATION_MARKERS
            .iter()
            .filter(|m| lower.contains(**m))
            .count() as f64
            * 20.0;
        let enthusiasm: f64 = ENTHUSIASM_MARKERS
            .iter()
            .filter(|m| lower.contains(**m))
            .count() as f64
            * 15.0;
        length_score + elaboration + enthusiasm
    }
}

impl WeightedScorer for EngagementScorer {
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
        let user_texts = ctx.recent_user_texts(10);
        let momentum_scores: Vec<f64> = user_texts
            .iter()
            .rev()
            .take(5)
            .map(|text| Self::momentum(text))
            .collect();
        let low_momentum_count = momentum_scores
            .iter()
            .filter(|&&m| m < self.low_momentum_threshold)
            .count();
        let avg_momentum = if momentum_scores.is_empty() {
            50.0
        } else {
            momentum_scores.iter().sum::<f64>() / momentum_scores.len() as f64
        };

        let is_deep = strategy.category == StrategyCategory::Depth;

        let (raw_score, reasoning) = if low_momentum_count >= 3 {
            if is_deep {
                (
                    0.8,
                    format!(
                        "low engagement (avg momentum: {:.0}), favor simpler strategies over {}",
                        avg_momentum, strategy.kind
                    ),
                )
            } else {
                (
                    1.2,
                    format!("low engagement (avg momentum: {:.0}), favor {}", avg_momentum, strategy.kind),
                )
            }
        } else if avg_momentum > self.high_momentum_threshold && is_deep {
            (
                1.1,
                format!("high engagement (avg momentum: {:.0}), {} appropriate", avg_momentum, strategy.kind),
            )
        } else {
            (1.0, format!("medium engagement (avg momentum: {:.0})", avg_momentum))
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("avg_momentum", json!(avg_momentum)),
                ("low_momentum_count", json!(low_momentum_count)),
                ("momentum_scores", json!(momentum_scores)),
            ]),
        ))
    }
}

//! Boosts synthesis once saturation says the ground is well covered.

use crate::tier2::saturation::chao1_coverage_ratio;
use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyKind};
use serde_json::json;

const SCORER_ID: &str = "cluster_saturation";

pub struct ClusterSaturationScorer {
    weight: f64,
    high_saturation_threshold: f64,
    moderate_saturation_threshold: f64,
}

impl Default for ClusterSaturationScorer {
    fn default() -> Self {
        Self {
            weight: 0.10,
            high_saturation_threshold: 0.7,
            moderate_saturation_threshold: 0.4,
        }
    }
}

impl ClusterSaturationScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.10),
            high_saturation_threshold: config
                .param_f64("high_saturation_threshold")
                .unwrap_or(0.7),
            moderate_saturation_threshold: config
                .param_f64("moderate_saturation_threshold")
                .unwrap_or(0.4),
        }
    }
}

impl WeightedScorer for ClusterSaturationScorer {
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
        if strategy.kind != StrategyKind::Synthesis {
            return Ok(Tier2Output::new(
                SCORER_ID,
                self.weight,
                1.0,
                format!("not synthesis strategy ({}), saturation not applicable", strategy.kind),
                signal_map([("saturation_checked", json!(false))]),
            ));
        }

        let saturation = chao1_coverage_ratio(ctx.graph_state, ctx.recent_nodes);

        let (raw_score, reasoning) = if saturation > self.high_saturation_threshold {
            (
                1.5,
                format!(
                    "high saturation ({:.2} > {}) - synthesis strongly encouraged to consolidate",
                    saturation, self.high_saturation_threshold
                ),
            )
        } else if saturation > self.moderate_saturation_threshold {
            (
                1.2,
                format!(
                    "moderate saturation ({:.2} > {}) - synthesis moderately encouraged",
                    saturation, self.moderate_saturation_threshold
                ),
            )
        } else {
            (
                1.0,
                format!("low saturation ({:.2}) - keep exploring before synthesizing", saturation),
            )
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([("saturation", json!(saturation))]),
        ))
    }
}

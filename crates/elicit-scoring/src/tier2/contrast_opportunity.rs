//! Boosts contrast moves when an opposite-stance node exists near a
//! dense cluster - a natural counter-example is on the table.

use crate::tier2::graph_utils::has_opposite_stance;
use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyKind};
use serde_json::json;

const SCORER_ID: &str = "contrast_opportunity";

pub struct ContrastOpportunityScorer {
    weight: f64,
    high_density_threshold: f64,
}

impl Default for ContrastOpportunityScorer {
    fn default() -> Self {
        Self {
            weight: 0.10,
            high_density_threshold: 0.6,
        }
    }
}

impl ContrastOpportunityScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.10),
            high_density_threshold: config.param_f64("high_density_threshold").unwrap_or(0.6),
        }
    }
}

impl WeightedScorer for ContrastOpportunityScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn score(
        &self,
        strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier2Output> {
        if strategy.kind != StrategyKind::Contrast {
            return Ok(Tier2Output::new(
                SCORER_ID,
                self.weight,
                1.0,
                format!("not contrast strategy ({}), opportunity check not applicable", strategy.kind),
                signal_map([("opportunity_checked", json!(false))]),
            ));
        }

        let has_opposite = has_opposite_stance(focus.node_id(), ctx.nodes);
        let density = focus
            .node_id()
            .map(|id| ctx.clusters.local_density(id))
            .unwrap_or(0.0);

        let (raw_score, reasoning) = if has_opposite && density > self.high_density_threshold {
            (
                1.5,
                format!(
                    "opposite stance node with high cluster density ({:.2} > {}) - excellent counter-example opportunity",
                    density, self.high_density_threshold
                ),
            )
        } else if has_opposite {
            (
                1.2,
                format!("opposite stance node with lower cluster density ({:.2}) - good counter-example opportunity", density),
            )
        } else {
            (
                1.0,
                "no opposite stance node found - contrast not particularly valuable".to_string(),
            )
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("has_opposite", json!(has_opposite)),
                ("density", json!(density)),
                ("focus_node_id", json!(focus.node_id())),
            ]),
        ))
    }
}

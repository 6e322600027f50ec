//! Boosts bridge moves when a dense peripheral cluster of 3+ nodes is
//! waiting to be connected.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyKind};
use serde_json::json;

const SCORER_ID: &str = "peripheral_readiness";

pub struct PeripheralReadinessScorer {
    weight: f64,
    high_density_threshold: f64,
    moderate_density_threshold: f64,
    min_peripheral_count: usize,
    any_peripheral_count: usize,
}

impl Default for PeripheralReadinessScorer {
    fn default() -> Self {
        Self {
            weight: 0.10,
            high_density_threshold: 0.7,
            moderate_density_threshold: 0.5,
            min_peripheral_count: 3,
            any_peripheral_count: 1,
        }
    }
}

impl PeripheralReadinessScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.10),
            high_density_threshold: config.param_f64("high_density_threshold").unwrap_or(0.7),
            moderate_density_threshold: config
                .param_f64("moderate_density_threshold")
                .unwrap_or(0.5),
            min_peripheral_count: config.param_u64("min_peripheral_count").unwrap_or(3) as usize,
            any_peripheral_count: config.param_u64("any_peripheral_count").unwrap_or(1) as usize,
        }
    }
}

impl WeightedScorer for PeripheralReadinessScorer {
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
        if strategy.kind != StrategyKind::Bridge {
            return Ok(Tier2Output::new(
                SCORER_ID,
                self.weight,
                1.0,
                format!("not bridge strategy ({}), peripheral check not applicable", strategy.kind),
                signal_map([("peripheral_checked", json!(false))]),
            ));
        }

        let (peripheral_count, density) = ctx.clusters.peripheral_cluster(focus.node_id());

        let (raw_score, reasoning) = if density > self.high_density_threshold
            && peripheral_count >= self.min_peripheral_count
        {
            (
                1.5,
                format!(
                    "dense peripheral cluster ({:.2} > {}) with {} nodes - excellent bridging opportunity",
                    density, self.high_density_threshold, peripheral_count
                ),
            )
        } else if density > self.moderate_density_threshold
            || peripheral_count >= self.any_peripheral_count
        {
            (
                1.2,
                format!(
                    "moderate peripheral cluster (density {:.2}, {} nodes) - good bridging opportunity",
                    density, peripheral_count
                ),
            )
        } else {
            (
                1.0,
                format!(
                    "low peripheral density ({:.2}) and no peripheral nodes ({}) - bridging not valuable",
                    density, peripheral_count
                ),
            )
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("peripheral_count", json!(peripheral_count)),
                ("density", json!(density)),
                ("focus_node_id", json!(focus.node_id())),
            ]),
        ))
    }
}

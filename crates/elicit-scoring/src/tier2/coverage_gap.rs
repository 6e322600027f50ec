//! Boosts candidates that fill coverage gaps: uncovered elements count
//! double, shallow ones single.

use crate::two_tier::{ScoringContext, Tier2Output, WeightedScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyCategory};
use serde_json::json;

const SCORER_ID: &str = "coverage_gap";

pub struct CoverageGapScorer {
    weight: f64,
    boost_per_gap: f64,
}

impl Default for CoverageGapScorer {
    fn default() -> Self {
        Self {
            weight: 0.20,
            boost_per_gap: 0.15,
        }
    }
}

impl CoverageGapScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            weight: config.weight.unwrap_or(0.20),
            boost_per_gap: config.param_f64("boost_per_gap").unwrap_or(0.15),
        }
    }
}

impl WeightedScorer for CoverageGapScorer {
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
        let mut gaps = 0u32;
        let mut gap_details: Vec<String> = Vec::new();

        if let (Some(element_id), Some(coverage)) =
            (focus.element_id(), ctx.graph_state.coverage.as_ref())
        {
            if let Some(element) = coverage.elements.get(element_id) {
                if !element.covered {
                    gaps += 2;
                    gap_details.push(format!("uncovered:{}", element_id));
                } else if element.depth_score < 0.5 {
                    gaps += 1;
                    gap_details.push(format!(
                        "shallow:{}(depth={:.2})",
                        element_id, element.depth_score
                    ));
                }
            }
        }

        // Coverage strategies without a specific gap still earn a small
        // exploration boost.
        if strategy.category == StrategyCategory::Coverage && gaps == 0 {
            gaps = 1;
            gap_details.push("coverage_exploration".to_string());
        }

        let raw_score = if gaps == 0 && strategy.category != StrategyCategory::Coverage {
            0.85
        } else {
            (1.0 + gaps as f64 * self.boost_per_gap).clamp(0.5, 1.8)
        };

        let reasoning = if gap_details.is_empty() {
            format!("addresses {} coverage gap(s)", gaps)
        } else {
            format!("addresses {} coverage gap(s): {}", gaps, gap_details.join(", "))
        };

        Ok(Tier2Output::new(
            SCORER_ID,
            self.weight,
            raw_score,
            reasoning,
            signal_map([
                ("gaps_addressed", json!(gaps)),
                ("gap_details", json!(gap_details)),
                ("element_id", json!(focus.element_id())),
            ]),
        ))
    }
}

//! Vetoes candidates whose focus element has been mentioned enough times
//! with established relationships - nothing left to learn there.

use crate::two_tier::{ScoringContext, Tier1Output, VetoScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "element_exhausted";

pub struct ElementExhaustedScorer {
    max_mentions: usize,
    lookback_window: usize,
}

impl Default for ElementExhaustedScorer {
    fn default() -> Self {
        Self {
            max_mentions: 5,
            lookback_window: 10,
        }
    }
}

impl ElementExhaustedScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            max_mentions: config.param_u64("max_mentions").unwrap_or(5) as usize,
            lookback_window: config.param_u64("lookback_window").unwrap_or(10) as usize,
        }
    }
}

impl VetoScorer for ElementExhaustedScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn evaluate(
        &self,
        _strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier1Output> {
        let Some(element_id) = focus.element_id() else {
            return Ok(Tier1Output::pass(
                SCORER_ID,
                "no element_id in focus - cannot check exhaustion",
            ));
        };

        let element_term = element_id.to_lowercase().replace('_', " ");
        let mention_count = ctx
            .recent_history(self.lookback_window)
            .iter()
            .filter(|turn| turn.text.to_lowercase().contains(&element_term))
            .count();

        // 2+ recent nodes touching the element suggests relationships
        // are already established.
        let related_nodes = ctx
            .recent_nodes
            .iter()
            .filter(|n| n.label.to_lowercase().contains(&element_term))
            .count();
        let has_relationships = related_nodes >= 2;

        let signals = signal_map([
            ("element_id", json!(element_id)),
            ("mention_count", json!(mention_count)),
            ("has_relationships", json!(has_relationships)),
        ]);

        if mention_count >= self.max_mentions && has_relationships {
            return Ok(Tier1Output::veto(
                SCORER_ID,
                format!(
                    "element '{}' mentioned {} times (max: {}) with established relationships",
                    element_id, mention_count, self.max_mentions
                ),
            )
            .with_signals(signals));
        }

        Ok(Tier1Output::pass(
            SCORER_ID,
            format!(
                "element '{}' mentioned {} times (threshold: {})",
                element_id, mention_count, self.max_mentions
            ),
        )
        .with_signals(signals))
    }
}

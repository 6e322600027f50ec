//! Vetoes deepen/broaden/cover_element after 3+ consecutive exhaustion
//! responses ("nothing", "nothing else", "don't know"). Mode-shifting
//! strategies stay allowed.

use crate::two_tier::{ScoringContext, Tier1Output, VetoScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "consecutive_exhaustion";

const DEFAULT_PATTERNS: &[&str] = &[
    "nothing",
    "nothing else",
    "nothing really",
    "nothing more",
    "nothing much",
    "nothing comes to mind",
    "don't know",
    "do not know",
    "can't think",
    "cannot think",
    "that's it",
    "that is it",
    "that's all",
    "that is all",
    "no, that's",
    "no, nothing",
];

pub struct ConsecutiveExhaustionScorer {
    threshold: usize,
    negative_patterns: Vec<String>,
}

impl Default for ConsecutiveExhaustionScorer {
    fn default() -> Self {
        Self {
            threshold: 3,
            negative_patterns: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ConsecutiveExhaustionScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            threshold: config.param_u64("threshold").unwrap_or(3) as usize,
            negative_patterns: config
                .param_strings("negative_patterns")
                .unwrap_or_else(|| DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn is_exhaustion_response(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.negative_patterns.iter().any(|p| lower.contains(p.as_str()))
    }

    /// Walk backwards over user responses, counting consecutive
    /// exhaustion matches; stop at the first substantive response.
    fn consecutive_count(&self, ctx: &ScoringContext<'_>) -> usize {
        let mut count = 0;
        for turn in ctx.history.iter().rev() {
            if !turn.is_user() {
                continue;
            }
            let text = turn.text.trim();
            if text.is_empty() {
                continue;
            }
            if self.is_exhaustion_response(text) {
                count += 1;
            } else {
                break;
            }
        }
        count
    }
}

impl VetoScorer for ConsecutiveExhaustionScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn evaluate(
        &self,
        strategy: &Strategy,
        _focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier1Output> {
        let consecutive = self.consecutive_count(ctx);
        let last_response = ctx
            .history
            .iter()
            .rev()
            .find(|u| u.is_user() && !u.text.trim().is_empty())
            .map(|u| u.text.chars().take(50).collect::<String>())
            .unwrap_or_default();

        let signals = signal_map([
            ("consecutive_count", json!(consecutive)),
            ("threshold", json!(self.threshold)),
            ("last_response", json!(last_response)),
            ("strategy", json!(strategy.kind.as_str())),
        ]);

        if consecutive >= self.threshold {
            if strategy.kind.asks_for_more() {
                return Ok(Tier1Output::veto(
                    SCORER_ID,
                    format!(
                        "user has given {} consecutive exhaustion responses (threshold: {}); \
                         vetoing {} to avoid repetitive 'what else' questions",
                        consecutive, self.threshold, strategy.kind
                    ),
                )
                .with_signals(signals));
            }
            return Ok(Tier1Output::pass(
                SCORER_ID,
                format!(
                    "{} consecutive exhaustion responses, but {} shifts conversation mode",
                    consecutive, strategy.kind
                ),
            )
            .with_signals(signals));
        }

        Ok(Tier1Output::pass(
            SCORER_ID,
            format!(
                "consecutive exhaustion count: {} (threshold: {})",
                consecutive, self.threshold
            ),
        )
        .with_signals(signals))
    }
}

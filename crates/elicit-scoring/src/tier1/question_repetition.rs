//! Vetoes broaden/cover_element when the system keeps proposing "what
//! else / anything else" style questions. The running counter lives in
//! `GraphState.repetition_count` and resets on any other question shape.

use crate::two_tier::{ScoringContext, Tier1Output, VetoScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "question_repetition";

pub const DEFAULT_REPETITION_PATTERNS: &[&str] = &[
    "what else",
    "what other",
    "anything else",
    "what else can",
    "what else do",
    "what else would",
    "what else matters",
    "what else is",
];

pub struct QuestionRepetitionScorer {
    threshold: u32,
    repetition_patterns: Vec<String>,
}

impl Default for QuestionRepetitionScorer {
    fn default() -> Self {
        Self {
            threshold: 3,
            repetition_patterns: DEFAULT_REPETITION_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl QuestionRepetitionScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            threshold: config.param_u64("threshold").unwrap_or(3) as u32,
            repetition_patterns: config
                .param_strings("repetition_patterns")
                .unwrap_or_else(|| {
                    DEFAULT_REPETITION_PATTERNS
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),
        }
    }

    pub fn is_repetitive_question(&self, question: &str) -> bool {
        let lower = question.to_lowercase();
        self.repetition_patterns
            .iter()
            .any(|p| lower.contains(p.as_str()))
    }
}

impl VetoScorer for QuestionRepetitionScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn evaluate(
        &self,
        strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier1Output> {
        let proposed = focus.description();
        if proposed.is_empty() {
            return Ok(Tier1Output::pass(
                SCORER_ID,
                "no question in focus - cannot check repetition",
            ));
        }

        let is_repetitive = self.is_repetitive_question(proposed);
        let current = ctx.graph_state.repetition_count;
        // Counter the candidate would reach if asked; the selection step
        // persists the update for the winning candidate only.
        let effective = if is_repetitive { current + 1 } else { 0 };

        let signals = signal_map([
            ("current_count", json!(effective)),
            ("previous_count", json!(current)),
            ("is_repetitive", json!(is_repetitive)),
            (
                "proposed_question",
                json!(proposed.chars().take(100).collect::<String>()),
            ),
        ]);

        if effective >= self.threshold {
            if matches!(
                strategy.kind,
                elicit_core::StrategyKind::Broaden | elicit_core::StrategyKind::CoverElement
            ) {
                return Ok(Tier1Output::veto(
                    SCORER_ID,
                    format!(
                        "system has asked {} consecutive 'what else' style questions \
                         (threshold: {}); vetoing {} to avoid user fatigue",
                        effective, self.threshold, strategy.kind
                    ),
                )
                .with_signals(signals));
            }
            return Ok(Tier1Output::pass(
                SCORER_ID,
                format!(
                    "{} consecutive 'what else' questions, but {} shifts conversation mode",
                    effective, strategy.kind
                ),
            )
            .with_signals(signals));
        }

        Ok(Tier1Output::pass(
            SCORER_ID,
            format!(
                "consecutive 'what else' question count: {} (threshold: {})",
                effective, self.threshold
            ),
        )
        .with_signals(signals))
    }
}

//! Vetoes depth/bridge strategies when the respondent shows conceptual
//! confusion. Prefers the LLM uncertainty signal; falls back to pattern
//! matching when no signal is present.

use crate::two_tier::{ScoringContext, Tier1Output, VetoScorer};
use crate::util::signal_map;
use elicit_core::signals::UncertaintyType;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy, StrategyKind};
use serde_json::json;

const SCORER_ID: &str = "clarification_veto";

const CONFUSION_PATTERNS: &[&str] = &[
    "i don't understand",
    "i do not understand",
    "what do you mean",
    "not sure what you mean",
    "don't get it",
    "do not get it",
    "confused",
    "don't follow",
    "do not follow",
    "not clear",
    "unclear",
];

pub struct ClarificationVetoScorer {
    severity_threshold: f64,
    vetoed_strategies: Vec<StrategyKind>,
}

impl Default for ClarificationVetoScorer {
    fn default() -> Self {
        Self {
            severity_threshold: 0.3,
            vetoed_strategies: vec![
                StrategyKind::Deepen,
                StrategyKind::Broaden,
                StrategyKind::Bridge,
            ],
        }
    }
}

impl ClarificationVetoScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            severity_threshold: config.param_f64("severity_threshold").unwrap_or(0.3),
            ..Default::default()
        }
    }

    fn evaluate_with_signals(
        &self,
        strategy: &Strategy,
        ctx: &ScoringContext<'_>,
    ) -> Option<Tier1Output> {
        let uncertainty = ctx.graph_state.signals.as_ref()?.uncertainty.as_ref()?;

        if uncertainty.uncertainty_type != UncertaintyType::ConceptualClarity
            || uncertainty.severity <= self.severity_threshold
        {
            return Some(
                Tier1Output::pass(
                    SCORER_ID,
                    format!(
                        "no conceptual confusion above threshold (detected: {:?}, severity: {:.2})",
                        uncertainty.uncertainty_type, uncertainty.severity
                    ),
                )
                .with_signals(signal_map([
                    ("severity", json!(uncertainty.severity)),
                    ("llm_enhanced", json!(true)),
                ])),
            );
        }

        // Process-management strategies stay available for repair.
        if strategy.kind.is_process_management() {
            return Some(Tier1Output::pass(
                SCORER_ID,
                format!(
                    "conceptual confusion detected but {} is exempt (process-management strategy)",
                    strategy.kind
                ),
            ));
        }

        if self.vetoed_strategies.contains(&strategy.kind) {
            Some(
                Tier1Output::veto(
                    SCORER_ID,
                    format!(
                        "user shows conceptual confusion (severity: {:.2}, threshold: {}): {}",
                        uncertainty.severity, self.severity_threshold, uncertainty.reasoning
                    ),
                )
                .with_signals(signal_map([
                    ("severity", json!(uncertainty.severity)),
                    ("threshold", json!(self.severity_threshold)),
                    ("llm_enhanced", json!(true)),
                ])),
            )
        } else {
            Some(Tier1Output::pass(
                SCORER_ID,
                format!(
                    "conceptual confusion detected but {} may still be productive",
                    strategy.kind
                ),
            ))
        }
    }

    fn evaluate_rule_based(&self, strategy: &Strategy, ctx: &ScoringContext<'_>) -> Tier1Output {
        let matched = ctx
            .recent_user_texts(3)
            .iter()
            .flat_map(|response| {
                let lower = response.to_lowercase();
                CONFUSION_PATTERNS
                    .iter()
                    .filter(|p| lower.contains(**p))
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
            })
            .next();

        match matched {
            Some(pattern) if self.vetoed_strategies.contains(&strategy.kind) => Tier1Output::veto(
                SCORER_ID,
                format!("user indicated confusion: {}", pattern),
            )
            .with_signals(signal_map([
                ("matched_pattern", json!(pattern)),
                ("llm_enhanced", json!(false)),
            ])),
            Some(_) => Tier1Output::pass(
                SCORER_ID,
                format!(
                    "user confusion detected but {} may still be productive",
                    strategy.kind
                ),
            ),
            None => Tier1Output::pass(SCORER_ID, "no confusion signals detected in recent conversation"),
        }
    }
}

impl VetoScorer for ClarificationVetoScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn evaluate(
        &self,
        strategy: &Strategy,
        _focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier1Output> {
        if let Some(output) = self.evaluate_with_signals(strategy, ctx) {
            return Ok(output);
        }
        Ok(self.evaluate_rule_based(strategy, ctx))
    }
}

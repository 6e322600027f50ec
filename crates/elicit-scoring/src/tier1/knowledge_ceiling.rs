//! Vetoes candidates when the respondent has said they lack knowledge
//! about the focus topic ("don't know", "never used", "not familiar").

use crate::two_tier::{ScoringContext, Tier1Output, VetoScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "knowledge_ceiling";

const DEFAULT_PATTERNS: &[&str] = &[
    "don't know",
    "do not know",
    "no idea",
    "never heard",
    "not sure",
    "unfamiliar",
    "no experience",
    "never used",
    "haven't tried",
    "can't say",
    "not familiar",
];

const STOPWORDS: &[&str] = &["deepen", "cover", "explore", "understanding"];

pub struct KnowledgeCeilingScorer {
    negative_patterns: Vec<String>,
}

impl Default for KnowledgeCeilingScorer {
    fn default() -> Self {
        Self {
            negative_patterns: DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl KnowledgeCeilingScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            negative_patterns: config
                .param_strings("negative_patterns")
                .unwrap_or_else(|| DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Topic terms pulled from the focus description and element id.
    fn topic_terms(focus: &Focus) -> Vec<String> {
        let mut terms: Vec<String> = focus
            .description()
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
            .take(5)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if let Some(element_id) = focus.element_id() {
            terms.push(element_id.to_lowercase().replace('_', " "));
        }
        terms.sort();
        terms.dedup();
        terms
    }
}

impl VetoScorer for KnowledgeCeilingScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn evaluate(
        &self,
        _strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier1Output> {
        let topic_terms = Self::topic_terms(focus);
        if topic_terms.is_empty() {
            return Ok(
                Tier1Output::pass(SCORER_ID, "no specific focus topic to check").with_signals(
                    signal_map([("topic_terms", json!([]))]),
                ),
            );
        }

        let recent_responses = ctx.recent_user_texts(5);
        for response in &recent_responses {
            let lower = response.to_lowercase();
            for pattern in &self.negative_patterns {
                if lower.contains(pattern.as_str())
                    && topic_terms
                        .iter()
                        .any(|term| term.len() > 3 && lower.contains(term.as_str()))
                {
                    return Ok(Tier1Output::veto(
                        SCORER_ID,
                        format!(
                            "respondent indicated lack of knowledge about topic: {} (near topic)",
                            pattern
                        ),
                    )
                    .with_signals(signal_map([
                        ("matched_pattern", json!(pattern)),
                        ("topic_terms", json!(topic_terms)),
                        ("element_id", json!(focus.element_id())),
                        ("node_id", json!(focus.node_id())),
                    ])));
                }
            }
        }

        Ok(
            Tier1Output::pass(SCORER_ID, "no knowledge lack signals detected for this topic")
                .with_signals(signal_map([
                    ("topic_terms", json!(topic_terms)),
                    ("checked_responses", json!(recent_responses.len())),
                ])),
        )
    }
}

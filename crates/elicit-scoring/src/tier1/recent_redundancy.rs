//! Vetoes candidates whose proposed question is near-identical to a
//! recent system question, by TF-IDF cosine similarity.

use crate::text_similarity::TfidfCosine;
use crate::two_tier::{ScoringContext, Tier1Output, VetoScorer};
use crate::util::signal_map;
use elicit_core::{config::ScorerConfig, Focus, Result, Strategy};
use serde_json::json;

const SCORER_ID: &str = "recent_redundancy";

pub struct RecentRedundancyScorer {
    similarity: TfidfCosine,
    lookback_window: usize,
}

impl Default for RecentRedundancyScorer {
    fn default() -> Self {
        Self {
            similarity: TfidfCosine::new(0.85),
            lookback_window: 6,
        }
    }
}

impl RecentRedundancyScorer {
    pub fn from_config(config: &ScorerConfig) -> Self {
        Self {
            similarity: TfidfCosine::new(config.param_f64("similarity_threshold").unwrap_or(0.85)),
            lookback_window: config.param_u64("lookback_window").unwrap_or(6) as usize,
        }
    }
}

impl VetoScorer for RecentRedundancyScorer {
    fn id(&self) -> &'static str {
        SCORER_ID
    }

    fn evaluate(
        &self,
        _strategy: &Strategy,
        focus: &Focus,
        ctx: &ScoringContext<'_>,
    ) -> Result<Tier1Output> {
        let proposed = focus.description();
        if proposed.is_empty() {
            return Ok(Tier1Output::pass(
                SCORER_ID,
                "no question in focus - cannot check redundancy",
            ));
        }

        let recent_questions = ctx.recent_system_texts(self.lookback_window);
        if recent_questions.is_empty() {
            return Ok(
                Tier1Output::pass(SCORER_ID, "no recent questions to compare against")
                    .with_signals(signal_map([("recent_questions_count", json!(0))])),
            );
        }

        let (too_similar, max_similarity) = self.similarity.is_too_similar(proposed, &recent_questions);

        let signals = signal_map([
            ("similarity", json!(max_similarity)),
            ("threshold", json!(self.similarity.similarity_threshold)),
            ("proposed_question", json!(truncate(proposed, 50))),
            ("recent_questions_count", json!(recent_questions.len())),
        ]);

        if too_similar {
            return Ok(Tier1Output::veto(
                SCORER_ID,
                format!(
                    "proposed question too similar to recent question (similarity: {:.2} >= {})",
                    max_similarity, self.similarity.similarity_threshold
                ),
            )
            .with_signals(signals));
        }

        Ok(Tier1Output::pass(
            SCORER_ID,
            format!(
                "question sufficiently distinct from recent {} questions",
                recent_questions.len()
            ),
        )
        .with_signals(signals))
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

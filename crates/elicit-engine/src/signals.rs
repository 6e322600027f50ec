//! Qualitative signal extraction over the last few conversation turns.
//!
//! Runs against the lighter scoring client at low temperature. The
//! whole call degrading is fine - the turn never blocks on signals -
//! and individual signal parse failures only annotate the set.

use chrono::Utc;
use elicit_core::signals::*;
use elicit_core::{Result, Utterance};
use elicit_llm::{LlmClient, LlmRequest};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PROMPT_VERSION: &str = "v2";
const HISTORY_WINDOW: usize = 5;

pub struct SignalExtractor {
    llm: Arc<dyn LlmClient>,
    temperature: f32,
}

impl SignalExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            temperature: 0.2,
        }
    }

    /// Extract signals from recent history. Never fails the turn: LLM
    /// errors return an empty set carrying the error string.
    pub async fn extract(
        &self,
        history: &[Utterance],
        turn_number: u32,
        cancel: CancellationToken,
    ) -> SignalSet {
        let started = Instant::now();

        if history.iter().filter(|u| u.is_user()).count() < 2 {
            debug!(history_len = history.len(), "insufficient history for signals");
            return SignalSet::empty(turn_number);
        }

        let window_start = history.len().saturating_sub(HISTORY_WINDOW * 2);
        let window = &history[window_start..];

        let conversation = window
            .iter()
            .map(|u| {
                let speaker = if u.is_user() { "Respondent" } else { "Interviewer" };
                format!("{}: {}", speaker, u.text)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let request = LlmRequest::new(build_user_prompt(&conversation, turn_number))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(1500);

        let response = match self.llm.complete(request, Some(cancel)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "qualitative signal extraction failed");
                let mut set = SignalSet::empty(turn_number);
                set.latency_ms = started.elapsed().as_millis() as u64;
                set.extraction_errors.push(e.to_string());
                return set;
            }
        };

        let mut set = parse_signals(&response.content, turn_number);
        set.source_utterance_id = history.last().map(|u| u.id.clone());
        set.model = response.model;
        set.prompt_version = PROMPT_VERSION.to_string();
        set.latency_ms = started.elapsed().as_millis() as u64;

        info!(
            turn = turn_number,
            signals_extracted = set.signal_count(),
            latency_ms = set.latency_ms,
            "qualitative signals extracted"
        );
        set
    }
}

const SYSTEM_PROMPT: &str = "You are an expert qualitative researcher analyzing interview \
conversation dynamics. Classify the respondent's recent behavior into the requested signal \
categories. Respond with valid JSON only, using exactly the field names given.";

fn build_user_prompt(conversation: &str, turn_number: u32) -> String {
    format!(
        "Analyze the respondent's recent behavior in this conversation (turn {turn_number}).\n\n\
         Conversation:\n{conversation}\n\n\
         Respond with ONLY valid JSON of this shape (omit a signal if not applicable):\n\
         {{\n\
         \"uncertainty_signal\": {{\"uncertainty_type\": \"knowledge_gap|conceptual_clarity|confidence_qualification|epistemic_humility|apathy\", \"confidence\": 0.8, \"severity\": 0.5, \"examples\": [\"...\"], \"reasoning\": \"...\"}},\n\
         \"reasoning_signal\": {{\"reasoning_quality\": \"causal|counterfactual|associative|reactive|metacognitive\", \"confidence\": 0.8, \"depth_score\": 0.5, \"has_examples\": true, \"has_abstractions\": false, \"examples\": [], \"reasoning\": \"...\"}},\n\
         \"emotional_signal\": {{\"intensity\": \"high_positive|moderate_positive|neutral|moderate_negative|high_negative\", \"confidence\": 0.8, \"trajectory\": \"rising|falling|stable|volatile\", \"markers\": [], \"reasoning\": \"...\"}},\n\
         \"contradiction_signal\": {{\"has_contradiction\": false, \"contradiction_type\": null, \"earlier_statement\": \"\", \"current_statement\": \"\", \"confidence\": 0.8, \"reasoning\": \"...\"}},\n\
         \"knowledge_ceiling_signal\": {{\"is_terminal\": false, \"response_type\": \"terminal|exploratory|transitional\", \"has_curiosity\": true, \"redirection_available\": true, \"confidence\": 0.8, \"reasoning\": \"...\"}},\n\
         \"concept_depth_signal\": {{\"abstraction_level\": 0.5, \"has_concrete_examples\": true, \"has_abstract_principles\": false, \"suggestion\": \"deepen|broaden|stay\", \"confidence\": 0.8, \"reasoning\": \"...\"}}\n\
         }}"
    )
}

/// Parse the signal JSON with per-signal isolation: one bad signal
/// never poisons the others.
fn parse_signals(raw: &str, turn_number: u32) -> SignalSet {
    let mut set = SignalSet::empty(turn_number);
    set.generated_at = Utc::now();

    let text = crate::extraction::strip_code_fences(raw);
    let root: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            set.extraction_errors.push(format!("root: {}", e));
            return set;
        }
    };

    fn parse_field<T: serde::de::DeserializeOwned>(
        root: &Value,
        key: &str,
        errors: &mut Vec<String>,
    ) -> Option<T> {
        let value = root.get(key)?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                errors.push(format!("{}: {}", key, e));
                None
            }
        }
    }

    set.uncertainty = parse_field(&root, "uncertainty_signal", &mut set.extraction_errors);
    set.reasoning = parse_field(&root, "reasoning_signal", &mut set.extraction_errors);
    set.emotional = parse_field(&root, "emotional_signal", &mut set.extraction_errors);
    set.contradiction = parse_field(&root, "contradiction_signal", &mut set.extraction_errors);
    set.knowledge_ceiling =
        parse_field(&root, "knowledge_ceiling_signal", &mut set.extraction_errors);
    set.concept_depth = parse_field(&root, "concept_depth_signal", &mut set.extraction_errors);

    set
}

//! Typed subgraph extraction from user utterances.
//!
//! Builds a methodology-aware prompt (node/edge types with examples and
//! admissible connections), requires JSON-only output, then filters the
//! result against the ontology: unknown node types and inadmissible
//! relationships are dropped rather than surfaced.

use elicit_core::{Error, MethodologyRegistry, Result};
use elicit_llm::{LlmClient, LlmRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Utterances shorter than this (or under two tokens) skip extraction.
const MIN_EXTRACTABLE_CHARS: usize = 10;
const MIN_EXTRACTABLE_TOKENS: usize = 2;

#[derive(Clone, Debug, Deserialize)]
pub struct ExtractedConcept {
    pub text: String,
    pub node_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub source_quote: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExtractedRelation {
    pub source_text: String,
    pub target_text: String,
    pub relationship_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub source_quote: Option<String>,
}

fn default_confidence() -> f64 {
    0.7
}

#[derive(Clone, Debug, Default)]
pub struct ExtractionResult {
    pub concepts: Vec<ExtractedConcept>,
    pub relationships: Vec<ExtractedRelation>,
    pub discourse_markers: Vec<String>,
    pub is_extractable: bool,
    pub latency_ms: u64,
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    concepts: Vec<ExtractedConcept>,
    #[serde(default)]
    relationships: Vec<ExtractedRelation>,
    #[serde(default)]
    discourse_markers: Vec<String>,
}

pub struct ExtractionService {
    llm: Arc<dyn LlmClient>,
    methodologies: Arc<MethodologyRegistry>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl ExtractionService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        methodologies: Arc<MethodologyRegistry>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            methodologies,
            temperature,
            max_tokens,
            timeout,
        }
    }

    /// Extract concepts and typed relations from `text`. LLM failures
    /// degrade to an empty, non-extractable result - they never fail
    /// the turn.
    pub async fn extract(
        &self,
        text: &str,
        interviewer_context: Option<&str>,
        methodology: &str,
        cancel: CancellationToken,
    ) -> Result<ExtractionResult> {
        if text.trim().len() < MIN_EXTRACTABLE_CHARS
            || text.split_whitespace().count() < MIN_EXTRACTABLE_TOKENS
        {
            debug!(length = text.len(), "utterance too short, skipping extraction");
            return Ok(ExtractionResult::default());
        }

        let schema = self.methodologies.get(methodology)?;
        let prompt = self.build_prompt(text, interviewer_context, &schema);

        let request = LlmRequest::new(prompt)
            .with_system(
                "You are a qualitative research analyst extracting a typed knowledge \
                 graph from interview responses. Respond with valid JSON only.",
            )
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_timeout(self.timeout);

        let response = match self.llm.complete(request, Some(cancel.clone())).await {
            Ok(response) => response,
            Err(elicit_llm::LlmError::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(error = %e, "extraction LLM failed, degrading to empty extraction");
                return Ok(ExtractionResult::default());
            }
        };

        let raw: RawExtraction = match serde_json::from_str(strip_code_fences(&response.content)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "extraction returned unparseable JSON, degrading to empty");
                return Ok(ExtractionResult::default());
            }
        };

        // Filter against the ontology: unknown types are dropped, not
        // surfaced - a post-filter violation would be a fatal bug.
        let concepts: Vec<ExtractedConcept> = raw
            .concepts
            .into_iter()
            .filter(|c| {
                let valid = schema.is_valid_node_type(&c.node_type);
                if !valid {
                    debug!(node_type = %c.node_type, concept = %c.text, "dropping concept with invalid type");
                }
                valid
            })
            .collect();

        let type_of = |needle: &str| -> Option<&str> {
            concepts
                .iter()
                .find(|c| c.text.eq_ignore_ascii_case(needle))
                .map(|c| c.node_type.as_str())
        };

        let relationships: Vec<ExtractedRelation> = raw
            .relationships
            .into_iter()
            .filter(|r| {
                let (Some(src_type), Some(dst_type)) =
                    (type_of(&r.source_text), type_of(&r.target_text))
                else {
                    debug!(relation = %r.relationship_type, "dropping relationship with unresolved endpoint");
                    return false;
                };
                let valid = schema.is_valid_connection(&r.relationship_type, src_type, dst_type);
                if !valid {
                    debug!(
                        relation = %r.relationship_type,
                        src = src_type,
                        dst = dst_type,
                        "dropping inadmissible relationship"
                    );
                }
                valid
            })
            .collect();

        info!(
            concepts = concepts.len(),
            relationships = relationships.len(),
            latency_ms = response.latency_ms,
            "extraction complete"
        );

        Ok(ExtractionResult {
            concepts,
            relationships,
            discourse_markers: raw.discourse_markers,
            is_extractable: true,
            latency_ms: response.latency_ms,
        })
    }

    fn build_prompt(
        &self,
        text: &str,
        interviewer_context: Option<&str>,
        schema: &elicit_core::MethodologySchema,
    ) -> String {
        let node_section = schema
            .node_descriptions()
            .into_iter()
            .map(|(name, desc)| format!("- {}: {}", name, desc))
            .collect::<Vec<_>>()
            .join("\n");
        let edge_section = schema
            .edge_descriptions_with_connections()
            .into_iter()
            .map(|(name, desc)| format!("- {}: {}", name, desc))
            .collect::<Vec<_>>()
            .join("\n");

        let naming = schema
            .concept_naming_convention
            .as_deref()
            .unwrap_or("Use short noun phrases in the respondent's own words.");

        let guidelines = if schema.extraction_guidelines.is_empty() {
            String::new()
        } else {
            format!(
                "\n## Guidelines:\n{}\n",
                schema
                    .extraction_guidelines
                    .iter()
                    .map(|g| format!("- {}", g))
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        };

        let context = interviewer_context
            .map(|q| format!("Interviewer asked: {}\n\n", q))
            .unwrap_or_default();

        format!(
            "Extract concepts and relationships from this interview response.\n\n\
             {context}Response: {text}\n\n\
             ## Valid node types:\n{node_section}\n\n\
             ## Valid relationship types:\n{edge_section}\n\n\
             ## Concept naming:\n{naming}\n{guidelines}\n\
             Respond with ONLY valid JSON:\n\
             {{\n  \"concepts\": [{{\"text\": \"...\", \"node_type\": \"...\", \"confidence\": 0.9, \"source_quote\": \"...\"}}],\n  \
             \"relationships\": [{{\"source_text\": \"...\", \"target_text\": \"...\", \"relationship_type\": \"...\", \"confidence\": 0.9, \"source_quote\": \"...\"}}],\n  \
             \"discourse_markers\": [\"...\"]\n}}"
        )
    }
}

/// Strip surrounding markdown code fences from an LLM response.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_stripping_handles_plain_and_fenced() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }
}

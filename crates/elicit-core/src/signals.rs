//! Qualitative signal models extracted from conversation by an LLM.
//!
//! These capture semantic patterns that rule-based heuristics miss:
//! uncertainty type, reasoning quality, emotional trajectory,
//! contradictions, knowledge ceilings, and concept abstraction level.
//! Scorers consume them for more nuanced strategy decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyType {
    /// "I don't know enough about this"
    KnowledgeGap,
    /// "I'm not sure what you mean"
    ConceptualClarity,
    /// Hedging language: "I think", "probably"
    ConfidenceQualification,
    /// Honest uncertainty about a complex topic
    EpistemicHumility,
    /// Disengagement - a terminal signal
    Apathy,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningQuality {
    Causal,
    Counterfactual,
    Associative,
    Reactive,
    Metacognitive,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalIntensity {
    HighPositive,
    ModeratePositive,
    Neutral,
    ModerateNegative,
    HighNegative,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalTrajectory {
    Rising,
    Falling,
    Stable,
    Volatile,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CeilingResponseType {
    Terminal,
    Exploratory,
    Transitional,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DepthSuggestion {
    Deepen,
    Broaden,
    Stay,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UncertaintySignal {
    pub uncertainty_type: UncertaintyType,
    pub confidence: f64,
    /// 0-1 impact score for decision-making.
    pub severity: f64,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReasoningSignal {
    pub reasoning_quality: ReasoningQuality,
    pub confidence: f64,
    pub depth_score: f64,
    pub has_examples: bool,
    pub has_abstractions: bool,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmotionalSignal {
    pub intensity: EmotionalIntensity,
    pub confidence: f64,
    pub trajectory: EmotionalTrajectory,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContradictionSignal {
    pub has_contradiction: bool,
    pub contradiction_type: Option<String>,
    #[serde(default)]
    pub earlier_statement: String,
    #[serde(default)]
    pub current_statement: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Distinguishes "don't know, full stop" from "don't know, but curious".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeCeilingSignal {
    pub is_terminal: bool,
    pub response_type: CeilingResponseType,
    pub has_curiosity: bool,
    pub redirection_available: bool,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConceptDepthSignal {
    /// 0 = concrete, 1 = abstract.
    pub abstraction_level: f64,
    pub has_concrete_examples: bool,
    pub has_abstract_principles: bool,
    pub suggestion: DepthSuggestion,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Complete set of qualitative signals for one turn. Every signal is
/// optional - extraction degrades gracefully per signal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalSet {
    pub uncertainty: Option<UncertaintySignal>,
    pub reasoning: Option<ReasoningSignal>,
    pub emotional: Option<EmotionalSignal>,
    pub contradiction: Option<ContradictionSignal>,
    pub knowledge_ceiling: Option<KnowledgeCeilingSignal>,
    pub concept_depth: Option<ConceptDepthSignal>,

    pub turn_number: u32,
    pub source_utterance_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub prompt_version: String,
    pub latency_ms: u64,
    #[serde(default)]
    pub extraction_errors: Vec<String>,
}

impl SignalSet {
    pub fn empty(turn_number: u32) -> Self {
        Self {
            uncertainty: None,
            reasoning: None,
            emotional: None,
            contradiction: None,
            knowledge_ceiling: None,
            concept_depth: None,
            turn_number,
            source_utterance_id: None,
            generated_at: Utc::now(),
            model: "unknown".to_string(),
            prompt_version: "v1".to_string(),
            latency_ms: 0,
            extraction_errors: Vec::new(),
        }
    }

    pub fn signal_count(&self) -> usize {
        [
            self.uncertainty.is_some(),
            self.reasoning.is_some(),
            self.emotional.is_some(),
            self.contradiction.is_some(),
            self.knowledge_ceiling.is_some(),
            self.concept_depth.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Signal values + descriptions for the question-generation prompt.
    pub fn active_for_prompt(&self) -> Vec<(String, String, String)> {
        let mut out = Vec::new();
        if let Some(u) = &self.uncertainty {
            out.push((
                "uncertainty".to_string(),
                format!("{:?} (severity {:.2})", u.uncertainty_type, u.severity),
                u.reasoning.clone(),
            ));
        }
        if let Some(r) = &self.reasoning {
            out.push((
                "reasoning".to_string(),
                format!("{:?} (depth {:.2})", r.reasoning_quality, r.depth_score),
                r.reasoning.clone(),
            ));
        }
        if let Some(e) = &self.emotional {
            out.push((
                "emotional".to_string(),
                format!("{:?} / {:?}", e.intensity, e.trajectory),
                e.reasoning.clone(),
            ));
        }
        if let Some(c) = &self.contradiction {
            if c.has_contradiction {
                out.push((
                    "contradiction".to_string(),
                    c.contradiction_type.clone().unwrap_or_else(|| "detected".to_string()),
                    c.reasoning.clone(),
                ));
            }
        }
        if let Some(k) = &self.knowledge_ceiling {
            out.push((
                "knowledge_ceiling".to_string(),
                format!("{:?} (terminal: {})", k.response_type, k.is_terminal),
                k.reasoning.clone(),
            ));
        }
        if let Some(d) = &self.concept_depth {
            out.push((
                "concept_depth".to_string(),
                format!("abstraction {:.2}, suggest {:?}", d.abstraction_level, d.suggestion),
                d.reasoning.clone(),
            ));
        }
        out
    }
}

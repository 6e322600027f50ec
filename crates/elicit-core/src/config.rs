//! Interview configuration - serde structs loaded from a JSON file.
//!
//! Pure types and parsing only. The composition root decides where the
//! file lives; every field has a default so a missing file still yields
//! a working configuration.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    /// Cosine similarity threshold for merging slot proposals into
    /// existing canonical slots.
    pub canonical_similarity_threshold: f64,
    /// Surface-node support required to promote a candidate slot.
    pub canonical_min_support_nodes: u32,
    pub max_turns: u32,
    /// Target chain length used by coverage depth scores.
    pub depth_target: f64,
    pub phases: PhaseConfig,
    pub engine: EngineConfig,
    pub scorers: ScorersConfig,
    pub llm: LlmConfig,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            canonical_similarity_threshold: 0.80,
            canonical_min_support_nodes: 2,
            max_turns: 10,
            depth_target: 3.0,
            phases: PhaseConfig::default(),
            engine: EngineConfig::default(),
            scorers: ScorersConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl InterviewConfig {
    /// Load from a JSON file. A missing or unreadable file falls back to
    /// defaults; malformed JSON is a hard configuration error.
    pub fn load(path: &Path) -> crate::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| crate::Error::ConfigError(format!("{}: {}", path.display(), e))),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn scorer(&self, id: &str) -> Option<&ScorerConfig> {
        self.scorers
            .tier1
            .iter()
            .chain(self.scorers.tier2.iter())
            .find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub exploratory_turns: u32,
    pub focused_turns: u32,
    pub closing_turns: u32,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            exploratory_turns: 8,
            focused_turns: 12,
            closing_turns: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub veto_on_first: bool,
    pub weight_tolerance: f64,
    pub alternatives_count: usize,
    pub alternatives_min_score: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            veto_on_first: true,
            weight_tolerance: 0.01,
            alternatives_count: 3,
            alternatives_min_score: 0.3,
        }
    }
}

/// Per-scorer configuration entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub weight: Option<f64>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ScorerConfig {
    pub fn new(id: &str, weight: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
            weight,
            params: serde_json::Map::new(),
        }
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| v.as_f64())
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }

    pub fn param_strings(&self, key: &str) -> Option<Vec<String>> {
        self.params.get(key).and_then(|v| {
            v.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.as_str().map(String::from))
                    .collect()
            })
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScorersConfig {
    pub tier1: Vec<ScorerConfig>,
    pub tier2: Vec<ScorerConfig>,
}

impl Default for ScorersConfig {
    fn default() -> Self {
        Self {
            tier1: vec![
                ScorerConfig::new("knowledge_ceiling", None),
                ScorerConfig::new("element_exhausted", None),
                ScorerConfig::new("recent_redundancy", None),
                ScorerConfig::new("clarification_veto", None),
                ScorerConfig::new("consecutive_exhaustion", None),
                ScorerConfig::new("question_repetition", None),
            ],
            // Weights must sum to 1.0 - validated at engine construction.
            tier2: vec![
                ScorerConfig::new("coverage_gap", Some(0.20)),
                ScorerConfig::new("ambiguity", Some(0.10)),
                ScorerConfig::new("depth_breadth_balance", Some(0.15)),
                ScorerConfig::new("engagement", Some(0.10)),
                ScorerConfig::new("strategy_diversity", Some(0.10)),
                ScorerConfig::new("novelty", Some(0.05)),
                ScorerConfig::new("saturation", Some(0.10)),
                ScorerConfig::new("cluster_saturation", Some(0.10)),
                ScorerConfig::new("contrast_opportunity", Some(0.10)),
                ScorerConfig::new("peripheral_readiness", Some(0.10)),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    pub extraction: ClientConfig,
    pub scoring: ClientConfig,
    pub generation: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: "claude-haiku-4-5".to_string(),
            temperature: 0.3,
            max_tokens: 2000,
            timeout_secs: 30,
        }
    }
}

//! Graph domain models.
//!
//! Surface nodes/edges carry the respondent's literal language; canonical
//! slots abstract over phrasing so "silky", "smooth" and "creamy" can
//! share one stable concept. Both live per session.

use chrono::{DateTime, Utc};
use elicit_core::{InterviewMode, Phase, SessionId, SignalSet, StrategyKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A surface node extracted from an utterance. A node with a
/// `superseded_by` link is invisible to all active-graph queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KGNode {
    pub id: String,
    pub session_id: SessionId,
    pub label: String,
    pub node_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub source_utterance_ids: Vec<String>,
    pub recorded_at: DateTime<Utc>,
    /// Insertion order, used for stable recency ordering.
    pub seq: u64,
    pub superseded_by: Option<String>,
}

impl KGNode {
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// Numeric stance from properties, 0 when absent.
    pub fn stance(&self) -> f64 {
        self.properties
            .get("stance")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }
}

/// A typed surface edge. At most one active edge exists per
/// `(session, source, target, edge_type)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KGEdge {
    pub id: String,
    pub session_id: SessionId,
    pub source_node_id: String,
    pub target_node_id: String,
    pub edge_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub source_utterance_ids: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DepthMetrics {
    /// Longest root-to-leaf chain length in edges.
    pub max_depth: u32,
    pub avg_depth: f64,
    /// Labels along one longest chain.
    pub deepest_path: Vec<String>,
}

/// Coverage of one stimulus element.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementCoverage {
    pub element_id: String,
    pub label: String,
    pub covered: bool,
    pub depth_score: f64,
    /// Covered but depth_score < 0.5.
    pub shallow: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CoverageState {
    pub elements: BTreeMap<String, ElementCoverage>,
}

impl CoverageState {
    pub fn covered_count(&self) -> usize {
        self.elements.values().filter(|e| e.covered).count()
    }

    pub fn total(&self) -> usize {
        self.elements.len()
    }

    pub fn uncovered_ids(&self) -> Vec<String> {
        self.elements
            .values()
            .filter(|e| !e.covered)
            .map(|e| e.element_id.clone())
            .collect()
    }

    pub fn breadth_pct(&self) -> f64 {
        if self.elements.is_empty() {
            0.0
        } else {
            self.covered_count() as f64 / self.elements.len() as f64
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SaturationMetrics {
    pub chao1_ratio: f64,
    pub new_info_rate: f64,
    pub consecutive_low_info: u32,
    pub is_saturated: bool,
}

/// Derived surface-graph state, recomputed each turn. Explicit typed
/// fields; only genuinely open-ended extras go in `properties`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphState {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
    /// Active nodes with no incident active edge.
    pub orphan_count: usize,
    pub depth: DepthMetrics,
    pub coverage: Option<CoverageState>,

    pub turn_count: u32,
    pub strategy_history: Vec<StrategyKind>,
    pub interview_mode: InterviewMode,
    pub phase: Option<Phase>,
    /// Consecutive "what else" style questions; reset on any other shape.
    pub repetition_count: u32,
    pub saturation: Option<SaturationMetrics>,
    pub canonical: Option<CanonicalGraphState>,
    pub signals: Option<SignalSet>,

    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl GraphState {
    pub fn empty(mode: InterviewMode) -> Self {
        Self {
            node_count: 0,
            edge_count: 0,
            nodes_by_type: BTreeMap::new(),
            edges_by_type: BTreeMap::new(),
            orphan_count: 0,
            depth: DepthMetrics::default(),
            coverage: None,
            turn_count: 0,
            strategy_history: Vec::new(),
            interview_mode: mode,
            phase: None,
            repetition_count: 0,
            saturation: None,
            canonical: None,
            signals: None,
            properties: serde_json::Map::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Candidate,
    Active,
}

/// A stable latent concept shared by several surface nodes.
///
/// Created as a candidate with zero support; each surface mapping bumps
/// `support_count`; promotion to active happens at the configured
/// minimum support. Only active slots feed canonical metrics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalSlot {
    pub id: String,
    pub session_id: SessionId,
    /// Lemma-normalized snake_case name.
    pub slot_name: String,
    pub description: String,
    /// Preserved from the contributing surface nodes.
    pub node_type: String,
    pub status: SlotStatus,
    pub support_count: u32,
    pub first_seen_turn: u32,
    pub promoted_turn: Option<u32>,
    #[serde(skip)]
    pub embedding: Option<std::sync::Arc<Vec<f32>>>,
}

impl CanonicalSlot {
    pub fn is_active(&self) -> bool {
        self.status == SlotStatus::Active
    }
}

/// Surface node → canonical slot assignment. One mapping per surface
/// node; rewriting replaces the row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotMapping {
    pub surface_node_id: String,
    pub canonical_slot_id: String,
    pub similarity_score: f64,
    pub assigned_turn: u32,
}

/// Aggregate relation between two canonical slots, with surface-edge
/// provenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalEdge {
    pub id: String,
    pub session_id: SessionId,
    pub source_slot_id: String,
    pub target_slot_id: String,
    pub edge_type: String,
    pub support_count: u32,
    pub surface_edge_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CanonicalGraphState {
    /// Active slots only; candidates excluded.
    pub concept_count: usize,
    pub edge_count: usize,
    /// Active slots with no incident canonical edge. Candidates are
    /// never orphans.
    pub orphan_count: usize,
    pub max_depth: u32,
    pub avg_support: f64,
}

/// One scored candidate row in the per-turn scoring trace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringCandidateRow {
    pub strategy: StrategyKind,
    pub focus: elicit_core::Focus,
    pub final_score: f64,
    pub base_score: f64,
    pub vetoed_by: Option<String>,
    pub tier1: serde_json::Value,
    pub tier2: serde_json::Value,
    pub reasoning_trace: Vec<String>,
    pub winner: bool,
}

/// All candidates scored in one turn, winner flagged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringTurn {
    pub session_id: SessionId,
    pub turn_number: u32,
    pub candidates: Vec<ScoringCandidateRow>,
}

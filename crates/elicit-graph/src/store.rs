//! In-memory store implementing the persistence contract.
//!
//! Collections are DashMap-backed and scoped by session. Multi-statement
//! operations (slot mapping + support accounting, canonical edge upsert)
//! run under a per-session mutex so they are atomic with respect to
//! concurrent turn processing; the session service additionally
//! serializes whole turns per session.

use crate::coverage;
use crate::embedding::cosine_similarity;
use crate::model::*;
use chrono::Utc;
use dashmap::DashMap;
use elicit_core::{
    ConceptElement, Error, MethodologySchema, Result, Session, SessionId, Speaker, Utterance,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn short_id(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, Session>,
    utterances: DashMap<String, Utterance>,
    nodes: DashMap<String, KGNode>,
    edges: DashMap<String, KGEdge>,
    slots: DashMap<String, CanonicalSlot>,
    /// Keyed by surface_node_id - one mapping per surface node.
    mappings: DashMap<String, SlotMapping>,
    canonical_edges: DashMap<String, CanonicalEdge>,
    /// Keyed by "{session}:{turn}".
    scoring: DashMap<String, ScoringTurn>,
    seq: AtomicU64,
    write_locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    // ==================== SESSIONS ====================

    pub fn create_session(&self, session: Session) -> Result<Session> {
        if self.sessions.contains_key(&session.id) {
            return Err(Error::Conflict(format!("session {} exists", session.id)));
        }
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Session> {
        self.sessions
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))
    }

    pub fn put_session(&self, session: Session) -> Result<()> {
        if !self.sessions.contains_key(&session.id) {
            return Err(Error::NotFound(format!("session {}", session.id)));
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        let mut all: Vec<Session> = self.sessions.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    /// Cascade delete: utterances, nodes, edges, slots, mappings,
    /// canonical edges, and scoring rows go with the session.
    pub fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.sessions
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;

        let node_ids: HashSet<String> = self
            .nodes
            .iter()
            .filter(|n| &n.session_id == id)
            .map(|n| n.id.clone())
            .collect();

        self.utterances.retain(|_, u| &u.session_id != id);
        self.nodes.retain(|_, n| &n.session_id != id);
        self.edges.retain(|_, e| &e.session_id != id);
        self.slots.retain(|_, s| &s.session_id != id);
        self.mappings
            .retain(|surface_id, _| !node_ids.contains(surface_id));
        self.canonical_edges.retain(|_, e| &e.session_id != id);
        self.scoring.retain(|_, s| &s.session_id != id);
        self.write_locks.remove(id);
        Ok(())
    }

    // ==================== UTTERANCES ====================

    pub fn add_utterance(
        &self,
        session_id: &SessionId,
        turn_number: u32,
        speaker: Speaker,
        text: &str,
    ) -> Result<Utterance> {
        let utterance = Utterance {
            id: short_id("utt"),
            session_id: session_id.clone(),
            turn_number,
            speaker,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.utterances
            .insert(utterance.id.clone(), utterance.clone());
        Ok(utterance)
    }

    /// All utterances for a session ordered by turn number.
    pub fn utterances_for(&self, session_id: &SessionId) -> Vec<Utterance> {
        let mut all: Vec<Utterance> = self
            .utterances
            .iter()
            .filter(|u| &u.session_id == session_id)
            .map(|u| u.clone())
            .collect();
        all.sort_by_key(|u| u.turn_number);
        all
    }

    pub fn next_turn_number(&self, session_id: &SessionId) -> u32 {
        self.utterances
            .iter()
            .filter(|u| &u.session_id == session_id)
            .map(|u| u.turn_number)
            .max()
            .map(|n| n + 1)
            .unwrap_or(1)
    }

    // ==================== SURFACE NODES ====================

    pub fn create_node(
        &self,
        schema: &MethodologySchema,
        session_id: &SessionId,
        label: &str,
        node_type: &str,
        confidence: f64,
        properties: serde_json::Map<String, serde_json::Value>,
        source_utterance_ids: Vec<String>,
    ) -> Result<KGNode> {
        if !schema.is_valid_node_type(node_type) {
            return Err(Error::SchemaViolation(format!(
                "unknown node type '{}'",
                node_type
            )));
        }
        let node = KGNode {
            id: short_id("node"),
            session_id: session_id.clone(),
            label: label.to_string(),
            node_type: node_type.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            properties,
            source_utterance_ids,
            recorded_at: Utc::now(),
            seq: self.next_seq(),
            superseded_by: None,
        };
        self.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    pub fn get_node(&self, id: &str) -> Result<KGNode> {
        self.nodes
            .get(id)
            .map(|n| n.clone())
            .ok_or_else(|| Error::NotFound(format!("node {}", id)))
    }

    /// Case-insensitive exact label match over active nodes.
    pub fn find_node_by_label_and_type(
        &self,
        session_id: &SessionId,
        label: &str,
        node_type: &str,
    ) -> Option<KGNode> {
        let needle = label.to_lowercase();
        self.nodes
            .iter()
            .find(|n| {
                &n.session_id == session_id
                    && n.is_active()
                    && n.node_type == node_type
                    && n.label.to_lowercase() == needle
            })
            .map(|n| n.clone())
    }

    /// Record that an existing node was re-extracted from an utterance.
    pub fn append_node_source(&self, node_id: &str, utterance_id: &str) -> Result<()> {
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| Error::NotFound(format!("node {}", node_id)))?;
        if !node.source_utterance_ids.iter().any(|u| u == utterance_id) {
            node.source_utterance_ids.push(utterance_id.to_string());
        }
        Ok(())
    }

    /// Belief revision: the old node becomes invisible to active queries.
    pub fn supersede_node(&self, old_id: &str, new_id: &str) -> Result<()> {
        if !self.nodes.contains_key(new_id) {
            return Err(Error::NotFound(format!("node {}", new_id)));
        }
        let mut old = self
            .nodes
            .get_mut(old_id)
            .ok_or_else(|| Error::NotFound(format!("node {}", old_id)))?;
        old.superseded_by = Some(new_id.to_string());
        Ok(())
    }

    pub fn active_nodes(&self, session_id: &SessionId) -> Vec<KGNode> {
        let mut all: Vec<KGNode> = self
            .nodes
            .iter()
            .filter(|n| &n.session_id == session_id && n.is_active())
            .map(|n| n.clone())
            .collect();
        all.sort_by_key(|n| n.seq);
        all
    }

    /// Most recent active nodes first.
    pub fn recent_nodes(&self, session_id: &SessionId, k: usize) -> Vec<KGNode> {
        let mut all = self.active_nodes(session_id);
        all.reverse();
        all.truncate(k);
        all
    }

    // ==================== SURFACE EDGES ====================

    /// Idempotent: a duplicate `(session, source, target, edge_type)`
    /// returns the existing edge with the new source utterances merged
    /// in. Fails when endpoints are missing/superseded or the
    /// connection is not admissible under the methodology.
    #[allow(clippy::too_many_arguments)]
    pub fn create_edge(
        &self,
        schema: &MethodologySchema,
        session_id: &SessionId,
        source_node_id: &str,
        target_node_id: &str,
        edge_type: &str,
        confidence: f64,
        properties: serde_json::Map<String, serde_json::Value>,
        source_utterance_ids: Vec<String>,
    ) -> Result<KGEdge> {
        let source = self.get_node(source_node_id)?;
        let target = self.get_node(target_node_id)?;
        if !source.is_active() || !target.is_active() {
            return Err(Error::InvalidInput(format!(
                "edge endpoints must be active ({} -> {})",
                source_node_id, target_node_id
            )));
        }
        if !schema.is_valid_edge_type(edge_type) {
            return Err(Error::SchemaViolation(format!(
                "unknown edge type '{}'",
                edge_type
            )));
        }
        if !schema.is_valid_connection(edge_type, &source.node_type, &target.node_type) {
            return Err(Error::SchemaViolation(format!(
                "'{}' does not permit {} -> {}",
                edge_type, source.node_type, target.node_type
            )));
        }

        let guard = self.write_lock(session_id);
        let _held = guard.lock().expect("store lock poisoned");

        if let Some(existing_id) = self
            .edges
            .iter()
            .find(|e| {
                &e.session_id == session_id
                    && e.source_node_id == source_node_id
                    && e.target_node_id == target_node_id
                    && e.edge_type == edge_type
            })
            .map(|e| e.id.clone())
        {
            let mut existing = self.edges.get_mut(&existing_id).expect("edge vanished");
            for utterance_id in source_utterance_ids {
                if !existing.source_utterance_ids.contains(&utterance_id) {
                    existing.source_utterance_ids.push(utterance_id);
                }
            }
            return Ok(existing.clone());
        }

        let edge = KGEdge {
            id: short_id("edge"),
            session_id: session_id.clone(),
            source_node_id: source_node_id.to_string(),
            target_node_id: target_node_id.to_string(),
            edge_type: edge_type.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            properties,
            source_utterance_ids,
            recorded_at: Utc::now(),
        };
        self.edges.insert(edge.id.clone(), edge.clone());
        Ok(edge)
    }

    /// Edges whose endpoints are both active.
    pub fn active_edges(&self, session_id: &SessionId) -> Vec<KGEdge> {
        self.edges
            .iter()
            .filter(|e| &e.session_id == session_id)
            .filter(|e| {
                let src_active = self.nodes.get(&e.source_node_id).map(|n| n.is_active());
                let dst_active = self.nodes.get(&e.target_node_id).map(|n| n.is_active());
                src_active == Some(true) && dst_active == Some(true)
            })
            .map(|e| e.clone())
            .collect()
    }

    // ==================== GRAPH STATE ====================

    /// Structural graph state: counts, histograms, orphans, depth and
    /// coverage. The caller layers turn bookkeeping on top.
    pub fn compute_graph_state(
        &self,
        session_id: &SessionId,
        mode: elicit_core::InterviewMode,
        elements: Option<&[ConceptElement]>,
        depth_target: f64,
    ) -> GraphState {
        let nodes = self.active_nodes(session_id);
        let edges = self.active_edges(session_id);

        let mut nodes_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for node in &nodes {
            *nodes_by_type.entry(node.node_type.clone()).or_default() += 1;
        }
        let mut edges_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for edge in &edges {
            *edges_by_type.entry(edge.edge_type.clone()).or_default() += 1;
        }

        let mut touched: HashSet<&str> = HashSet::new();
        for edge in &edges {
            touched.insert(edge.source_node_id.as_str());
            touched.insert(edge.target_node_id.as_str());
        }
        let orphan_count = nodes
            .iter()
            .filter(|n| !touched.contains(n.id.as_str()))
            .count();

        let (depth, levels) = compute_depth_metrics(&nodes, &edges);

        let coverage = elements.map(|els| coverage::compute_coverage(els, &nodes, &levels, depth_target));

        let mut state = GraphState::empty(mode);
        state.node_count = nodes.len();
        state.edge_count = edges.len();
        state.nodes_by_type = nodes_by_type;
        state.edges_by_type = edges_by_type;
        state.orphan_count = orphan_count;
        state.depth = depth;
        state.coverage = coverage;
        state
    }

    // ==================== CANONICAL SLOTS ====================

    /// Create a candidate slot. `(session, slot_name, node_type)` is
    /// unique; callers are expected to check `find_slot_by_name_and_type`
    /// first.
    pub fn create_slot(
        &self,
        session_id: &SessionId,
        slot_name: &str,
        description: &str,
        node_type: &str,
        first_seen_turn: u32,
        embedding: Option<Arc<Vec<f32>>>,
    ) -> Result<CanonicalSlot> {
        let guard = self.write_lock(session_id);
        let _held = guard.lock().expect("store lock poisoned");

        if self
            .find_slot_by_name_and_type(session_id, slot_name, node_type)
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "slot ({}, {}) exists",
                slot_name, node_type
            )));
        }

        let slot = CanonicalSlot {
            id: short_id("slot"),
            session_id: session_id.clone(),
            slot_name: slot_name.to_string(),
            description: description.to_string(),
            node_type: node_type.to_string(),
            status: SlotStatus::Candidate,
            support_count: 0,
            first_seen_turn,
            promoted_turn: None,
            embedding,
        };
        self.slots.insert(slot.id.clone(), slot.clone());
        Ok(slot)
    }

    pub fn get_slot(&self, id: &str) -> Result<CanonicalSlot> {
        self.slots
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| Error::NotFound(format!("slot {}", id)))
    }

    pub fn find_slot_by_name_and_type(
        &self,
        session_id: &SessionId,
        slot_name: &str,
        node_type: &str,
    ) -> Option<CanonicalSlot> {
        self.slots
            .iter()
            .find(|s| {
                &s.session_id == session_id && s.slot_name == slot_name && s.node_type == node_type
            })
            .map(|s| s.clone())
    }

    pub fn slots_with_status(
        &self,
        session_id: &SessionId,
        node_type: Option<&str>,
        status: SlotStatus,
    ) -> Vec<CanonicalSlot> {
        self.slots
            .iter()
            .filter(|s| {
                &s.session_id == session_id
                    && s.status == status
                    && node_type.map(|t| s.node_type == t).unwrap_or(true)
            })
            .map(|s| s.clone())
            .collect()
    }

    pub fn active_slots(&self, session_id: &SessionId) -> Vec<CanonicalSlot> {
        self.slots_with_status(session_id, None, SlotStatus::Active)
    }

    /// O(N) brute-force cosine search over slots of the given type and
    /// status, descending, filtered by `similarity >= threshold`.
    pub fn find_similar_slots(
        &self,
        session_id: &SessionId,
        node_type: &str,
        embedding: &[f32],
        threshold: f64,
        status: SlotStatus,
    ) -> Vec<(CanonicalSlot, f64)> {
        let mut matches: Vec<(CanonicalSlot, f64)> = self
            .slots_with_status(session_id, Some(node_type), status)
            .into_iter()
            .filter_map(|slot| {
                let slot_embedding = slot.embedding.clone()?;
                let similarity = cosine_similarity(embedding, &slot_embedding);
                (similarity >= threshold).then_some((slot, similarity))
            })
            .collect();
        matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        matches
    }

    /// Upsert the surface→slot mapping and keep support counts equal to
    /// the number of mappings per slot, atomically per session.
    pub fn map_surface_to_slot(
        &self,
        surface_node_id: &str,
        slot_id: &str,
        similarity_score: f64,
        assigned_turn: u32,
    ) -> Result<()> {
        let slot = self.get_slot(slot_id)?;
        let guard = self.write_lock(&slot.session_id);
        let _held = guard.lock().expect("store lock poisoned");

        let previous = self.mappings.insert(
            surface_node_id.to_string(),
            SlotMapping {
                surface_node_id: surface_node_id.to_string(),
                canonical_slot_id: slot_id.to_string(),
                similarity_score,
                assigned_turn,
            },
        );

        if let Some(previous) = previous {
            if previous.canonical_slot_id == slot_id {
                // Rewritten in place; support unchanged.
                return Ok(());
            }
            if let Some(mut old_slot) = self.slots.get_mut(&previous.canonical_slot_id) {
                old_slot.support_count = old_slot.support_count.saturating_sub(1);
            }
        }

        let mut slot = self
            .slots
            .get_mut(slot_id)
            .ok_or_else(|| Error::NotFound(format!("slot {}", slot_id)))?;
        slot.support_count += 1;
        Ok(())
    }

    pub fn mapping_for(&self, surface_node_id: &str) -> Option<SlotMapping> {
        self.mappings.get(surface_node_id).map(|m| m.clone())
    }

    pub fn mappings_for_slot(&self, slot_id: &str) -> Vec<SlotMapping> {
        self.mappings
            .iter()
            .filter(|m| m.canonical_slot_id == slot_id)
            .map(|m| m.clone())
            .collect()
    }

    pub fn promote_slot(&self, slot_id: &str, turn: u32) -> Result<()> {
        let mut slot = self
            .slots
            .get_mut(slot_id)
            .ok_or_else(|| Error::NotFound(format!("slot {}", slot_id)))?;
        slot.status = SlotStatus::Active;
        slot.promoted_turn = Some(turn);
        Ok(())
    }

    // ==================== CANONICAL EDGES ====================

    /// Upsert by `(session, source, target, edge_type)`: bump support
    /// and append provenance when present, insert with support 1
    /// otherwise.
    pub fn add_or_update_canonical_edge(
        &self,
        session_id: &SessionId,
        source_slot_id: &str,
        target_slot_id: &str,
        edge_type: &str,
        surface_edge_id: &str,
    ) -> Result<CanonicalEdge> {
        let guard = self.write_lock(session_id);
        let _held = guard.lock().expect("store lock poisoned");

        if let Some(existing_id) = self
            .canonical_edges
            .iter()
            .find(|e| {
                &e.session_id == session_id
                    && e.source_slot_id == source_slot_id
                    && e.target_slot_id == target_slot_id
                    && e.edge_type == edge_type
            })
            .map(|e| e.id.clone())
        {
            let mut existing = self
                .canonical_edges
                .get_mut(&existing_id)
                .expect("canonical edge vanished");
            existing.support_count += 1;
            if !existing
                .surface_edge_ids
                .iter()
                .any(|id| id == surface_edge_id)
            {
                existing.surface_edge_ids.push(surface_edge_id.to_string());
            }
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        let edge = CanonicalEdge {
            id: short_id("cedge"),
            session_id: session_id.clone(),
            source_slot_id: source_slot_id.to_string(),
            target_slot_id: target_slot_id.to_string(),
            edge_type: edge_type.to_string(),
            support_count: 1,
            surface_edge_ids: vec![surface_edge_id.to_string()],
            updated_at: Utc::now(),
        };
        self.canonical_edges.insert(edge.id.clone(), edge.clone());
        Ok(edge)
    }

    pub fn canonical_edges_for(&self, session_id: &SessionId) -> Vec<CanonicalEdge> {
        self.canonical_edges
            .iter()
            .filter(|e| &e.session_id == session_id)
            .map(|e| e.clone())
            .collect()
    }

    // ==================== SCORING HISTORY ====================

    pub fn record_scoring(&self, trace: ScoringTurn) {
        let key = format!("{}:{}", trace.session_id, trace.turn_number);
        self.scoring.insert(key, trace);
    }

    pub fn scoring_for(&self, session_id: &SessionId, turn_number: u32) -> Result<ScoringTurn> {
        self.scoring
            .get(&format!("{}:{}", session_id, turn_number))
            .map(|s| s.clone())
            .ok_or_else(|| {
                Error::NotFound(format!("scoring for {} turn {}", session_id, turn_number))
            })
    }
}

/// Longest-path depth metrics over the active graph.
///
/// Levels are computed by bounded Bellman-Ford-style relaxation (at most
/// node-count passes), which terminates on cycles while still finding
/// longest chains in acyclic regions. Returns the metrics and the
/// per-node level map used by coverage depth scores.
fn compute_depth_metrics(
    nodes: &[KGNode],
    edges: &[KGEdge],
) -> (DepthMetrics, HashMap<String, u32>) {
    if nodes.is_empty() {
        return (DepthMetrics::default(), HashMap::new());
    }

    let mut levels: HashMap<String, u32> = nodes.iter().map(|n| (n.id.clone(), 0)).collect();
    let mut parents: HashMap<String, String> = HashMap::new();

    for _ in 0..nodes.len() {
        let mut changed = false;
        for edge in edges {
            let (Some(&src_level), Some(&dst_level)) = (
                levels.get(&edge.source_node_id),
                levels.get(&edge.target_node_id),
            ) else {
                continue;
            };
            if src_level + 1 > dst_level {
                levels.insert(edge.target_node_id.clone(), src_level + 1);
                parents.insert(edge.target_node_id.clone(), edge.source_node_id.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let max_depth = levels.values().copied().max().unwrap_or(0);
    let avg_depth = levels.values().map(|&l| l as f64).sum::<f64>() / levels.len() as f64;

    let labels: HashMap<&str, &str> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.label.as_str()))
        .collect();
    let mut deepest_path = Vec::new();
    if let Some((deepest, _)) = levels.iter().max_by_key(|(_, &l)| l) {
        let mut cursor = deepest.clone();
        let mut hops = 0usize;
        loop {
            deepest_path.push(labels.get(cursor.as_str()).unwrap_or(&"?").to_string());
            hops += 1;
            match parents.get(&cursor) {
                // Parent chains are bounded by node count; the guard
                // covers relaxation artifacts on cyclic graphs.
                Some(parent) if hops <= nodes.len() => cursor = parent.clone(),
                _ => break,
            }
        }
        deepest_path.reverse();
    }

    (
        DepthMetrics {
            max_depth,
            avg_depth,
            deepest_path,
        },
        levels,
    )
}

//! Canonical graph state computation.

use crate::model::{CanonicalEdge, CanonicalGraphState, CanonicalSlot};
use crate::store::MemoryStore;
use elicit_core::SessionId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, warn};

const SLOW_COMPUTE_MS: u128 = 100;

/// Aggregate canonical metrics for a session. Empty graphs yield zeros;
/// candidate slots never count as concepts or orphans.
pub fn compute_canonical_state(store: &MemoryStore, session_id: &SessionId) -> CanonicalGraphState {
    let started = Instant::now();

    let active_slots = store.active_slots(session_id);
    let canonical_edges = store.canonical_edges_for(session_id);

    let concept_count = active_slots.len();
    let edge_count = canonical_edges.len();

    let slot_ids: HashSet<&str> = active_slots.iter().map(|s| s.id.as_str()).collect();
    let mut touched: HashSet<&str> = HashSet::new();
    for edge in &canonical_edges {
        touched.insert(edge.source_slot_id.as_str());
        touched.insert(edge.target_slot_id.as_str());
    }
    let orphan_count = slot_ids.iter().filter(|id| !touched.contains(*id)).count();

    let max_depth = compute_max_depth(&active_slots, &canonical_edges);

    let avg_support = if concept_count > 0 {
        active_slots.iter().map(|s| s.support_count as f64).sum::<f64>() / concept_count as f64
    } else {
        0.0
    };

    let elapsed = started.elapsed().as_millis();
    if elapsed > SLOW_COMPUTE_MS {
        warn!(
            session = %session_id,
            elapsed_ms = elapsed,
            "canonical state computation slow"
        );
    }
    debug!(
        session = %session_id,
        concept_count,
        edge_count,
        orphan_count,
        max_depth,
        "canonical state computed"
    );

    CanonicalGraphState {
        concept_count,
        edge_count,
        orphan_count,
        max_depth,
        avg_support,
    }
}

/// Longest path length via BFS from each root (no incoming edges).
/// A visited set per root guards against cycles; a wholly cyclic graph
/// falls back to treating every slot as a root.
fn compute_max_depth(slots: &[CanonicalSlot], edges: &[CanonicalEdge]) -> u32 {
    if edges.is_empty() {
        return 0;
    }

    let slot_ids: HashSet<&str> = slots.iter().map(|s| s.id.as_str()).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_incoming: HashSet<&str> = HashSet::new();

    for edge in edges {
        if slot_ids.contains(edge.source_slot_id.as_str()) {
            adjacency
                .entry(edge.source_slot_id.as_str())
                .or_default()
                .push(edge.target_slot_id.as_str());
        }
        has_incoming.insert(edge.target_slot_id.as_str());
    }

    let mut roots: Vec<&str> = slot_ids
        .iter()
        .filter(|id| !has_incoming.contains(*id))
        .copied()
        .collect();
    if roots.is_empty() {
        roots = slot_ids.iter().copied().collect();
    }

    roots
        .into_iter()
        .map(|root| bfs_depth(&adjacency, root))
        .max()
        .unwrap_or(0)
}

fn bfs_depth(adjacency: &HashMap<&str, Vec<&str>>, start: &str) -> u32 {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&str, u32)> = VecDeque::from([(start, 0)]);
    let mut max_depth = 0;

    while let Some((node, depth)) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        max_depth = max_depth.max(depth);
        for next in adjacency.get(node).into_iter().flatten() {
            if !visited.contains(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }

    max_depth
}

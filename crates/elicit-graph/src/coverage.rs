//! Coverage matching: which stimulus elements has the interview touched.
//!
//! An element counts as covered when any active node label contains its
//! label or one of its aliases as a whole word, case-insensitively.

use crate::model::{CoverageState, ElementCoverage, KGNode};
use elicit_core::ConceptElement;
use regex::Regex;
use std::collections::HashMap;

fn whole_word_pattern(term: &str) -> Option<Regex> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(trimmed))).ok()
}

pub fn compute_coverage(
    elements: &[ConceptElement],
    active_nodes: &[KGNode],
    node_levels: &HashMap<String, u32>,
    depth_target: f64,
) -> CoverageState {
    let mut state = CoverageState::default();

    for element in elements {
        let patterns: Vec<Regex> = element.terms().filter_map(whole_word_pattern).collect();

        let matching: Vec<&KGNode> = active_nodes
            .iter()
            .filter(|node| patterns.iter().any(|p| p.is_match(&node.label)))
            .collect();

        let covered = !matching.is_empty();
        // Chain length through the element: deepest matching node's
        // root distance, counted in nodes.
        let chain_length = matching
            .iter()
            .map(|node| node_levels.get(&node.id).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        let depth_score = if covered && depth_target > 0.0 {
            (chain_length as f64 / depth_target).min(1.0)
        } else {
            0.0
        };

        state.elements.insert(
            element.id.clone(),
            ElementCoverage {
                element_id: element.id.clone(),
                label: element.label.clone(),
                covered,
                depth_score,
                shallow: covered && depth_score < 0.5,
            },
        );
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use elicit_core::SessionId;

    fn node(label: &str) -> KGNode {
        KGNode {
            id: format!("node_{}", label.replace(' ', "_")),
            session_id: SessionId::new("s1"),
            label: label.to_string(),
            node_type: "attribute".to_string(),
            confidence: 0.9,
            properties: serde_json::Map::new(),
            source_utterance_ids: vec![],
            recorded_at: Utc::now(),
            seq: 0,
            superseded_by: None,
        }
    }

    fn element(id: &str, label: &str, aliases: &[&str]) -> ConceptElement {
        ConceptElement {
            id: id.to_string(),
            label: label.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn whole_word_matching_is_case_insensitive() {
        let elements = vec![element("texture", "texture", &["creaminess"])];
        let nodes = vec![node("Creamy TEXTURE of the foam")];
        let levels = HashMap::from([(nodes[0].id.clone(), 0)]);

        let coverage = compute_coverage(&elements, &nodes, &levels, 3.0);
        assert!(coverage.elements["texture"].covered);
    }

    #[test]
    fn substring_inside_word_does_not_cover() {
        let elements = vec![element("art", "art", &[])];
        let nodes = vec![node("heart health")];
        let levels = HashMap::from([(nodes[0].id.clone(), 0)]);

        let coverage = compute_coverage(&elements, &nodes, &levels, 3.0);
        assert!(!coverage.elements["art"].covered);
    }

    #[test]
    fn shallow_flag_tracks_depth_score() {
        let elements = vec![element("texture", "texture", &[])];
        let nodes = vec![node("creamy texture")];
        // Level 0 -> chain length 1 of target 3 -> depth 0.33 -> shallow.
        let levels = HashMap::from([(nodes[0].id.clone(), 0)]);

        let coverage = compute_coverage(&elements, &nodes, &levels, 3.0);
        let texture = &coverage.elements["texture"];
        assert!(texture.covered);
        assert!(texture.shallow);
        assert!(texture.depth_score < 0.5);
    }
}

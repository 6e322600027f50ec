//! Cluster-level graph metrics for Tier-2 scorers.
//!
//! Clusters are connected components over the active graph (edges taken
//! as undirected), computed once per turn when the scoring context is
//! built.

use elicit_graph::{KGEdge, KGNode};
use std::collections::HashMap;

/// Connected-component assignment over active nodes.
pub struct Clusters {
    component_of: HashMap<String, usize>,
    /// Per component: (node count, internal edge count).
    components: Vec<(usize, usize)>,
}

impl Clusters {
    pub fn build(nodes: &[KGNode], edges: &[KGEdge]) -> Self {
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut parent: Vec<usize> = (0..ids.len()).collect();
        fn find(parent: &mut Vec<usize>, i: usize) -> usize {
            if parent[i] != i {
                let root = find(parent, parent[i]);
                parent[i] = root;
            }
            parent[i]
        }

        for edge in edges {
            let (Some(&a), Some(&b)) = (
                index.get(edge.source_node_id.as_str()),
                index.get(edge.target_node_id.as_str()),
            ) else {
                continue;
            };
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra] = rb;
            }
        }

        let mut root_to_component: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<(usize, usize)> = Vec::new();
        let mut component_of: HashMap<String, usize> = HashMap::new();
        for (i, id) in ids.iter().enumerate() {
            let root = find(&mut parent, i);
            let next = components.len();
            let component = *root_to_component.entry(root).or_insert(next);
            if component == components.len() {
                components.push((0, 0));
            }
            components[component].0 += 1;
            component_of.insert((*id).to_string(), component);
        }
        for edge in edges {
            if let Some(component) = component_of.get(&edge.source_node_id) {
                if component_of.get(&edge.target_node_id) == Some(component) {
                    components[*component].1 += 1;
                }
            }
        }

        Self {
            component_of,
            components,
        }
    }

    pub fn component_of(&self, node_id: &str) -> Option<usize> {
        self.component_of.get(node_id).copied()
    }

    /// Density 2E/(V(V-1)) of a component; 0 for singletons.
    pub fn density(&self, component: usize) -> f64 {
        let Some(&(v, e)) = self.components.get(component) else {
            return 0.0;
        };
        if v <= 1 {
            return 0.0;
        }
        (2 * e) as f64 / (v * (v - 1)) as f64
    }

    pub fn size(&self, component: usize) -> usize {
        self.components.get(component).map(|c| c.0).unwrap_or(0)
    }

    /// Density of the component containing `node_id`.
    pub fn local_density(&self, node_id: &str) -> f64 {
        self.component_of(node_id)
            .map(|c| self.density(c))
            .unwrap_or(0.0)
    }

    /// Largest component other than the focus node's own: the readiest
    /// peripheral cluster for a bridge move. Returns (size, density).
    pub fn peripheral_cluster(&self, focus_node_id: Option<&str>) -> (usize, f64) {
        let own = focus_node_id.and_then(|id| self.component_of(id));
        self.components
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != own)
            .max_by_key(|(_, (v, _))| *v)
            .map(|(i, (v, _))| (*v, self.density(i)))
            .unwrap_or((0, 0.0))
    }
}

/// Whether any recent node carries the opposite stance to the focus
/// node. Neutral stances (0) have no opposite.
pub fn has_opposite_stance(focus_node_id: Option<&str>, nodes: &[KGNode]) -> bool {
    let Some(focus_id) = focus_node_id else {
        return false;
    };
    let Some(focus_stance) = nodes.iter().find(|n| n.id == focus_id).map(|n| n.stance()) else {
        return false;
    };
    if focus_stance == 0.0 {
        return false;
    }
    nodes
        .iter()
        .any(|n| n.id != focus_id && n.stance() * focus_stance < 0.0)
}

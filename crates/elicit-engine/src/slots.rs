//! Canonical slot discovery - abstracts respondent language variation
//! so "silky", "smooth" and "creamy" collapse into one stable slot.
//!
//! One batched LLM call per turn proposes slot groupings per node type;
//! proposals are lemma-normalized, matched against existing slots by
//! exact name then embedding similarity, and merged or created as
//! candidates. Candidates promote to active at the configured support.

use elicit_core::{Error, InterviewConfig, Result, SessionId};
use elicit_graph::{CanonicalSlot, EmbeddingService, KGEdge, KGNode, MemoryStore, SlotStatus};
use elicit_llm::{LlmClient, LlmRequest};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Max surface nodes per discovery call; the remainder waits for
/// subsequent turns.
pub const MAX_SLOT_DISCOVERY_BATCH_SIZE: usize = 8;

const SLOT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct SlotProposal {
    slot_name: String,
    description: String,
    surface_node_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TypeProposals {
    proposed_slots: Vec<SlotProposal>,
}

#[derive(Debug, Deserialize)]
struct BatchedProposals {
    groupings: BTreeMap<String, TypeProposals>,
}

pub struct CanonicalSlotService {
    llm: Arc<dyn LlmClient>,
    store: Arc<MemoryStore>,
    embeddings: Arc<EmbeddingService>,
    similarity_threshold: f64,
    min_support: u32,
}

impl CanonicalSlotService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        store: Arc<MemoryStore>,
        embeddings: Arc<EmbeddingService>,
        config: &InterviewConfig,
    ) -> Self {
        Self {
            llm,
            store,
            embeddings,
            similarity_threshold: config.canonical_similarity_threshold,
            min_support: config.canonical_min_support_nodes,
        }
    }

    /// Run slot discovery for this turn's fresh surface nodes. Returns
    /// the discovered or matched slots. Errors here are fatal for slot
    /// discovery only - the surface graph is already persisted and the
    /// caller continues the turn with whatever canonical state exists.
    pub async fn discover_slots(
        &self,
        session_id: &SessionId,
        surface_nodes: &[KGNode],
        turn_number: u32,
        node_descriptions: &BTreeMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<Vec<CanonicalSlot>> {
        if surface_nodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups: BTreeMap<String, Vec<&KGNode>> = BTreeMap::new();
        for node in surface_nodes {
            if node.node_type.is_empty() {
                return Err(Error::SchemaViolation(format!(
                    "surface node {} has empty node_type",
                    node.id
                )));
            }
            groups.entry(node.node_type.clone()).or_default().push(node);
        }

        let total: usize = groups.values().map(|v| v.len()).sum();
        if total > MAX_SLOT_DISCOVERY_BATCH_SIZE {
            warn!(
                total_nodes = total,
                batch_size = MAX_SLOT_DISCOVERY_BATCH_SIZE,
                session = %session_id,
                turn = turn_number,
                "slot discovery batch limited, remainder deferred to later turns"
            );
            let truncated: Vec<&KGNode> = groups
                .values()
                .flatten()
                .copied()
                .take(MAX_SLOT_DISCOVERY_BATCH_SIZE)
                .collect();
            groups.clear();
            for node in truncated {
                groups.entry(node.node_type.clone()).or_default().push(node);
            }
        }

        let existing_per_type: BTreeMap<String, Vec<String>> = groups
            .keys()
            .map(|node_type| {
                let names = self
                    .store
                    .slots_with_status(session_id, Some(node_type), SlotStatus::Active)
                    .into_iter()
                    .map(|s| s.slot_name)
                    .collect();
                (node_type.clone(), names)
            })
            .collect();

        let proposals =
            self.propose_slots_batched(&groups, node_descriptions, &existing_per_type, cancel)
                .await?;

        let mut all_slots = Vec::new();
        for (node_type, type_proposals) in proposals {
            let Some(nodes) = groups.get(&node_type) else {
                continue;
            };
            let valid_ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            for proposal in type_proposals {
                // Hallucination guard: ignore ids outside this turn's
                // node set for the type.
                let surface_ids: Vec<String> = proposal
                    .surface_node_ids
                    .iter()
                    .filter(|id| valid_ids.contains(&id.as_str()))
                    .cloned()
                    .collect();
                if surface_ids.is_empty() {
                    continue;
                }
                let slot = self
                    .find_or_create_slot(
                        session_id,
                        &node_type,
                        &proposal.slot_name,
                        &proposal.description,
                        &surface_ids,
                        turn_number,
                    )
                    .await?;
                all_slots.push(slot);
            }
        }

        info!(
            session = %session_id,
            turn = turn_number,
            total_slots = all_slots.len(),
            "slots discovered"
        );
        Ok(all_slots)
    }

    /// Aggregate this turn's new surface edges into canonical edges.
    /// Edges whose endpoints lack mappings are skipped for now.
    pub fn aggregate_edges(&self, session_id: &SessionId, surface_edges: &[KGEdge]) -> Result<usize> {
        let mut aggregated = 0;
        for edge in surface_edges {
            let (Some(src), Some(dst)) = (
                self.store.mapping_for(&edge.source_node_id),
                self.store.mapping_for(&edge.target_node_id),
            ) else {
                debug!(edge = %edge.id, "skipping canonical aggregation, unmapped endpoint");
                continue;
            };
            self.store.add_or_update_canonical_edge(
                session_id,
                &src.canonical_slot_id,
                &dst.canonical_slot_id,
                &edge.edge_type,
                &edge.id,
            )?;
            aggregated += 1;
        }
        Ok(aggregated)
    }

    async fn propose_slots_batched(
        &self,
        groups: &BTreeMap<String, Vec<&KGNode>>,
        node_descriptions: &BTreeMap<String, String>,
        existing_per_type: &BTreeMap<String, Vec<String>>,
        cancel: CancellationToken,
    ) -> Result<BTreeMap<String, Vec<SlotProposal>>> {
        let mut concepts_section = String::new();
        for (node_type, nodes) in groups {
            let desc = node_descriptions
                .get(node_type)
                .map(|d| d.as_str())
                .unwrap_or(node_type);
            concepts_section.push_str(&format!("\n### {} ({}):\n", node_type, desc));
            for node in nodes {
                concepts_section.push_str(&format!("- {}: {}\n", node.id, node.label));
            }
        }

        let existing_lines: Vec<String> = existing_per_type
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(node_type, names)| format!("### {}: {}", node_type, names.join(", ")))
            .collect();
        let existing_section = if existing_lines.is_empty() {
            String::new()
        } else {
            format!(
                "\n## Existing Canonical Slots (reuse if applicable):\n{}\n",
                existing_lines.join("\n")
            )
        };

        let slot_example = r#"{"slot_name": "example_slot", "description": "Brief description of the concept", "surface_node_ids": ["id1", "id2"]}"#;
        let type_entries: Vec<String> = groups
            .keys()
            .enumerate()
            .map(|(i, node_type)| {
                if i == 0 {
                    format!(
                        "\"{}\": {{\n      \"proposed_slots\": [\n        {}\n      ]\n    }}",
                        node_type, slot_example
                    )
                } else {
                    format!("\"{}\": {{\"proposed_slots\": [...same structure...]}}", node_type)
                }
            })
            .collect();

        let prompt = format!(
            "You are analyzing interview-extracted concepts grouped by type.\n\n\
             ## Concepts by Type:\n{concepts_section}{existing_section}\n\
             ## Task:\n\
             Group each type's concepts into SPECIFIC, GRANULAR canonical slots.\n\n\
             Rules:\n\
             - Create specific, focused categories (NOT broad)\n\
             - Use snake_case for slot names (2-3 words)\n\
             - Each surface node assigned to exactly one slot within its type\n\
             - Reuse existing slots when a surface node matches them\n\n\
             Respond with ONLY valid JSON:\n\
             {{\n  \"groupings\": {{\n    {}\n  }}\n}}",
            type_entries.join(",\n    ")
        );

        let request = LlmRequest::new(prompt)
            .with_system(
                "You are a qualitative research analyst grouping interview concepts \
                 into canonical categories. Respond with valid JSON only.",
            )
            .with_temperature(0.3)
            .with_max_tokens(2000)
            .with_timeout(SLOT_DISCOVERY_TIMEOUT);

        let response = self
            .llm
            .complete(request, Some(cancel))
            .await
            .map_err(|e| match e {
                elicit_llm::LlmError::Cancelled => Error::Cancelled,
                other => Error::llm_failure("slot_discovery", other.to_string()),
            })?;

        parse_batched_proposals(&response.content)
    }

    /// Exact lemmatized match, then embedding similarity over active and
    /// candidate slots, then a fresh candidate. Returns the slot after
    /// mapping and any promotion.
    async fn find_or_create_slot(
        &self,
        session_id: &SessionId,
        node_type: &str,
        proposed_name: &str,
        description: &str,
        surface_node_ids: &[String],
        turn_number: u32,
    ) -> Result<CanonicalSlot> {
        let lemmatized = self.lemmatize_name(proposed_name);

        if let Some(slot) = self
            .store
            .find_slot_by_name_and_type(session_id, &lemmatized, node_type)
        {
            for node_id in surface_node_ids {
                self.store
                    .map_surface_to_slot(node_id, &slot.id, 1.0, turn_number)?;
            }
            debug!(
                proposed = proposed_name,
                matched = %slot.slot_name,
                outcome = "exact_match",
                "canonical slot discovery"
            );
            return self.promote_if_eligible(&slot.id, turn_number);
        }

        // Name + description together give a richer semantic signal.
        let embedding = self
            .embeddings
            .encode(&format!("{} :: {}", lemmatized, description));

        let mut matches = self.store.find_similar_slots(
            session_id,
            node_type,
            &embedding,
            self.similarity_threshold,
            SlotStatus::Active,
        );
        matches.extend(self.store.find_similar_slots(
            session_id,
            node_type,
            &embedding,
            self.similarity_threshold,
            SlotStatus::Candidate,
        ));
        matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let slot_id = if let Some((best_slot, best_similarity)) = matches.first() {
            for node_id in surface_node_ids {
                self.store
                    .map_surface_to_slot(node_id, &best_slot.id, *best_similarity, turn_number)?;
            }
            debug!(
                proposed = proposed_name,
                matched = %best_slot.slot_name,
                similarity = format!("{:.4}", best_similarity),
                outcome = "merged",
                "canonical slot discovery"
            );
            best_slot.id.clone()
        } else {
            let slot = self.store.create_slot(
                session_id,
                &lemmatized,
                description,
                node_type,
                turn_number,
                Some(embedding),
            )?;
            for node_id in surface_node_ids {
                self.store
                    .map_surface_to_slot(node_id, &slot.id, 1.0, turn_number)?;
            }
            debug!(
                proposed = proposed_name,
                slot = %slot.slot_name,
                outcome = "new_candidate",
                "canonical slot discovery"
            );
            slot.id
        };

        self.promote_if_eligible(&slot_id, turn_number)
    }

    /// Re-read the slot for its updated support count and promote when
    /// it crosses the threshold.
    fn promote_if_eligible(&self, slot_id: &str, turn_number: u32) -> Result<CanonicalSlot> {
        let slot = self.store.get_slot(slot_id)?;
        if slot.status == SlotStatus::Candidate && slot.support_count >= self.min_support {
            self.store.promote_slot(slot_id, turn_number)?;
            info!(
                slot = %slot.slot_name,
                support_count = slot.support_count,
                "slot promoted"
            );
            return self.store.get_slot(slot_id);
        }
        Ok(slot)
    }

    /// Lemmatize per underscore-separated word: standalone words dodge
    /// the POS shifts that context-sensitive lemmatizers introduce.
    fn lemmatize_name(&self, name: &str) -> String {
        name.split('_')
            .map(|word| self.embeddings.lemmatize(word))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Parse the batched proposal JSON. Any structural deviation is a hard
/// parse error for the slot-discovery step.
fn parse_batched_proposals(raw: &str) -> Result<BTreeMap<String, Vec<SlotProposal>>> {
    let text = crate::extraction::strip_code_fences(raw);
    let parsed: BatchedProposals = serde_json::from_str(text).map_err(|e| {
        Error::llm_failure(
            "slot_discovery",
            format!(
                "invalid JSON from batched slot discovery: {} (response: {})",
                e,
                &raw.chars().take(500).collect::<String>()
            ),
        )
    })?;
    Ok(parsed
        .groupings
        .into_iter()
        .map(|(node_type, p)| (node_type, p.proposed_slots))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_missing_groupings() {
        assert!(parse_batched_proposals(r#"{"slots": []}"#).is_err());
    }

    #[test]
    fn parse_accepts_fenced_groupings() {
        let raw = "```json\n{\"groupings\": {\"attribute\": {\"proposed_slots\": \
                   [{\"slot_name\": \"creamy_texture\", \"description\": \"d\", \
                   \"surface_node_ids\": [\"n1\"]}]}}}\n```";
        let parsed = parse_batched_proposals(raw).unwrap();
        assert_eq!(parsed["attribute"].len(), 1);
        assert_eq!(parsed["attribute"][0].slot_name, "creamy_texture");
    }
}

//! Session lifecycle and the per-turn pipeline.
//!
//! One turn: persist the user utterance, extract and materialize the
//! typed subgraph, run canonical slot discovery, recompute both graph
//! states, extract qualitative signals, select a strategy, generate the
//! next question, persist it. Concurrent turns on one session serialize
//! behind a per-session mutex; different sessions run in parallel.
//!
//! Aborted-turn policy: a turn cancelled after the user utterance was
//! persisted is treated as complete with empty extraction. The next
//! turn starts fresh; idempotent edge creation keeps any retried
//! extraction safe.

use crate::extraction::ExtractionService;
use crate::question::{FollowUpInputs, QuestionService};
use crate::signals::SignalExtractor;
use crate::slots::CanonicalSlotService;
use crate::strategy::{SelectionResult, StrategyService};
use chrono::Utc;
use dashmap::DashMap;
use elicit_core::{
    ConceptRegistry, Error, InterviewConfig, InterviewMode, MethodologyRegistry, Result, Session,
    SessionId, SessionStatus, SignalSet, Speaker, StrategyKind, Utterance,
};
use elicit_graph::{
    compute_canonical_state, GraphState, KGEdge, KGNode, MemoryStore, SaturationMetrics,
    ScoringCandidateRow, ScoringTurn,
};
use elicit_scoring::tier2::compute_saturation_metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const REVISES_EDGE_TYPE: &str = "revises";
const MAX_USER_TEXT_CHARS: usize = 5000;

/// Cross-turn state the derived GraphState cannot recompute from the
/// store alone.
#[derive(Clone, Debug, Default)]
struct Carryover {
    strategy_history: Vec<StrategyKind>,
    repetition_count: u32,
    saturation: Option<SaturationMetrics>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoringSummary {
    pub candidate_count: usize,
    pub vetoed_count: usize,
    pub winner_score: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AlternativeSummary {
    pub strategy: StrategyKind,
    pub focus_description: String,
    pub score: f64,
}

/// Everything one processed turn produced.
#[derive(Clone, Debug, Serialize)]
pub struct TurnResult {
    pub session_id: SessionId,
    pub turn_number: u32,
    pub nodes: Vec<KGNode>,
    pub edges: Vec<KGEdge>,
    pub graph_state: GraphState,
    pub scoring: ScoringSummary,
    pub selected_strategy: StrategyKind,
    pub question: String,
    pub should_continue: bool,
    pub latency_ms: u64,
    pub signals: SignalSet,
    pub alternatives: Vec<AlternativeSummary>,
}

pub struct SessionService {
    store: Arc<MemoryStore>,
    methodologies: Arc<MethodologyRegistry>,
    concepts: Arc<ConceptRegistry>,
    extraction: ExtractionService,
    slots: CanonicalSlotService,
    signals: SignalExtractor,
    strategy: StrategyService,
    question: QuestionService,
    config: InterviewConfig,
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
    carryover: DashMap<SessionId, Carryover>,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<MemoryStore>,
        methodologies: Arc<MethodologyRegistry>,
        concepts: Arc<ConceptRegistry>,
        extraction: ExtractionService,
        slots: CanonicalSlotService,
        signals: SignalExtractor,
        strategy: StrategyService,
        question: QuestionService,
        config: InterviewConfig,
    ) -> Self {
        Self {
            store,
            methodologies,
            concepts,
            extraction,
            slots,
            signals,
            strategy,
            question,
            config,
            locks: DashMap::new(),
            carryover: DashMap::new(),
        }
    }

    fn session_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ==================== LIFECYCLE ====================

    pub fn create_session(
        &self,
        methodology: &str,
        concept_id: &str,
        mode: InterviewMode,
        max_turns: Option<u32>,
        config: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Session> {
        self.methodologies
            .get(methodology)
            .map_err(|_| Error::invalid_input(format!("unknown methodology '{}'", methodology)))?;
        self.concepts
            .get(concept_id)
            .map_err(|_| Error::invalid_input(format!("unknown concept '{}'", concept_id)))?;

        let now = Utc::now();
        let session = Session {
            id: SessionId::generate(),
            methodology: methodology.to_string(),
            concept_id: concept_id.to_string(),
            mode,
            status: SessionStatus::Active,
            turn_count: 0,
            max_turns: max_turns.unwrap_or(self.config.max_turns),
            config,
            created_at: now,
            updated_at: now,
        };
        let session = self.store.create_session(session)?;
        info!(session = %session.id, methodology, concept_id, "session created");
        Ok(session)
    }

    /// Generate and persist the opening question (turn 1, system).
    pub async fn start_session(
        &self,
        id: &SessionId,
        cancel: CancellationToken,
    ) -> Result<String> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let session = self.store.get_session(id)?;
        if !session.is_active() {
            return Err(Error::SessionCompleted(id.to_string()));
        }
        if !self.store.utterances_for(id).is_empty() {
            return Err(Error::invalid_input(format!("session {} already started", id)));
        }

        let methodology = self.methodologies.get(&session.methodology)?;
        let concept = self.concepts.get(&session.concept_id)?;
        let objective = if concept.objective.is_empty() {
            format!("Understand how people experience and value {}", concept.name)
        } else {
            concept.objective.clone()
        };

        let question = self
            .question
            .generate_opening_question(&objective, &methodology, cancel)
            .await?;

        self.store
            .add_utterance(id, 1, Speaker::System, &question)?;
        info!(session = %id, "session started");
        Ok(question)
    }

    /// Process one user turn end-to-end. See the module docs for the
    /// stage order and the aborted-turn policy.
    pub async fn process_turn(
        &self,
        id: &SessionId,
        user_text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnResult> {
        let trimmed = user_text.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_USER_TEXT_CHARS {
            return Err(Error::invalid_input(format!(
                "user text must be 1..{} characters",
                MAX_USER_TEXT_CHARS
            )));
        }

        let started = Instant::now();
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let mut session = self.store.get_session(id)?;
        if !session.is_active() {
            return Err(Error::SessionCompleted(id.to_string()));
        }

        session.turn_count += 1;
        session.updated_at = Utc::now();
        self.store.put_session(session.clone())?;

        let methodology = self.methodologies.get(&session.methodology)?;
        let concept = self.concepts.get(&session.concept_id)?;

        let interviewer_context = self
            .store
            .utterances_for(id)
            .iter()
            .rev()
            .find(|u| u.is_system())
            .map(|u| u.text.clone());

        let user_turn_number = self.store.next_turn_number(id);
        let user_utterance = self
            .store
            .add_utterance(id, user_turn_number, Speaker::User, trimmed)?;

        // Stage: extraction + materialization.
        let extraction = self
            .extraction
            .extract(
                trimmed,
                interviewer_context.as_deref(),
                &session.methodology,
                cancel.clone(),
            )
            .await?;

        let mut turn_nodes: Vec<KGNode> = Vec::new();
        for concept_ext in &extraction.concepts {
            let node = match self.store.find_node_by_label_and_type(
                id,
                &concept_ext.text,
                &concept_ext.node_type,
            ) {
                Some(existing) => {
                    self.store
                        .append_node_source(&existing.id, &user_utterance.id)?;
                    self.store.get_node(&existing.id)?
                }
                None => self.store.create_node(
                    &methodology,
                    id,
                    &concept_ext.text,
                    &concept_ext.node_type,
                    concept_ext.confidence,
                    serde_json::Map::new(),
                    vec![user_utterance.id.clone()],
                )?,
            };
            if !turn_nodes.iter().any(|n| n.id == node.id) {
                turn_nodes.push(node);
            }
        }

        let mut turn_edges: Vec<KGEdge> = Vec::new();
        for relation in &extraction.relationships {
            let source = turn_nodes
                .iter()
                .find(|n| n.label.eq_ignore_ascii_case(&relation.source_text));
            let target = turn_nodes
                .iter()
                .find(|n| n.label.eq_ignore_ascii_case(&relation.target_text));
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            let edge = match self.store.create_edge(
                &methodology,
                id,
                &source.id,
                &target.id,
                &relation.relationship_type,
                relation.confidence,
                serde_json::Map::new(),
                vec![user_utterance.id.clone()],
            ) {
                Ok(edge) => edge,
                // A relation can reference a node superseded earlier in
                // this same loop; drop it rather than failing the turn.
                Err(e) => {
                    warn!(session = %id, error = %e, "dropping unmaterializable relation");
                    continue;
                }
            };
            if !turn_edges.iter().any(|e| e.id == edge.id) {
                turn_edges.push(edge);
            }
            // A revises B: the source carries the new belief and
            // supersedes the target.
            if relation.relationship_type == REVISES_EDGE_TYPE {
                self.store.supersede_node(&target.id, &source.id)?;
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Stage: canonical slot discovery. Failures here must not
        // poison the surface graph - the turn continues.
        match self
            .slots
            .discover_slots(
                id,
                &turn_nodes,
                session.turn_count,
                &methodology.node_descriptions(),
                cancel.clone(),
            )
            .await
        {
            Ok(_) => {
                self.slots.aggregate_edges(id, &turn_edges)?;
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(session = %id, error = %e, "slot discovery failed, continuing turn");
            }
        }

        // Stage: state recomputation.
        let mut graph_state = self.recompute_graph_state(&session, &concept.elements, turn_nodes.len());
        graph_state.canonical = Some(compute_canonical_state(&self.store, id));

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Stage: qualitative signals. Degrades to an empty set on
        // failure; never blocks the turn.
        let history = self.store.utterances_for(id);
        let signal_set = self
            .signals
            .extract(&history, session.turn_count, cancel.clone())
            .await;
        graph_state.signals = Some(signal_set.clone());

        // Stage: strategy selection. Scorer failures are fatal. At the
        // turn cap the selector forces closing, so the final question
        // is generated under the closing strategy.
        let recent_nodes = self.store.recent_nodes(id, 10);
        let active_nodes = self.store.active_nodes(id);
        let active_edges = self.store.active_edges(id);
        let selection = self.strategy.select(
            &mut graph_state,
            &recent_nodes,
            &active_nodes,
            &active_edges,
            &history,
            session.max_turns,
        )?;

        self.persist_scoring_trace(id, session.turn_count, &selection);
        self.save_carryover(id, &graph_state);

        let should_continue = selection.strategy.kind != StrategyKind::Closing
            && session.turn_count < session.max_turns;

        // Stage: question generation. Failure fails the turn; no
        // system utterance is persisted.
        let question = self
            .question
            .generate_question(
                FollowUpInputs {
                    focus_description: selection.focus.description(),
                    strategy: &selection.strategy,
                    topic: Some(&concept.name),
                    recent_utterances: &history,
                    graph_state: &graph_state,
                    recent_nodes: &recent_nodes,
                    signals: &signal_set,
                    methodology: &methodology,
                },
                cancel,
            )
            .await?;

        let question_turn_number = self.store.next_turn_number(id);
        self.store
            .add_utterance(id, question_turn_number, Speaker::System, &question)?;

        if !should_continue {
            let mut session = self.store.get_session(id)?;
            session.status = SessionStatus::Closed;
            session.updated_at = Utc::now();
            self.store.put_session(session)?;
            info!(session = %id, "session closed");
        }

        let vetoed_count = selection
            .all_results
            .iter()
            .filter(|r| r.is_vetoed())
            .count();
        let result = TurnResult {
            session_id: id.clone(),
            turn_number: session.turn_count,
            nodes: turn_nodes,
            edges: turn_edges,
            scoring: ScoringSummary {
                candidate_count: selection.all_results.len(),
                vetoed_count,
                winner_score: selection.final_score,
            },
            selected_strategy: selection.strategy.kind,
            question,
            should_continue,
            latency_ms: started.elapsed().as_millis() as u64,
            signals: signal_set,
            alternatives: selection
                .alternatives
                .iter()
                .map(|r| AlternativeSummary {
                    strategy: r.strategy,
                    focus_description: r.focus.description().to_string(),
                    score: r.final_score,
                })
                .collect(),
            graph_state,
        };

        info!(
            session = %id,
            turn = result.turn_number,
            strategy = %result.selected_strategy,
            nodes = result.nodes.len(),
            edges = result.edges.len(),
            latency_ms = result.latency_ms,
            "turn complete"
        );
        Ok(result)
    }

    // ==================== QUERIES ====================

    pub fn get_session(&self, id: &SessionId) -> Result<Session> {
        self.store.get_session(id)
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        self.store.list_sessions()
    }

    pub fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.store.delete_session(id)?;
        self.locks.remove(id);
        self.carryover.remove(id);
        Ok(())
    }

    pub fn session_graph(&self, id: &SessionId) -> Result<(Vec<KGNode>, Vec<KGEdge>)> {
        self.store.get_session(id)?;
        Ok((self.store.active_nodes(id), self.store.active_edges(id)))
    }

    pub fn scoring_for_turn(&self, id: &SessionId, turn_number: u32) -> Result<ScoringTurn> {
        self.store.get_session(id)?;
        self.store.scoring_for(id, turn_number)
    }

    pub fn utterances(&self, id: &SessionId) -> Result<Vec<Utterance>> {
        self.store.get_session(id)?;
        Ok(self.store.utterances_for(id))
    }

    // ==================== INTERNALS ====================

    fn recompute_graph_state(
        &self,
        session: &Session,
        elements: &[elicit_core::ConceptElement],
        new_nodes_this_turn: usize,
    ) -> GraphState {
        let mut state = self.store.compute_graph_state(
            &session.id,
            session.mode,
            Some(elements),
            self.config.depth_target,
        );
        state.turn_count = session.turn_count;

        let carryover = self
            .carryover
            .get(&session.id)
            .map(|c| c.clone())
            .unwrap_or_default();
        state.strategy_history = carryover.strategy_history;
        state.repetition_count = carryover.repetition_count;

        let saturation_cfg = self.config.scorer("saturation");
        let chao1_threshold = saturation_cfg
            .and_then(|c| c.param_f64("chao1_threshold"))
            .unwrap_or(0.90);
        let new_info_threshold = saturation_cfg
            .and_then(|c| c.param_f64("new_info_threshold"))
            .unwrap_or(0.05);
        let run_length = saturation_cfg
            .and_then(|c| c.param_u64("run_length"))
            .unwrap_or(2) as u32;

        let recent = self.store.recent_nodes(&session.id, 10);
        state.saturation = Some(compute_saturation_metrics(
            &state,
            &recent,
            new_nodes_this_turn,
            carryover.saturation.as_ref(),
            chao1_threshold,
            new_info_threshold,
            run_length,
        ));
        state
    }

    fn save_carryover(&self, id: &SessionId, graph_state: &GraphState) {
        self.carryover.insert(
            id.clone(),
            Carryover {
                strategy_history: graph_state.strategy_history.clone(),
                repetition_count: graph_state.repetition_count,
                saturation: graph_state.saturation.clone(),
            },
        );
    }

    fn persist_scoring_trace(&self, id: &SessionId, turn_number: u32, selection: &SelectionResult) {
        let winner_key = selection
            .scoring
            .as_ref()
            .map(|s| (s.strategy, s.focus.clone()));
        let candidates: Vec<ScoringCandidateRow> = selection
            .all_results
            .iter()
            .map(|r| ScoringCandidateRow {
                strategy: r.strategy,
                focus: r.focus.clone(),
                final_score: r.final_score,
                base_score: r.base_score,
                vetoed_by: r.vetoed_by.clone(),
                tier1: serde_json::to_value(&r.tier1).unwrap_or_default(),
                tier2: serde_json::to_value(&r.tier2).unwrap_or_default(),
                reasoning_trace: r.reasoning_trace.clone(),
                winner: winner_key
                    .as_ref()
                    .map(|(kind, focus)| r.strategy == *kind && r.focus == *focus)
                    .unwrap_or(false),
            })
            .collect();
        self.store.record_scoring(ScoringTurn {
            session_id: id.clone(),
            turn_number,
            candidates,
        });
    }
}

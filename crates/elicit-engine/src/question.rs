//! Question generation - opening and strategy-driven follow-ups.

use elicit_core::{
    Error, MethodologySchema, Result, SignalSet, Strategy, Utterance,
};
use elicit_graph::{GraphState, KGNode};
use elicit_llm::{LlmClient, LlmRequest};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct QuestionService {
    llm: Arc<dyn LlmClient>,
}

pub struct FollowUpInputs<'a> {
    pub focus_description: &'a str,
    pub strategy: &'a Strategy,
    pub topic: Option<&'a str>,
    pub recent_utterances: &'a [Utterance],
    pub graph_state: &'a GraphState,
    pub recent_nodes: &'a [KGNode],
    pub signals: &'a SignalSet,
    pub methodology: &'a MethodologySchema,
}

impl QuestionService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Opening question for a fresh session. Generation failures fail
    /// the turn - there is no question to fall back to.
    pub async fn generate_opening_question(
        &self,
        objective: &str,
        methodology: &MethodologySchema,
        cancel: CancellationToken,
    ) -> Result<String> {
        let system = opening_system_prompt(methodology);
        let user = format!(
            "You are an experienced qualitative moderator starting an in-depth interview.\n\n\
             **Interview objective (for you):**\n{}\n\n\
             **Methodology (for you):**\n{}: {}\n\n\
             **Method-specific opening guidance:**\n{}\n\n\
             **Your task:**\n\
             - Briefly and naturally frame the topic for the respondent\n\
             - Ask an opening question that fits the methodology\n\
             - Prefer concrete, experience-based responses over abstract opinions\n\
             - Keep it conversational\n\n\
             **Generate only what the moderator would say to the respondent:**",
            objective,
            methodology.method.name,
            methodology.method.goal,
            if methodology.method.opening_bias.is_empty() {
                "Elicit concrete, experience-based responses."
            } else {
                &methodology.method.opening_bias
            },
        );

        let request = LlmRequest::new(user)
            .with_system(system)
            .with_temperature(0.9)
            .with_max_tokens(150);

        let response = self
            .llm
            .complete(request, Some(cancel))
            .await
            .map_err(|e| match e {
                elicit_llm::LlmError::Cancelled => Error::Cancelled,
                other => {
                    error!(error = %other, "opening question generation failed");
                    Error::llm_failure("generation", other.to_string())
                }
            })?;

        let question = format_question(&response.content);
        info!(question_length = question.len(), "opening question generated");
        Ok(question)
    }

    /// Strategy-driven follow-up. Failures fail the turn: no question
    /// means no system utterance gets persisted.
    pub async fn generate_question(
        &self,
        inputs: FollowUpInputs<'_>,
        cancel: CancellationToken,
    ) -> Result<String> {
        let system = follow_up_system_prompt(inputs.strategy, inputs.topic, inputs.methodology);
        let user = follow_up_user_prompt(&inputs);

        let request = LlmRequest::new(user)
            .with_system(system)
            .with_temperature(0.8)
            .with_max_tokens(200);

        let response = self
            .llm
            .complete(request, Some(cancel))
            .await
            .map_err(|e| match e {
                elicit_llm::LlmError::Cancelled => Error::Cancelled,
                other => {
                    error!(error = %other, "question generation failed");
                    Error::llm_failure("generation", other.to_string())
                }
            })?;

        let question = format_question(&response.content);
        info!(
            strategy = %inputs.strategy.kind,
            question_length = question.len(),
            latency_ms = response.latency_ms,
            "question generated"
        );
        Ok(question)
    }
}

fn opening_system_prompt(methodology: &MethodologySchema) -> String {
    let mut prompt = String::new();
    if !methodology.method.name.is_empty() {
        prompt.push_str(&format!(
            "## Methodology Context:\nYou are using the **{}** method",
            methodology.method.name
        ));
        if !methodology.method.goal.is_empty() {
            prompt.push_str(&format!("\nMethod goal: {}", methodology.method.goal));
        }
        prompt.push_str("\n\n");
    }
    prompt.push_str(
        "You are an experienced qualitative moderator starting an in-depth interview.\n\n\
         Your goal is to warmly invite the participant to share their initial thoughts.\n\n\
         ## Guidelines:\n\
         1. Be friendly and put the respondent at ease\n\
         2. Ask about their general thoughts, experiences, or associations\n\
         3. Keep it open-ended - don't assume anything\n\
         4. Use simple, conversational language\n\
         5. One question only\n\n\
         ## Output:\n\
         Generate ONLY the opening question - no explanations, no quotation marks.",
    );
    prompt
}

fn follow_up_system_prompt(
    strategy: &Strategy,
    topic: Option<&str>,
    methodology: &MethodologySchema,
) -> String {
    let mut methodology_section = String::new();
    if !methodology.method.name.is_empty() {
        methodology_section = format!("\n\nMethod: {}", methodology.method.name);
        if !methodology.method.goal.is_empty() {
            methodology_section.push_str(&format!("\nGoal: {}", methodology.method.goal));
        }
    }

    let topic_instruction = topic
        .map(|t| {
            format!(
                "\n## Topic Anchoring:\n\
                 This interview is about **{t}**. While exploring deeper motivations and values,\n\
                 ensure questions remain connected to the respondent's experience with {t}.\n\
                 If the conversation drifts too far into abstract philosophy, gently relate back to {t}.\n"
            )
        })
        .unwrap_or_default();

    format!(
        "You are a skilled qualitative researcher conducting an interview.\n\n\
         Your current strategy is: **{}**\n\
         Strategy: {}{}\n\n\
         ## Question Style Guidelines:\n\
         1. Ask ONE question at a time\n\
         2. **Keep questions UNDER 15 WORDS** when possible\n\
         3. Use simple, everyday language\n\
         4. Be direct - avoid nested clauses and complex phrasing\n\
         5. Use the respondent's own words when referencing what they said\n\
         6. Be warm, curious, and non-judgmental\n\
         7. Avoid leading questions - stay open-ended\n\n\
         ## Examples:\n\
         - BAD: \"Beyond what you mentioned about X, what else might Y be in terms of Z?\"\n\
         - GOOD: \"What else does coffee do for you?\"\n\
         {}\n\
         ## Output:\n\
         Generate ONLY the question - no explanations, no quotation marks, just the question itself.",
        strategy.name, strategy.description, methodology_section, topic_instruction
    )
}

fn follow_up_user_prompt(inputs: &FollowUpInputs<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(topic) = inputs.topic {
        parts.push(format!("Research topic: {}", topic));
        parts.push(String::new());
    }

    if !inputs.recent_utterances.is_empty() {
        let window_start = inputs.recent_utterances.len().saturating_sub(5);
        let lines: Vec<String> = inputs.recent_utterances[window_start..]
            .iter()
            .map(|u| {
                let speaker = if u.is_user() { "Respondent" } else { "Interviewer" };
                format!("{}: {}", speaker, u.text)
            })
            .collect();
        parts.push("Recent conversation:".to_string());
        parts.push(lines.join("\n"));
        parts.push(String::new());
    }

    parts.push(format!(
        "What we know so far: {}",
        graph_summary(inputs.graph_state, inputs.recent_nodes)
    ));
    parts.push(String::new());

    let active = inputs.signals.active_for_prompt();
    if !active.is_empty() {
        let mut lines = vec!["## Active Signals:".to_string()];
        for (name, value, description) in &active {
            lines.push(format!("- {}: {}", name, value));
            if !description.is_empty() {
                lines.push(format!("  → \"{}\"", description));
            }
        }
        lines.push(String::new());
        lines.push("## Why This Strategy Was Selected:".to_string());
        lines.push(strategy_rationale(&active, inputs.strategy));
        parts.push(lines.join("\n"));
        parts.push(String::new());
    }

    parts.push(format!("Focus concept: {}", inputs.focus_description));
    parts.push(format!(
        "Strategy: {} - {}",
        inputs.strategy.name, inputs.strategy.description
    ));

    if let Some(topic) = inputs.topic {
        if inputs.graph_state.depth.max_depth >= 2 {
            parts.push(String::new());
            parts.push(format!(
                "Note: We're deep in the conversation. Keep the question connected to {} - \
                 explore values through the lens of their specific experience, not generic life philosophy.",
                topic
            ));
        }
    }

    parts.push(String::new());
    parts.push("Generate a natural follow-up question:".to_string());
    parts.join("\n")
}

fn strategy_rationale(active: &[(String, String, String)], strategy: &Strategy) -> String {
    let mut lines: Vec<String> = active
        .iter()
        .map(|(name, value, _)| format!("- {} signal reads {}", name, value))
        .collect();
    lines.push(format!("- Strategy: {}", strategy.kind));
    lines.join("\n")
}

/// "depth=developing | explored 5 concepts | recent topics: a, b, c"
fn graph_summary(graph_state: &GraphState, recent_nodes: &[KGNode]) -> String {
    const DEPTH_LABELS: [&str; 5] = ["starting", "surface", "developing", "deep", "very deep"];
    let depth_label = DEPTH_LABELS[(graph_state.depth.max_depth as usize).min(DEPTH_LABELS.len() - 1)];

    let mut parts = vec![format!("Depth: {}", depth_label)];
    if graph_state.node_count > 0 {
        parts.push(format!("Explored {} concepts", graph_state.node_count));
    }
    if !recent_nodes.is_empty() {
        let recent: Vec<&str> = recent_nodes.iter().take(3).map(|n| n.label.as_str()).collect();
        parts.push(format!("Recent topics: {}", recent.join(", ")));
    }
    parts.join(" | ")
}

/// Strip surrounding quotes; ensure terminal punctuation.
pub fn format_question(raw: &str) -> String {
    let mut question = raw.trim().to_string();
    if question.len() >= 2
        && ((question.starts_with('"') && question.ends_with('"'))
            || (question.starts_with('\'') && question.ends_with('\'')))
    {
        question = question[1..question.len() - 1].trim().to_string();
    }
    if !question.is_empty()
        && !question.ends_with('?')
        && !question.ends_with('.')
        && !question.ends_with('!')
    {
        question.push('?');
    }
    question
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_question_strips_quotes_and_adds_punctuation() {
        assert_eq!(format_question("\"Why does that matter\""), "Why does that matter?");
        assert_eq!(format_question("Tell me more."), "Tell me more.");
        assert_eq!(format_question("  What about taste?  "), "What about taste?");
    }
}

//! Prompt construction for analyses and follow-up replies.
//!
//! Every request is self-contained: a follow-up carries the analysis body,
//! the prior turns of the thread and the new instruction, so the endpoint
//! needs no server-side conversation state.

use analysis_console_core::{MessageRole, AnalysisRequest};

use crate::ai_types::{ChatRequest, Message};
use crate::client::{truncate, LlmClient, MAX_SOURCE_DATA_LEN};
use crate::error::LlmError;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a performance analyst for a marketing agency. \
Write a clear, factual analysis of the client data you are given. Use short sections and \
plain language. Do not invent numbers that are not in the data.";

const FOLLOW_UP_SYSTEM_PROMPT: &str = "You are a performance analyst answering follow-up \
questions about an analysis you wrote earlier. Answer using the analysis and the \
conversation so far. Be concise.";

/// One earlier turn of a follow-up thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorTurn {
    pub role: MessageRole,
    pub content: String,
}

/// Everything needed to generate one follow-up reply.
#[derive(Debug, Clone)]
pub struct FollowUpPrompt {
    pub analysis_body: String,
    pub history: Vec<PriorTurn>,
    pub instruction: String,
    pub source_data: Option<serde_json::Value>,
}

fn render_source_data(data: &serde_json::Value) -> Option<String> {
    if data.is_null() {
        return None;
    }
    let rendered = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    Some(truncate(&rendered, MAX_SOURCE_DATA_LEN).to_owned())
}

pub(crate) fn analysis_messages(request: &AnalysisRequest) -> Vec<Message> {
    let mut user = format!("Category: {}\n", request.category);
    if let Some(period) = &request.period_id {
        user.push_str(&format!("Period: {period}\n"));
    }
    if let Some(data) = render_source_data(&request.source_data) {
        user.push_str(&format!("\nData:\n{data}\n"));
    }
    user.push_str(&format!("\nInstruction:\n{}", request.instruction));
    vec![Message::new("system", ANALYSIS_SYSTEM_PROMPT), Message::new("user", user)]
}

pub(crate) fn follow_up_messages(prompt: &FollowUpPrompt) -> Vec<Message> {
    let mut system = format!("{FOLLOW_UP_SYSTEM_PROMPT}\n\nAnalysis:\n{}", prompt.analysis_body);
    if let Some(data) = prompt.source_data.as_ref().and_then(render_source_data) {
        system.push_str(&format!("\n\nSource data:\n{data}"));
    }
    let mut messages = Vec::with_capacity(prompt.history.len().saturating_add(2));
    messages.push(Message::new("system", system));
    messages.extend(prompt.history.iter().map(|t| Message::new(t.role.as_str(), t.content.clone())));
    messages.push(Message::new("user", prompt.instruction.clone()));
    messages
}

fn non_blank(content: String) -> Result<String, LlmError> {
    if content.trim().is_empty() { Err(LlmError::BlankContent) } else { Ok(content) }
}

impl LlmClient {
    /// Generate the body of a new analysis.
    ///
    /// # Errors
    /// Returns an error if the API call fails or returns blank text.
    pub async fn generate_analysis(&self, request: &AnalysisRequest) -> Result<String, LlmError> {
        let chat = ChatRequest {
            model: self.model.clone(),
            messages: analysis_messages(request),
            temperature: Some(0.3),
        };
        let content = self.chat_completion(&chat).await?;
        tracing::debug!(category = %request.category, len = content.len(), "analysis generated");
        non_blank(content)
    }

    /// Generate an assistant reply to a follow-up instruction.
    ///
    /// # Errors
    /// Returns an error if the API call fails or returns blank text.
    pub async fn generate_follow_up(&self, prompt: &FollowUpPrompt) -> Result<String, LlmError> {
        let chat = ChatRequest {
            model: self.model.clone(),
            messages: follow_up_messages(prompt),
            temperature: Some(0.3),
        };
        let content = self.chat_completion(&chat).await?;
        tracing::debug!(turns = prompt.history.len(), len = content.len(), "follow-up generated");
        non_blank(content)
    }
}

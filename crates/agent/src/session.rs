//! Request-scoped state shared by every continuation of one request.

use crate::accumulator::ToolCallAccumulator;
use crate::error::EngineError;
use chrono::Utc;
use std::time::Duration;
use streambot_core::history::ConversationTurn;
use streambot_core::message::Message;
use tokio::time::Instant;
use tracing::error;

/// The single deadline of a request, continuations included.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// The total budget, for error messages.
    pub fn budget_secs(&self) -> u64 {
        self.budget.as_secs()
    }
}

/// Everything one top-level request accumulates.
///
/// Owned by the request task and dropped with it.
#[derive(Debug)]
pub struct RequestSession {
    pub user_id: String,
    /// The prompt that started the request
    pub question: String,
    /// Text shown to the user, across all iterations
    pub answer: String,
    /// Text produced by the current iteration only
    pub iteration_text: String,
    pub token_count: u64,
    /// Whether the current stream has produced a tool call
    pub uses_tools: bool,
    pub calls: ToolCallAccumulator,
    /// Tool-role replies produced in the current iteration, in dispatch order
    pub tool_results: Vec<Message>,
    /// First tool the current iteration could not resolve
    pub unresolved: Option<EngineError>,
    /// Every assistant tool-call message and tool reply of the request
    pub tool_messages: Vec<Message>,
    pub deadline: Deadline,
    /// Streams opened so far
    pub iterations: usize,
    /// Set once the frame receiver has gone away
    pub consumer_gone: bool,
}

impl RequestSession {
    pub fn new(user_id: impl Into<String>, question: impl Into<String>, deadline: Deadline) -> Self {
        Self {
            user_id: user_id.into(),
            question: question.into(),
            answer: String::new(),
            iteration_text: String::new(),
            token_count: 0,
            uses_tools: false,
            calls: ToolCallAccumulator::new(),
            tool_results: Vec::new(),
            unresolved: None,
            tool_messages: Vec::new(),
            deadline,
            iterations: 0,
            consumer_gone: false,
        }
    }

    /// Record a text fragment that reached the user.
    pub fn push_text(&mut self, fragment: &str) {
        self.answer.push_str(fragment);
        self.iteration_text.push_str(fragment);
    }

    /// Whether the stream that just ended calls for another round.
    pub fn should_continue(&self) -> bool {
        self.uses_tools && !self.tool_results.is_empty()
    }

    /// Close the current iteration: build the assistant tool-call message,
    /// follow it with the tool replies, add both to the audit trail and
    /// reset per-iteration state. Returns the messages to append to the
    /// conversation sent to the provider.
    pub fn commit_iteration(&mut self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.tool_results.len() + 1);
        messages.push(Message::assistant_with_tools(
            std::mem::take(&mut self.iteration_text),
            self.calls.answered_calls(),
        ));
        messages.append(&mut self.tool_results);

        self.tool_messages.extend(messages.iter().cloned());
        self.calls.clear();
        self.unresolved = None;
        self.uses_tools = false;
        messages
    }

    /// The turn to persist for this request.
    pub fn to_turn(&self) -> ConversationTurn {
        let tool_messages = ConversationTurn::encode_tool_messages(&self.tool_messages).unwrap_or_else(|e| {
            error!(user_id = %self.user_id, error = %e, "Failed to serialize tool messages");
            String::new()
        });

        ConversationTurn {
            user_id: self.user_id.clone(),
            question: self.question.clone(),
            answer: self.answer.clone(),
            tool_messages,
            token_count: self.token_count,
            is_final: true,
            created_at: Utc::now(),
        }
    }
}

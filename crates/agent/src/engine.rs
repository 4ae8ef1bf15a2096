//! The request engine: one spawned task per top-level request.
//!
//! A request runs through context building, one or more provider streams
//! and tool dispatch, and finally persistence. Frames flow out over a
//! bounded channel whose sender belongs to the request task, so the
//! channel closes exactly once, whichever way the task ends.

use crate::accumulator::DispatchOutcome;
use crate::chunker::{ChunkerSettings, OutputChunker};
use crate::context::build_context;
use crate::error::EngineError;
use crate::limiter::UserChatLimiter;
use crate::session::{Deadline, RequestSession};
use std::sync::Arc;
use std::time::Duration;
use streambot_config::AppConfig;
use streambot_core::frame::OutboundFrame;
use streambot_core::history::HistoryStore;
use streambot_core::message::Role;
use streambot_core::provider::{Provider, ProviderRequest};
use streambot_core::tool::ToolRegistry;
use streambot_core::usage::UsageSink;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

/// Tunables for the engine, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
    /// Past turns replayed into each request
    pub history_window: usize,
    /// Deadline of a whole request, continuations included
    pub request_timeout: Duration,
    /// Provider streams allowed per request
    pub max_tool_iterations: usize,
    /// Concurrent requests allowed per user
    pub max_user_chats: usize,
    pub chunker: ChunkerSettings,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let engine = &config.engine;
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
            history_window: engine.history_window,
            request_timeout: Duration::from_secs(engine.request_timeout_secs),
            max_tool_iterations: engine.max_tool_iterations,
            max_user_chats: engine.max_user_chats,
            chunker: ChunkerSettings {
                first_send_len: engine.first_send_len,
                send_len_step: engine.send_len_step,
                message_ceiling: engine.message_ceiling,
            },
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What a finished request produced.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub answer: String,
    pub token_count: u64,
    /// Provider streams opened
    pub iterations: usize,
    /// Tool calls that ran to completion
    pub tool_calls: usize,
    pub duration: Duration,
}

/// The caller's side of a running request.
///
/// `frames` yields frames in production order and ends when the request
/// task finishes. `completion` resolves to the request's outcome.
pub struct RequestHandle {
    pub frames: mpsc::Receiver<OutboundFrame>,
    pub completion: JoinHandle<Result<RequestSummary, EngineError>>,
}

impl RequestHandle {
    /// Drain every frame, then wait for the outcome.
    pub async fn collect_frames(mut self) -> (Vec<OutboundFrame>, Result<RequestSummary, EngineError>) {
        let mut frames = Vec::new();
        while let Some(frame) = self.frames.recv().await {
            frames.push(frame);
        }
        let result = match self.completion.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::TaskFailed(e.to_string())),
        };
        (frames, result)
    }
}

/// Drives requests against a provider, a tool registry and a history store.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct Engine {
    provider: Arc<dyn Provider>,
    history: Arc<dyn HistoryStore>,
    tools: Arc<ToolRegistry>,
    usage: Arc<dyn UsageSink>,
    settings: EngineSettings,
    limiter: UserChatLimiter,
}

impl Engine {
    pub fn new(
        provider: Arc<dyn Provider>,
        history: Arc<dyn HistoryStore>,
        tools: Arc<ToolRegistry>,
        usage: Arc<dyn UsageSink>,
        settings: EngineSettings,
    ) -> Self {
        let limiter = UserChatLimiter::new(settings.max_user_chats);
        Self {
            provider,
            history,
            tools,
            usage,
            settings,
            limiter,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Start a request for `user_id`.
    ///
    /// Fails immediately with [`EngineError::TooManyRequests`] when the user
    /// already has `max_user_chats` requests in flight. Must be called from
    /// within a tokio runtime.
    pub fn run_request(
        &self,
        user_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Result<RequestHandle, EngineError> {
        let user_id = user_id.into();
        let prompt = prompt.into();

        let permit = self
            .limiter
            .try_acquire(&user_id)
            .ok_or_else(|| EngineError::TooManyRequests {
                user_id: user_id.clone(),
            })?;

        let (tx, rx) = mpsc::channel(1);
        let span = info_span!("request", user_id = %user_id);
        let engine = self.clone();

        let task = async move {
            let _permit = permit;
            let result = engine.drive(user_id, prompt, tx).await;
            if let Err(e) = &result {
                error!(error = %e, "Request failed");
            }
            result
        }
        .instrument(span);

        Ok(RequestHandle {
            frames: rx,
            completion: tokio::spawn(task),
        })
    }

    async fn drive(
        &self,
        user_id: String,
        prompt: String,
        frames: mpsc::Sender<OutboundFrame>,
    ) -> Result<RequestSummary, EngineError> {
        let started = Instant::now();
        let deadline = Deadline::after(self.settings.request_timeout);
        let mut messages = build_context(self.history.as_ref(), &user_id, &prompt, self.settings.history_window).await;
        let mut session = RequestSession::new(user_id, prompt, deadline);
        let mut chunker = OutputChunker::new(self.settings.chunker);
        let definitions = self.tools.definitions();

        loop {
            session.iterations += 1;
            debug!(iteration = session.iterations, messages = messages.len(), "Opening completion stream");

            let request = ProviderRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                tools: definitions.clone(),
                stop: self.settings.stop.clone(),
            };
            self.run_stream(request, &mut session, &mut chunker, &frames).await?;

            if !session.should_continue() {
                if let Some(e) = session.unresolved.take() {
                    return Err(e);
                }
                break;
            }

            if session.iterations >= self.settings.max_tool_iterations {
                warn!(
                    iterations = session.iterations,
                    "Tool iteration limit reached; finishing with the answer so far"
                );
                session.commit_iteration();
                break;
            }

            if let Some(frame) = chunker.begin_iteration() {
                send_frame(&frames, frame, &mut session).await?;
            }
            messages.extend(session.commit_iteration());
        }

        send_frame(&frames, chunker.finish(), &mut session).await?;

        match self.history.append(session.to_turn()).await {
            Ok(()) => self.usage.record_turn(),
            Err(e) => error!(store = self.history.name(), error = %e, "Failed to persist conversation turn"),
        }

        let duration = started.elapsed();
        self.usage.observe_conversation(duration);

        let tool_calls = session
            .tool_messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        info!(
            tokens = session.token_count,
            iterations = session.iterations,
            tool_calls,
            elapsed_ms = duration.as_millis() as u64,
            "Request finished"
        );

        Ok(RequestSummary {
            answer: session.answer,
            token_count: session.token_count,
            iterations: session.iterations,
            tool_calls,
            duration,
        })
    }

    /// Open one provider stream and consume it to the end.
    async fn run_stream(
        &self,
        request: ProviderRequest,
        session: &mut RequestSession,
        chunker: &mut OutputChunker,
        frames: &mpsc::Sender<OutboundFrame>,
    ) -> Result<(), EngineError> {
        let deadline = session.deadline;

        let mut rx = match timeout_at(deadline.instant(), self.provider.stream(request)).await {
            Ok(Ok(rx)) => rx,
            Ok(Err(e)) => return Err(EngineError::StreamOpen(e)),
            Err(_) => return Err(timed_out(deadline)),
        };
        session.uses_tools = false;

        loop {
            let chunk = match timeout_at(deadline.instant(), rx.recv()).await {
                Ok(Some(item)) => item.map_err(EngineError::StreamRead)?,
                Ok(None) => break,
                Err(_) => return Err(timed_out(deadline)),
            };

            if let Some(usage) = chunk.usage {
                let tokens = u64::from(usage.total_tokens);
                session.token_count += tokens;
                self.usage.add_tokens(tokens);
            }

            if !chunk.tool_calls.is_empty() {
                session.uses_tools = true;
                for delta in &chunk.tool_calls {
                    session.calls.merge(delta);
                }
                self.dispatch_ready(session).await?;
            }

            let Some(content) = chunk.content.filter(|c| !c.is_empty()) else {
                continue;
            };
            if session.uses_tools {
                trace!(len = content.len(), "Dropping text from a tool-using stream");
                continue;
            }
            session.push_text(&content);
            if let Some(frame) = chunker.push(&content) {
                send_frame(frames, frame, session).await?;
            }
        }

        session.calls.warn_incomplete();
        Ok(())
    }

    /// Dispatch every call whose arguments are complete, in position order.
    ///
    /// An unknown tool ends dispatch for the current chunk only. Calls that
    /// already ran keep their replies; the failure surfaces once the stream
    /// ends without any completed call.
    async fn dispatch_ready(&self, session: &mut RequestSession) -> Result<(), EngineError> {
        let deadline = session.deadline;
        while let Some(outcome) = session.calls.dispatch_next(&self.tools, deadline).await {
            match outcome {
                DispatchOutcome::Incomplete => break,
                DispatchOutcome::Dispatched { call, result } => {
                    debug!(tool = %call.function_name, call_id = %call.id, "Tool result recorded");
                    session.tool_results.push(result);
                }
                DispatchOutcome::ResolutionError { call, error } => {
                    let e = EngineError::ToolResolution {
                        tool: call.function_name,
                        call_id: call.id,
                        source: error,
                    };
                    error!(error = %e, "Stopping tool dispatch for this chunk");
                    session.unresolved.get_or_insert(e);
                    break;
                }
                DispatchOutcome::ExecutionError { call, error } => {
                    return Err(EngineError::ToolExecution {
                        tool: call.function_name,
                        call_id: call.id,
                        source: error,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Hand a frame to the consumer, waiting no longer than the deadline.
///
/// A vanished consumer is not an error: the request still runs to the end
/// and persists its turn.
async fn send_frame(
    frames: &mpsc::Sender<OutboundFrame>,
    frame: OutboundFrame,
    session: &mut RequestSession,
) -> Result<(), EngineError> {
    if session.consumer_gone {
        return Ok(());
    }
    match timeout_at(session.deadline.instant(), frames.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => {
            warn!(user_id = %session.user_id, "Frame receiver dropped; continuing without output");
            session.consumer_gone = true;
            Ok(())
        }
        Err(_) => Err(timed_out(session.deadline)),
    }
}

fn timed_out(deadline: Deadline) -> EngineError {
    EngineError::Timeout {
        timeout_secs: deadline.budget_secs(),
    }
}

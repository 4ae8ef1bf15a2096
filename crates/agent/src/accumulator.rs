//! Tool-call accumulator and dispatcher.
//!
//! Providers stream a tool call as fragments tagged with the call's
//! position: the first usually carries the id and name, the rest carry
//! slices of the JSON argument text. Fragments for different positions may
//! interleave. The accumulator merges them and dispatches each call as
//! soon as its arguments form a complete JSON object.
//!
//! Calls are dispatched strictly in position order: while the lowest
//! undispatched call is incomplete, calls behind it wait.

use crate::session::Deadline;
use std::collections::BTreeMap;
use streambot_core::error::ToolError;
use streambot_core::message::{Message, ToolCall};
use streambot_core::provider::ToolCallDelta;
use streambot_core::tool::{ToolArguments, ToolRegistry};
use tracing::{debug, trace, warn};

/// What happened when the dispatcher looked at the next pending call.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The next call's arguments do not parse yet; wait for more fragments.
    Incomplete,
    /// No tool with the requested name is registered.
    ResolutionError { call: ToolCall, error: ToolError },
    /// The tool ran and failed, or the request deadline expired.
    ExecutionError { call: ToolCall, error: ToolError },
    /// The tool ran; `result` is the tool-role reply to the call.
    Dispatched { call: ToolCall, result: Message },
}

#[derive(Debug)]
struct PendingCall {
    call: ToolCall,
    dispatched: bool,
    /// The tool ran and produced a reply
    answered: bool,
}

/// Per-iteration tool-call state, keyed by position.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PendingCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment into the call at its position.
    pub fn merge(&mut self, delta: &ToolCallDelta) {
        let name = delta.name.as_deref().unwrap_or_default();

        let Some(pending) = self.calls.get_mut(&delta.index) else {
            if name.is_empty() {
                warn!(index = delta.index, "Dropping tool call fragment for unknown position");
                return;
            }
            let mut call = ToolCall::new(
                delta.id.clone().unwrap_or_default(),
                name,
                delta.arguments.clone().unwrap_or_default(),
            );
            if let Some(kind) = delta.kind.as_ref().filter(|k| !k.is_empty()) {
                call.kind = kind.clone();
            }
            trace!(index = delta.index, tool = name, "New tool call");
            self.calls.insert(
                delta.index,
                PendingCall {
                    call,
                    dispatched: false,
                    answered: false,
                },
            );
            return;
        };

        if pending.dispatched {
            trace!(index = delta.index, "Ignoring fragment for dispatched tool call");
            return;
        }

        let call = &mut pending.call;
        if let Some(args) = &delta.arguments {
            call.arguments.push_str(args);
        }
        if let Some(id) = delta.id.as_ref().filter(|id| !id.is_empty()) {
            call.id = id.clone();
        }
        if let Some(kind) = delta.kind.as_ref().filter(|k| !k.is_empty()) {
            call.kind = kind.clone();
        }
    }

    /// Try to dispatch the lowest-positioned undispatched call.
    ///
    /// Returns `None` when every known call has been dispatched.
    pub async fn dispatch_next(&mut self, tools: &ToolRegistry, deadline: Deadline) -> Option<DispatchOutcome> {
        let pending = self.calls.values_mut().find(|p| !p.dispatched)?;

        let Ok(arguments) = serde_json::from_str::<ToolArguments>(&pending.call.arguments) else {
            return Some(DispatchOutcome::Incomplete);
        };

        // From here on the call is frozen, whatever the outcome
        pending.dispatched = true;
        let call = pending.call.clone();

        let tool = match tools.resolve(&call.function_name) {
            Ok(tool) => tool,
            Err(error) => {
                warn!(tool = %call.function_name, call_id = %call.id, %error, "Tool resolution failed");
                return Some(DispatchOutcome::ResolutionError { call, error });
            }
        };

        debug!(tool = %call.function_name, call_id = %call.id, "Executing tool");

        let result = match tokio::time::timeout_at(deadline.instant(), tool.execute(arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.function_name.clone(),
                timeout_secs: deadline.budget_secs(),
            }),
        };

        match result {
            Ok(output) => {
                debug!(tool = %call.function_name, call_id = %call.id, bytes = output.len(), "Tool finished");
                pending.answered = true;
                let result = Message::tool_result(call.id.clone(), output);
                Some(DispatchOutcome::Dispatched { call, result })
            }
            Err(error) => {
                warn!(tool = %call.function_name, call_id = %call.id, %error, "Tool execution failed");
                Some(DispatchOutcome::ExecutionError { call, error })
            }
        }
    }

    /// Calls that have a tool reply, in position order.
    pub fn answered_calls(&self) -> Vec<ToolCall> {
        self.calls
            .values()
            .filter(|p| p.answered)
            .map(|p| p.call.clone())
            .collect()
    }

    /// Log calls that never became complete. Called at end of stream.
    pub fn warn_incomplete(&self) {
        for (index, pending) in self.calls.iter().filter(|(_, p)| !p.dispatched) {
            warn!(
                index,
                tool = %pending.call.function_name,
                call_id = %pending.call.id,
                arguments = %pending.call.arguments,
                "Tool call arguments never completed; call dropped"
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingTool, fragment};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn registry(log: &Arc<Mutex<Vec<String>>>, names: &[&str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            registry.register(Arc::new(RecordingTool::new(name, Arc::clone(log))));
        }
        registry
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(60))
    }

    async fn drain(acc: &mut ToolCallAccumulator, tools: &ToolRegistry) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = acc.dispatch_next(tools, deadline()).await {
            let stop = matches!(outcome, DispatchOutcome::Incomplete);
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        outcomes
    }

    #[tokio::test]
    async fn fragmented_call_dispatches_once_when_complete() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = registry(&log, &["calc"]);
        let mut acc = ToolCallAccumulator::new();

        acc.merge(&fragment(0, Some("call_1"), Some("calc"), ""));
        assert!(matches!(&drain(&mut acc, &tools).await[..], [DispatchOutcome::Incomplete]));

        acc.merge(&fragment(0, None, None, r#"{"a":1"#));
        assert!(matches!(&drain(&mut acc, &tools).await[..], [DispatchOutcome::Incomplete]));

        acc.merge(&fragment(0, None, None, "}"));
        let outcomes = drain(&mut acc, &tools).await;
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            DispatchOutcome::Dispatched { call, result } => {
                assert_eq!(call.arguments, r#"{"a":1}"#);
                assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
            }
            other => panic!("expected dispatch, got {other:?}"),
        }
        assert_eq!(*log.lock().unwrap(), vec![r#"calc:{"a":1}"#.to_string()]);

        // Nothing left to do, and late fragments are ignored
        acc.merge(&fragment(0, None, None, "garbage"));
        assert!(drain(&mut acc, &tools).await.is_empty());
        assert_eq!(acc.answered_calls()[0].arguments, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn higher_positions_wait_for_lower_ones() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = registry(&log, &["first", "second"]);
        let mut acc = ToolCallAccumulator::new();

        acc.merge(&fragment(1, Some("c2"), Some("second"), r#"{"n":2}"#));
        acc.merge(&fragment(0, Some("c1"), Some("first"), r#"{"n":1"#));
        assert!(matches!(&drain(&mut acc, &tools).await[..], [DispatchOutcome::Incomplete]));
        assert!(log.lock().unwrap().is_empty());

        acc.merge(&fragment(0, None, None, "}"));
        let outcomes = drain(&mut acc, &tools).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![r#"first:{"n":1}"#.to_string(), r#"second:{"n":2}"#.to_string()]
        );
        let ids: Vec<String> = acc.answered_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn orphan_fragment_dropped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = registry(&log, &["calc"]);
        let mut acc = ToolCallAccumulator::new();

        acc.merge(&fragment(3, Some("c"), None, "{}"));
        assert!(acc.is_empty());
        assert!(drain(&mut acc, &tools).await.is_empty());
    }

    #[tokio::test]
    async fn id_and_kind_may_arrive_late() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = registry(&log, &["calc"]);
        let mut acc = ToolCallAccumulator::new();

        acc.merge(&fragment(0, None, Some("calc"), "{"));
        acc.merge(&ToolCallDelta {
            index: 0,
            id: Some("late_id".into()),
            kind: Some("function".into()),
            arguments: Some("}".into()),
            ..Default::default()
        });
        let outcomes = drain(&mut acc, &tools).await;
        assert!(matches!(
            &outcomes[..],
            [DispatchOutcome::Dispatched { call, .. }] if call.id == "late_id"
        ));
    }

    #[tokio::test]
    async fn unknown_tool_is_resolution_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = registry(&log, &["calc"]);
        let mut acc = ToolCallAccumulator::new();

        acc.merge(&fragment(0, Some("c"), Some("nope"), "{}"));
        let outcomes = drain(&mut acc, &tools).await;
        assert!(matches!(
            &outcomes[..],
            [DispatchOutcome::ResolutionError { error: ToolError::NotFound(name), .. }] if name == "nope"
        ));
        // Marked dispatched: not retried
        assert!(drain(&mut acc, &tools).await.is_empty());
    }

    #[tokio::test]
    async fn unresolved_call_has_no_reply_but_later_calls_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = registry(&log, &["calc"]);
        let mut acc = ToolCallAccumulator::new();

        acc.merge(&fragment(0, Some("c1"), Some("calc"), "{}"));
        acc.merge(&fragment(1, Some("c2"), Some("nope"), "{}"));
        acc.merge(&fragment(2, Some("c3"), Some("calc"), r#"{"n":3}"#));
        let outcomes = drain(&mut acc, &tools).await;
        assert!(matches!(
            &outcomes[..],
            [
                DispatchOutcome::Dispatched { .. },
                DispatchOutcome::ResolutionError { .. },
                DispatchOutcome::Dispatched { .. }
            ]
        ));

        let ids: Vec<String> = acc.answered_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn non_object_arguments_never_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tools = registry(&log, &["calc"]);
        let mut acc = ToolCallAccumulator::new();

        acc.merge(&fragment(0, Some("c"), Some("calc"), "[1, 2]"));
        assert!(matches!(&drain(&mut acc, &tools).await[..], [DispatchOutcome::Incomplete]));
        assert!(acc.answered_calls().is_empty());
    }

    #[tokio::test]
    async fn clear_resets_state() {
        let mut acc = ToolCallAccumulator::new();
        acc.merge(&fragment(0, Some("c"), Some("calc"), "{"));
        assert!(!acc.is_empty());
        acc.warn_incomplete();
        acc.clear();
        assert!(acc.is_empty());
    }
}

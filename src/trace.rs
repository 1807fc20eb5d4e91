//! # Tracing for Team Runs
//!
//! A team run can be observed through the [`Tracer`] capability: a trace
//! per run, with a root `team-run` span, one span per round, and one span
//! per agent invocation nested under its round. The engine instruments runs
//! by wrapping the caller's hooks in a decorator ([`TracedHooks`]) that
//! opens and closes spans around the hook callbacks while still invoking
//! the originals.
//!
//! Two implementations are provided: [`RecordingTracer`] keeps finished
//! spans in memory for inspection (handy in tests), and [`ConsoleTracer`]
//! prints spans as they close.
//!
//! Instrumentation must never change a run's outcome: span closure happens
//! on both success and failure, and the original error is always returned
//! unchanged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::agent::AgentResponse;
use crate::error::TeamError;
use crate::team::TeamHooks;

/// A unique identifier for a trace (one end-to-end team run).
pub type TraceId = String;

/// A unique identifier for a span (one unit of work within a trace).
pub type SpanId = String;

/// Generates a new, unique trace ID.
pub fn gen_trace_id() -> TraceId {
    Uuid::new_v4().to_string()
}

/// Generates a new, unique span ID.
pub fn gen_span_id() -> SpanId {
    Uuid::new_v4().to_string()
}

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error,
}

/// Capability for exporting team-run observability data.
///
/// Implementations own their trace state; the engine only holds the IDs
/// the tracer returns.
pub trait Tracer: Send + Sync {
    /// Opens a trace and returns its ID.
    fn start_trace(&self, name: &str, metadata: Value) -> TraceId;

    /// Opens a span, optionally nested under `parent`, and returns its ID.
    fn start_span(&self, name: &str, parent: Option<&SpanId>, metadata: Value) -> SpanId;

    /// Closes a span with its terminal status and closing metadata.
    fn end_span(&self, span: &SpanId, status: SpanStatus, metadata: Value);

    /// Closes a trace.
    fn end_trace(&self, trace: &TraceId);
}

/// A finished or in-flight span captured by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub id: SpanId,
    pub name: String,
    pub parent_id: Option<SpanId>,
    pub metadata: Value,
    /// `None` while the span is still open.
    pub status: Option<SpanStatus>,
    pub close_metadata: Option<Value>,
}

/// A trace captured by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub id: TraceId,
    pub name: String,
    pub metadata: Value,
    pub ended: bool,
}

/// A tracer that records traces and spans in memory.
#[derive(Default)]
pub struct RecordingTracer {
    traces: Mutex<Vec<TraceRecord>>,
    spans: Mutex<Vec<SpanRecord>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded traces.
    pub fn traces(&self) -> Vec<TraceRecord> {
        self.traces.lock().unwrap().clone()
    }

    /// Snapshot of all recorded spans, in start order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().unwrap().clone()
    }

    /// The spans with the given name, in start order.
    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    /// Number of spans that were started but never closed.
    pub fn open_span_count(&self) -> usize {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.status.is_none())
            .count()
    }
}

impl Tracer for RecordingTracer {
    fn start_trace(&self, name: &str, metadata: Value) -> TraceId {
        let id = gen_trace_id();
        self.traces.lock().unwrap().push(TraceRecord {
            id: id.clone(),
            name: name.to_string(),
            metadata,
            ended: false,
        });
        id
    }

    fn start_span(&self, name: &str, parent: Option<&SpanId>, metadata: Value) -> SpanId {
        let id = gen_span_id();
        self.spans.lock().unwrap().push(SpanRecord {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent.cloned(),
            metadata,
            status: None,
            close_metadata: None,
        });
        id
    }

    fn end_span(&self, span: &SpanId, status: SpanStatus, metadata: Value) {
        if let Some(record) = self
            .spans
            .lock()
            .unwrap()
            .iter_mut()
            .find(|s| &s.id == span)
        {
            record.status = Some(status);
            record.close_metadata = Some(metadata);
        }
    }

    fn end_trace(&self, trace: &TraceId) {
        if let Some(record) = self
            .traces
            .lock()
            .unwrap()
            .iter_mut()
            .find(|t| &t.id == trace)
        {
            record.ended = true;
        }
    }
}

/// A tracer that prints spans to stdout as they close.
pub struct ConsoleTracer {
    names: Mutex<HashMap<String, String>>,
}

impl ConsoleTracer {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ConsoleTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for ConsoleTracer {
    fn start_trace(&self, name: &str, _metadata: Value) -> TraceId {
        let id = gen_trace_id();
        println!("=== Trace {} ({}) ===", name, id);
        self.names.lock().unwrap().insert(id.clone(), name.to_string());
        id
    }

    fn start_span(&self, name: &str, _parent: Option<&SpanId>, _metadata: Value) -> SpanId {
        let id = gen_span_id();
        self.names.lock().unwrap().insert(id.clone(), name.to_string());
        id
    }

    fn end_span(&self, span: &SpanId, status: SpanStatus, metadata: Value) {
        let name = self
            .names
            .lock()
            .unwrap()
            .remove(span)
            .unwrap_or_else(|| span.clone());
        println!("  [{:?}] {} {}", status, name, metadata);
    }

    fn end_trace(&self, trace: &TraceId) {
        let name = self
            .names
            .lock()
            .unwrap()
            .remove(trace)
            .unwrap_or_else(|| trace.clone());
        println!("=== End trace {} ===", name);
    }
}

/// Decorator that opens/closes spans around hook callbacks.
///
/// Round spans parent to the root `team-run` span; agent spans parent to
/// the currently open round span (or the root, when an invocation happens
/// outside any round, like a debate judge). Bookkeeping entries are removed
/// as spans close so the maps stay bounded on long-running teams. The
/// caller's original hooks are always invoked after the span bookkeeping.
pub(crate) struct TracedHooks {
    inner: Option<Arc<dyn TeamHooks>>,
    tracer: Arc<dyn Tracer>,
    root_span: SpanId,
    round_spans: Mutex<HashMap<usize, SpanId>>,
    agent_spans: Mutex<HashMap<String, SpanId>>,
    open_round: Mutex<Option<usize>>,
}

impl TracedHooks {
    pub(crate) fn new(
        inner: Option<Arc<dyn TeamHooks>>,
        tracer: Arc<dyn Tracer>,
        root_span: SpanId,
    ) -> Self {
        Self {
            inner,
            tracer,
            root_span,
            round_spans: Mutex::new(HashMap::new()),
            agent_spans: Mutex::new(HashMap::new()),
            open_round: Mutex::new(None),
        }
    }

    fn current_round_span(&self) -> Option<SpanId> {
        let open = *self.open_round.lock().unwrap();
        open.and_then(|round| self.round_spans.lock().unwrap().get(&round).cloned())
    }

    /// Closes every span still open after a failed run, innermost first.
    ///
    /// A failing runner returns before its round (and sometimes agent)
    /// callbacks fire; the factory calls this before closing the root span
    /// so failure never leaks spans.
    pub(crate) fn abandon_open_spans(&self, error: &TeamError) {
        let metadata = json!({ "error": error.to_string() });
        for (_, span) in self.agent_spans.lock().unwrap().drain() {
            self.tracer.end_span(&span, SpanStatus::Error, metadata.clone());
        }
        for (_, span) in self.round_spans.lock().unwrap().drain() {
            self.tracer.end_span(&span, SpanStatus::Error, metadata.clone());
        }
        *self.open_round.lock().unwrap() = None;
    }
}

impl TeamHooks for TracedHooks {
    fn on_round_start(&self, round: usize) {
        let span = self.tracer.start_span(
            &format!("round-{}", round),
            Some(&self.root_span),
            json!({ "round": round }),
        );
        self.round_spans.lock().unwrap().insert(round, span);
        *self.open_round.lock().unwrap() = Some(round);

        if let Some(inner) = &self.inner {
            inner.on_round_start(round);
        }
    }

    fn on_agent_start(&self, agent: &str, input: &str) {
        let parent = self.current_round_span().unwrap_or_else(|| self.root_span.clone());
        let span = self.tracer.start_span(
            &format!("agent:{}", agent),
            Some(&parent),
            json!({ "agent": agent, "input_len": input.len() }),
        );
        self.agent_spans
            .lock()
            .unwrap()
            .insert(agent.to_string(), span);

        if let Some(inner) = &self.inner {
            inner.on_agent_start(agent, input);
        }
    }

    fn on_agent_end(&self, agent: &str, response: &AgentResponse) {
        if let Some(span) = self.agent_spans.lock().unwrap().remove(agent) {
            self.tracer.end_span(
                &span,
                SpanStatus::Ok,
                json!({ "total_tokens": response.usage.total_tokens }),
            );
        }

        if let Some(inner) = &self.inner {
            inner.on_agent_end(agent, response);
        }
    }

    fn on_round_end(&self, round: usize, responses: &[AgentResponse]) {
        if let Some(span) = self.round_spans.lock().unwrap().remove(&round) {
            self.tracer.end_span(
                &span,
                SpanStatus::Ok,
                json!({ "responses": responses.len() }),
            );
        }
        let mut open = self.open_round.lock().unwrap();
        if *open == Some(round) {
            *open = None;
        }
        drop(open);

        if let Some(inner) = &self.inner {
            inner.on_round_end(round, responses);
        }
    }

    fn on_error(&self, error: &TeamError) {
        // Close the failed agent's span when the error names one; other
        // errors have no span of their own.
        if let Some(agent) = error.agent_name() {
            if let Some(span) = self.agent_spans.lock().unwrap().remove(agent) {
                self.tracer.end_span(
                    &span,
                    SpanStatus::Error,
                    json!({ "error": error.to_string() }),
                );
            }
        }
        debug!(error = %error, "team hook observed error");

        if let Some(inner) = &self.inner {
            inner.on_error(error);
        }
    }

    fn on_consensus(&self, round: usize, text: &str) {
        debug!(round, "consensus reached");
        if let Some(inner) = &self.inner {
            inner.on_consensus(round, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::Usage;

    #[test]
    fn test_recording_tracer_captures_hierarchy() {
        let tracer = RecordingTracer::new();
        let trace = tracer.start_trace("team:demo", json!({"team": "demo"}));
        let root = tracer.start_span("team-run", None, json!({}));
        let child = tracer.start_span("round-1", Some(&root), json!({"round": 1}));

        tracer.end_span(&child, SpanStatus::Ok, json!({}));
        tracer.end_span(&root, SpanStatus::Ok, json!({"rounds": 1}));
        tracer.end_trace(&trace);

        let spans = tracer.spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].parent_id.as_ref(), Some(&spans[0].id));
        assert_eq!(tracer.open_span_count(), 0);
        assert!(tracer.traces()[0].ended);
    }

    #[test]
    fn test_traced_hooks_nest_agent_spans_under_rounds() {
        let tracer = Arc::new(RecordingTracer::new());
        let _trace = tracer.start_trace("team:t", json!({}));
        let root = tracer.start_span("team-run", None, json!({}));

        let hooks = TracedHooks::new(None, tracer.clone(), root.clone());

        hooks.on_round_start(1);
        hooks.on_agent_start("a", "hello");
        let response = AgentResponse::text_only("a", "done", Usage::new(5, 5));
        hooks.on_agent_end("a", &response);
        hooks.on_round_end(1, std::slice::from_ref(&response));

        let round = &tracer.spans_named("round-1")[0];
        let agent = &tracer.spans_named("agent:a")[0];
        assert_eq!(round.parent_id.as_deref(), Some(root.as_str()));
        assert_eq!(agent.parent_id.as_ref(), Some(&round.id));
        assert_eq!(agent.status, Some(SpanStatus::Ok));

        // Only the root remains open; bookkeeping maps drained.
        assert_eq!(tracer.open_span_count(), 1);
        assert!(hooks.round_spans.lock().unwrap().is_empty());
        assert!(hooks.agent_spans.lock().unwrap().is_empty());
    }

    #[test]
    fn test_traced_hooks_close_failed_agent_span_with_error() {
        let tracer = Arc::new(RecordingTracer::new());
        let root = tracer.start_span("team-run", None, json!({}));
        let hooks = TracedHooks::new(None, tracer.clone(), root);

        hooks.on_round_start(1);
        hooks.on_agent_start("flaky", "go");
        hooks.on_error(&TeamError::AgentTimeout {
            agent: "flaky".to_string(),
            ms: 50,
        });

        let agent = &tracer.spans_named("agent:flaky")[0];
        assert_eq!(agent.status, Some(SpanStatus::Error));
        let close = agent.close_metadata.as_ref().unwrap();
        assert!(close["error"]
            .as_str()
            .unwrap()
            .contains("timed out after 50ms"));
    }

    #[test]
    fn test_traced_hooks_forward_to_inner() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Counting {
            calls: AtomicUsize,
        }
        impl TeamHooks for Counting {
            fn on_round_start(&self, _round: usize) {
                self.calls.fetch_add(1, Ordering::SeqCst);
            }
            fn on_round_end(&self, _round: usize, _responses: &[AgentResponse]) {
                self.calls.fetch_add(1, Ordering::SeqCst);
            }
        }

        let tracer = Arc::new(RecordingTracer::new());
        let root = tracer.start_span("team-run", None, json!({}));
        let counting = Arc::new(Counting::default());
        let hooks = TracedHooks::new(Some(counting.clone()), tracer, root);

        hooks.on_round_start(1);
        hooks.on_round_end(1, &[]);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }
}

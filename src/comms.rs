//! # Communication Primitives
//!
//! Shared state for custom coordination strategies: a [`Blackboard`] for
//! key/value collaboration, a [`MessageBus`] for directed agent-to-agent
//! messages, and a [`Handoff`] describing one agent passing work to
//! another.
//!
//! Both the blackboard and the bus are created fresh for each team run and
//! discarded afterward: nothing here persists across `run()` calls, and no
//! instance is ever shared between concurrent runs. Only Custom-mode
//! coordination functions see these primitives, via [`TeamContext`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentResponse;

/// A key/value store agents collaborate through.
///
/// Cloning produces another handle to the same underlying map.
#[derive(Clone, Default)]
pub struct Blackboard {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl Blackboard {
    /// Creates an empty blackboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value under `key`, replacing any previous value.
    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.entries.lock().unwrap().insert(key.into(), value);
    }

    /// Reads the value under `key`, if present.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().remove(key)
    }

    /// All keys currently on the board.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    /// Number of entries on the board.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the board is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blackboard")
            .field("entries", &self.len())
            .finish()
    }
}

/// A message sent between agents over the [`MessageBus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMessage {
    /// Sender agent name.
    pub from: String,

    /// Recipient agent name.
    pub to: String,

    /// Message body.
    pub content: String,

    /// When the message was appended to the log.
    pub timestamp: DateTime<Utc>,
}

/// An append-only log of directed messages between agents.
///
/// Cloning produces another handle to the same underlying log. Messages are
/// never removed; `get` operations return snapshots.
#[derive(Clone, Default)]
pub struct MessageBus {
    log: Arc<Mutex<Vec<TeamMessage>>>,
}

impl MessageBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the log.
    pub fn send(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.log.lock().unwrap().push(TeamMessage {
            from: from.into(),
            to: to.into(),
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    /// Snapshot of every message sent so far, in order.
    pub fn messages(&self) -> Vec<TeamMessage> {
        self.log.lock().unwrap().clone()
    }

    /// Snapshot of the messages addressed to `recipient`, in order.
    pub fn messages_for(&self, recipient: &str) -> Vec<TeamMessage> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == recipient)
            .cloned()
            .collect()
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.log.lock().unwrap().is_empty()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("messages", &self.len())
            .finish()
    }
}

/// One agent passing its output to another, with optional instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
    /// The agent handing work off.
    pub from_agent: String,

    /// The agent taking over.
    pub to_agent: String,

    /// The output being handed over.
    pub output: String,

    /// Optional instructions for the receiving agent.
    pub instructions: Option<String>,
}

impl Handoff {
    /// Creates a new handoff.
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            output: output.into(),
            instructions: None,
        }
    }

    /// Sets instructions for the receiving agent.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Renders the textual input the receiving agent should be invoked with.
    pub fn format_input(&self) -> String {
        let mut input = format!(
            "Handoff from {}.\n\nPrevious output:\n{}",
            self.from_agent, self.output
        );
        if let Some(instructions) = &self.instructions {
            input.push_str("\n\nInstructions: ");
            input.push_str(instructions);
        }
        input
    }
}

/// Run-scoped context handed to Custom-mode coordination functions.
///
/// The engine performs no implicit looping for Custom mode: the function
/// manages `current_round` and `previous_results` itself if it wants
/// multi-round behavior.
#[derive(Debug, Clone)]
pub struct TeamContext {
    /// Shared key/value state for this run.
    pub blackboard: Blackboard,

    /// Directed message log for this run.
    bus: MessageBus,

    /// The round the coordination function is currently on.
    pub current_round: usize,

    /// Responses accumulated by the coordination function so far.
    pub previous_results: Vec<AgentResponse>,
}

impl TeamContext {
    /// Creates a fresh context for one team run.
    pub fn new() -> Self {
        Self {
            blackboard: Blackboard::new(),
            bus: MessageBus::new(),
            current_round: 1,
            previous_results: Vec::new(),
        }
    }

    /// Sends a message from one agent to another.
    pub fn send_message(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.bus.send(from, to, content);
    }

    /// All messages sent during this run, in order.
    pub fn get_messages(&self) -> Vec<TeamMessage> {
        self.bus.messages()
    }

    /// The messages addressed to `recipient`, in order.
    pub fn get_messages_for(&self, recipient: &str) -> Vec<TeamMessage> {
        self.bus.messages_for(recipient)
    }
}

impl Default for TeamContext {
    fn default() -> Self {
        Self::new()
    }
}

//! # Agent contract (orientation)
//!
//! An [`Agent`] is the engine's only external boundary: an opaque,
//! independently-executing worker that accepts text and produces text plus
//! usage. The engine never looks inside an agent; tool calling, guardrails,
//! and model adapters all live behind this trait. Teams hold agents as
//! [`AgentRole`]s, which annotate each agent with a team-scoped role.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::usage::Usage;

/// An independently-executing worker the team can invoke.
///
/// Identity is the agent's `name`; the only capability the engine uses is
/// [`run`](Agent::run). Implementations are expected to be cheap to share
/// (`Arc<dyn Agent>`) and safe to invoke concurrently.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The agent's name, used for identification, addressing, and logs.
    fn name(&self) -> &str;

    /// Submit `input` and await the agent's response.
    async fn run(&self, input: &str, options: RunOptions) -> Result<AgentResponse>;
}

/// Per-invocation options forwarded into [`Agent::run`].
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Cooperative cancellation signal. Agents should stop work promptly
    /// when it fires; the engine never forces termination.
    pub signal: Option<CancellationToken>,
}

impl RunOptions {
    /// Options carrying the given cancellation signal, if any.
    pub fn with_signal(signal: Option<CancellationToken>) -> Self {
        Self { signal }
    }
}

/// A tool call surfaced by an agent as part of its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The response of a single agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The agent's textual output.
    pub text: String,

    /// Tool calls the agent made while producing the output.
    pub tool_calls: Vec<ToolCall>,

    /// Token usage of this invocation.
    pub usage: Usage,

    /// The name of the agent that produced this response.
    pub agent_name: String,
}

impl AgentResponse {
    /// A response carrying only text and usage, no tool calls.
    pub fn text_only(
        agent_name: impl Into<String>,
        text: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            usage,
            agent_name: agent_name.into(),
        }
    }
}

/// An [`Agent`] annotated with a team-scoped role.
///
/// Plain agents are auto-wrapped with the `"member"` role via
/// [`AgentRole::member`].
#[derive(Clone)]
pub struct AgentRole {
    /// The wrapped agent.
    pub agent: Arc<dyn Agent>,

    /// The agent's role within the team (e.g. `"member"`, `"supervisor"`,
    /// `"researcher"`).
    pub role: String,

    /// An optional description of what this agent contributes, shown to
    /// coordinators when they pick delegation targets.
    pub description: Option<String>,

    /// Whether this agent may receive delegated work.
    pub can_delegate: bool,
}

impl AgentRole {
    /// Wraps an agent with an explicit role.
    pub fn new(agent: Arc<dyn Agent>, role: impl Into<String>) -> Self {
        Self {
            agent,
            role: role.into(),
            description: None,
            can_delegate: true,
        }
    }

    /// Wraps a plain agent with the default `"member"` role.
    pub fn member(agent: Arc<dyn Agent>) -> Self {
        Self::new(agent, "member")
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets whether this agent may receive delegated work.
    pub fn with_delegation(mut self, can_delegate: bool) -> Self {
        self.can_delegate = can_delegate;
        self
    }

    /// The wrapped agent's name.
    pub fn name(&self) -> &str {
        self.agent.name()
    }
}

impl std::fmt::Debug for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRole")
            .field("name", &self.name())
            .field("role", &self.role)
            .field("description", &self.description)
            .field("can_delegate", &self.can_delegate)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedAgent;
    use super::*;

    #[tokio::test]
    async fn test_scripted_agent_replies_in_order() {
        let agent = ScriptedAgent::new("echo").reply("first").reply("second");

        let r1 = agent.run("hi", RunOptions::default()).await.unwrap();
        assert_eq!(r1.text, "first");
        assert_eq!(r1.agent_name, "echo");
        assert_eq!(r1.usage.total_tokens, 15);

        let r2 = agent.run("again", RunOptions::default()).await.unwrap();
        assert_eq!(r2.text, "second");

        // Queue exhausted falls back to the default reply.
        let r3 = agent.run("more", RunOptions::default()).await.unwrap();
        assert_eq!(r3.text, "Default response");

        assert_eq!(agent.inputs(), vec!["hi", "again", "more"]);
    }

    #[tokio::test]
    async fn test_scripted_agent_failure() {
        let agent = ScriptedAgent::new("flaky").fail("boom");
        let err = agent.run("go", RunOptions::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Agent \"flaky\" failed: boom");
    }

    #[test]
    fn test_role_wrapping() {
        let agent: Arc<dyn Agent> = Arc::new(ScriptedAgent::new("analyst"));

        let plain = AgentRole::member(agent.clone());
        assert_eq!(plain.role, "member");
        assert_eq!(plain.name(), "analyst");
        assert!(plain.can_delegate);

        let role = AgentRole::new(agent, "critic")
            .with_description("Challenges weak arguments")
            .with_delegation(false);
        assert_eq!(role.role, "critic");
        assert_eq!(role.description.as_deref(), Some("Challenges weak arguments"));
        assert!(!role.can_delegate);
    }

    #[test]
    fn test_response_serialization() {
        let response = AgentResponse::text_only("a", "hello", Usage::new(3, 4));
        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: AgentResponse = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized.text, "hello");
        assert_eq!(deserialized.agent_name, "a");
        assert_eq!(deserialized.usage.total_tokens, 7);
    }
}

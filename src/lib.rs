//! # Multi-Agent Team Coordination
//!
//! This crate runs a set of independently-executing agents, each an opaque
//! capability that takes text and returns text plus usage, under one of
//! several coordination policies and produces a single synthesized result.
//!
//! ## Coordination Modes
//!
//! - **Sequential**: a pipeline; each agent's output is the next agent's
//!   input.
//! - **Parallel**: concurrent fan-out over the same input, with
//!   first-wins, majority-vote, merge-all, or custom aggregation. Failed
//!   or timed-out agents degrade gracefully instead of failing the run.
//! - **Debate**: multiple rounds of argument with convergence detection
//!   and an optional judge.
//! - **Supervisor**: a coordinator delegates to named workers through
//!   `[DELEGATE: ...]` / `[FINAL]` directives embedded in its responses.
//! - **Custom**: a caller-supplied coordination function with a run-scoped
//!   blackboard and message bus.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agent_teams::{create_team, Agent, AggregationStrategy, CoordinationMode, TeamConfig};
//!
//! # async fn example(researcher: Arc<dyn Agent>, analyst: Arc<dyn Agent>) -> agent_teams::Result<()> {
//! let team = create_team(
//!     TeamConfig::new("research-team")
//!         .agent(researcher)
//!         .agent(analyst)
//!         .mode(CoordinationMode::parallel(AggregationStrategy::MajorityVote)),
//! )?;
//!
//! let result = team.run("What changed in the Q3 numbers?").await?;
//! println!("{} ({} tokens)", result.final_output, result.total_usage.total_tokens);
//! # Ok(())
//! # }
//! ```
//!
//! Runs are observable through [`TeamHooks`] lifecycle callbacks and the
//! optional [`Tracer`] capability, which nests one span per round and per
//! agent invocation under a run-level trace.

pub mod agent;
pub mod aggregate;
pub mod comms;
pub mod config;
pub mod error;
pub mod modes;
pub mod team;
pub mod trace;
pub mod usage;

pub use agent::{Agent, AgentResponse, AgentRole, RunOptions, ToolCall};
pub use aggregate::{aggregate, AggregationStrategy, Reducer};
pub use comms::{Blackboard, Handoff, MessageBus, TeamContext, TeamMessage};
pub use config::{ConfigBuilder, EngineConfig};
pub use error::{Result, TeamError};
pub use modes::{CoordinationFn, CoordinationFuture};
pub use team::{
    create_team, CoordinationKind, CoordinationMode, NoopHooks, Team, TeamConfig, TeamHooks,
    TeamResult, TeamRunOptions,
};
pub use trace::{ConsoleTracer, RecordingTracer, SpanId, SpanStatus, TraceId, Tracer};
pub use usage::{Usage, UsageStats};

// Re-export the cancellation token agents are handed via `RunOptions`.
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_imports() {
        // Verify that the public surface stays wired up.
        let _ = std::mem::size_of::<TeamError>();
        let _ = AggregationStrategy::default();
    }
}

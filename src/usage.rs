//! # Usage Tracking for Token Consumption
//!
//! This module provides the data structures for tracking the token usage of
//! team runs. Every agent invocation reports a [`Usage`]; mode runners sum
//! the usages of the invocations they actually counted into the team
//! result's total.
//!
//! ## Core Components
//!
//! - **[`Usage`]**: the token usage of a single agent invocation: prompt
//!   tokens, completion tokens, and their total.
//! - **[`UsageStats`]**: aggregated usage across a whole team run with a
//!   per-agent breakdown.
//!
//! ### Example: Summarizing a Run
//!
//! ```rust
//! use agent_teams::usage::{Usage, UsageStats};
//!
//! let mut stats = UsageStats::new();
//! stats.record("researcher", Usage::new(1200, 300));
//! stats.record("writer", Usage::new(500, 150));
//!
//! assert_eq!(stats.total.total_tokens, 2150);
//! assert_eq!(stats.by_agent["researcher"].total_tokens, 1500);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Add;

use crate::agent::AgentResponse;

/// Token usage for a single agent invocation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// The number of tokens in the input prompt.
    pub prompt_tokens: usize,

    /// The number of tokens in the generated completion.
    pub completion_tokens: usize,

    /// The total number of tokens (prompt + completion).
    pub total_tokens: usize,
}

impl Usage {
    /// Creates a new `Usage` from the prompt and completion token counts.
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Creates an empty `Usage` with all fields set to zero.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds the values from another `Usage` to this one.
    pub fn add_usage(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }

    /// Sums the usage of a slice of agent responses.
    pub fn sum_of(responses: &[AgentResponse]) -> Usage {
        responses
            .iter()
            .fold(Usage::empty(), |acc, r| acc + r.usage)
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

/// Aggregated usage across an entire team run, broken down by agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    /// The total usage across all agents.
    pub total: Usage,

    /// Usage broken down by agent name.
    pub by_agent: HashMap<String, Usage>,
}

impl UsageStats {
    /// Creates a new, empty `UsageStats`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a usage sample, updating the total and the breakdown.
    pub fn record(&mut self, agent: &str, usage: Usage) {
        self.total.add_usage(&usage);
        self.by_agent
            .entry(agent.to_string())
            .and_modify(|u| u.add_usage(&usage))
            .or_insert(usage);
    }

    /// Builds stats from the recorded results of a team run.
    pub fn from_results(responses: &[AgentResponse]) -> Self {
        let mut stats = Self::new();
        for response in responses {
            stats.record(&response.agent_name, response.usage);
        }
        stats
    }
}

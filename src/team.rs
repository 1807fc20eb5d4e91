//! # Teams and the Coordination Engine
//!
//! A [`Team`] binds a set of agents to one coordination policy and runs
//! them against a task. [`create_team`] validates the configuration up
//! front (an invalid team is rejected before any agent runs) and
//! [`Team::run`] dispatches to the policy's runner, instrumenting the run
//! with the configured tracer on the way in and guaranteeing trace/span
//! closure on the way out, success or failure alike.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agent_teams::{create_team, AggregationStrategy, CoordinationMode, TeamConfig};
//! # use agent_teams::Agent;
//!
//! # async fn example(writer: Arc<dyn Agent>, critic: Arc<dyn Agent>) -> agent_teams::Result<()> {
//! let team = create_team(
//!     TeamConfig::new("review-board")
//!         .agent(writer)
//!         .agent(critic)
//!         .mode(CoordinationMode::parallel(AggregationStrategy::MergeAll)),
//! )?;
//!
//! let result = team.run("Assess this proposal").await?;
//! println!("{}", result.final_output);
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::{Agent, AgentResponse, AgentRole};
use crate::aggregate::{AggregationStrategy, Reducer};
use crate::config::EngineConfig;
use crate::error::{Result, TeamError};
use crate::modes::custom::CoordinationFn;
use crate::modes::{custom, debate, parallel, sequential, supervisor};
use crate::trace::{SpanStatus, TracedHooks, Tracer};
use crate::usage::{Usage, UsageStats};

/// Lifecycle callbacks observed during a team run.
///
/// All methods default to no-ops; implement only what you need. Hooks are
/// invoked inline by the runners, so they should return quickly.
pub trait TeamHooks: Send + Sync {
    /// A round is about to start.
    fn on_round_start(&self, _round: usize) {}

    /// An agent is about to be invoked with `input`.
    fn on_agent_start(&self, _agent: &str, _input: &str) {}

    /// An agent invocation completed successfully.
    fn on_agent_end(&self, _agent: &str, _response: &AgentResponse) {}

    /// A round finished with the given surviving responses.
    fn on_round_end(&self, _round: usize, _responses: &[AgentResponse]) {}

    /// A participant invocation failed. Depending on the mode the run may
    /// continue (parallel, supervisor) or fail right after this call.
    fn on_error(&self, _error: &TeamError) {}

    /// A debate converged on `text` in `round`.
    fn on_consensus(&self, _round: usize, _text: &str) {}
}

/// Hooks that do nothing.
pub struct NoopHooks;

impl TeamHooks for NoopHooks {}

/// The policy governing how a team's agents are invoked and merged.
#[derive(Clone)]
pub enum CoordinationMode {
    /// Agents run once each in order; each output feeds the next input.
    Sequential,

    /// Agents run concurrently on the same input; survivors are aggregated.
    Parallel {
        aggregation: AggregationStrategy,
        /// Per-agent wait limit. The expired call keeps running detached.
        agent_timeout: Option<Duration>,
        /// Reducer for [`AggregationStrategy::Custom`].
        reducer: Option<Arc<Reducer>>,
    },

    /// Agents argue over multiple rounds until their outputs converge.
    Debate {
        /// Round cap override; the team's `max_rounds` applies when `None`.
        rounds: Option<usize>,
        /// Settles the debate if the rounds run out without convergence.
        judge: Option<Arc<dyn Agent>>,
    },

    /// A coordinator delegates to workers via text directives.
    Supervisor {
        /// Coordinator agent name; the first configured agent when `None`.
        supervisor: Option<String>,
    },

    /// A caller-supplied coordination function drives the whole run.
    Custom {
        coordination_fn: Option<Arc<CoordinationFn>>,
    },
}

impl CoordinationMode {
    /// Parallel mode with the given strategy, no timeout, no reducer.
    pub fn parallel(aggregation: AggregationStrategy) -> Self {
        CoordinationMode::Parallel {
            aggregation,
            agent_timeout: None,
            reducer: None,
        }
    }

    /// Debate mode with the team-level round cap and no judge.
    pub fn debate() -> Self {
        CoordinationMode::Debate {
            rounds: None,
            judge: None,
        }
    }

    /// Supervisor mode with the first configured agent coordinating.
    pub fn supervisor() -> Self {
        CoordinationMode::Supervisor { supervisor: None }
    }

    /// Custom mode driven by `coordination_fn`.
    pub fn custom(coordination_fn: Arc<CoordinationFn>) -> Self {
        CoordinationMode::Custom {
            coordination_fn: Some(coordination_fn),
        }
    }

    /// The mode's tag, without its payload.
    pub fn kind(&self) -> CoordinationKind {
        match self {
            CoordinationMode::Sequential => CoordinationKind::Sequential,
            CoordinationMode::Parallel { .. } => CoordinationKind::Parallel,
            CoordinationMode::Debate { .. } => CoordinationKind::Debate,
            CoordinationMode::Supervisor { .. } => CoordinationKind::Supervisor,
            CoordinationMode::Custom { .. } => CoordinationKind::Custom,
        }
    }
}

impl std::fmt::Debug for CoordinationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoordinationMode::{}", self.kind())
    }
}

/// The closed set of coordination mode tags.
///
/// Configuration layers parse mode strings through [`FromStr`]; anything
/// outside the closed set is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationKind {
    Sequential,
    Parallel,
    Debate,
    Supervisor,
    Custom,
}

impl std::fmt::Display for CoordinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            CoordinationKind::Sequential => "sequential",
            CoordinationKind::Parallel => "parallel",
            CoordinationKind::Debate => "debate",
            CoordinationKind::Supervisor => "supervisor",
            CoordinationKind::Custom => "custom",
        };
        f.write_str(tag)
    }
}

impl FromStr for CoordinationKind {
    type Err = TeamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sequential" => Ok(CoordinationKind::Sequential),
            "parallel" => Ok(CoordinationKind::Parallel),
            "debate" => Ok(CoordinationKind::Debate),
            "supervisor" => Ok(CoordinationKind::Supervisor),
            "custom" => Ok(CoordinationKind::Custom),
            other => Err(TeamError::UnknownMode(other.to_string())),
        }
    }
}

/// The synthesized outcome of a team run.
#[derive(Debug, Clone)]
pub struct TeamResult {
    /// The single output the mode produced.
    pub final_output: String,

    /// Every invocation whose output was actually used/counted under the
    /// mode's failure policy. Failed calls never appear here.
    pub agent_results: Vec<AgentResponse>,

    /// How many rounds actually ran.
    pub rounds: usize,

    /// Combined usage of all counted invocations.
    pub total_usage: Usage,
}

impl TeamResult {
    /// Usage aggregated per agent over the counted invocations.
    pub fn usage_by_agent(&self) -> UsageStats {
        UsageStats::from_results(&self.agent_results)
    }
}

/// Configuration for building a [`Team`].
#[derive(Clone)]
pub struct TeamConfig {
    /// The team's name, used in trace names and logs.
    pub name: String,

    /// The agents, in the order that sequencing, aggregation ties, and
    /// supervisor fallback all respect.
    pub agents: Vec<AgentRole>,

    /// The coordination policy and its payload.
    pub mode: CoordinationMode,

    /// Round cap for multi-round modes.
    pub max_rounds: usize,

    /// Caller lifecycle hooks.
    pub hooks: Option<Arc<dyn TeamHooks>>,

    /// Observability capability; when present, runs are traced.
    pub tracer: Option<Arc<dyn Tracer>>,
}

impl TeamConfig {
    /// A named, empty, sequential team with engine-default rounds.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            mode: CoordinationMode::Sequential,
            max_rounds: EngineConfig::default().default_max_rounds,
            hooks: None,
            tracer: None,
        }
    }

    /// Adds a plain agent, auto-wrapped with the `"member"` role.
    pub fn agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(AgentRole::member(agent));
        self
    }

    /// Adds an agent with an explicit role.
    pub fn agent_role(mut self, role: AgentRole) -> Self {
        self.agents.push(role);
        self
    }

    /// Sets the coordination mode.
    pub fn mode(mut self, mode: CoordinationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the round cap.
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the lifecycle hooks.
    pub fn hooks(mut self, hooks: Arc<dyn TeamHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Sets the tracer.
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Applies engine-wide defaults: the round cap, and the parallel agent
    /// timeout when the mode hasn't set one.
    pub fn with_defaults(mut self, config: &EngineConfig) -> Self {
        self.max_rounds = config.default_max_rounds;
        if let CoordinationMode::Parallel { agent_timeout, .. } = &mut self.mode {
            if agent_timeout.is_none() {
                *agent_timeout = config.agent_timeout;
            }
        }
        self
    }
}

/// Per-run options for [`Team::run_with`].
#[derive(Clone, Default)]
pub struct TeamRunOptions {
    /// External cancellation signal, forwarded into agent invocations and
    /// polled by debate mode between rounds.
    pub signal: Option<CancellationToken>,
}

/// A validated team, ready to run.
pub struct Team {
    name: String,
    agents: Vec<AgentRole>,
    mode: CoordinationMode,
    max_rounds: usize,
    hooks: Option<Arc<dyn TeamHooks>>,
    tracer: Option<Arc<dyn Tracer>>,
}

/// Validates a configuration and builds a [`Team`].
///
/// Configuration errors surface here, before any agent can run: an empty
/// agent list, custom mode without a coordination function, or a supervisor
/// name that matches no agent.
pub fn create_team(config: TeamConfig) -> Result<Team> {
    if config.agents.is_empty() {
        return Err(TeamError::EmptyTeam);
    }

    match &config.mode {
        CoordinationMode::Custom {
            coordination_fn: None,
        } => return Err(TeamError::MissingCoordinationFn),
        CoordinationMode::Parallel {
            aggregation: AggregationStrategy::Custom,
            reducer: None,
            ..
        } => return Err(TeamError::MissingReducer),
        CoordinationMode::Supervisor {
            supervisor: Some(name),
        } => {
            if !config.agents.iter().any(|r| r.name() == name.as_str()) {
                return Err(TeamError::UnknownAgent { name: name.clone() });
            }
        }
        _ => {}
    }

    Ok(Team {
        name: config.name,
        agents: config.agents,
        mode: config.mode,
        max_rounds: config.max_rounds,
        hooks: config.hooks,
        tracer: config.tracer,
    })
}

impl Team {
    /// The team's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The team's agents, in configured order.
    pub fn agents(&self) -> &[AgentRole] {
        &self.agents
    }

    /// Runs the team on `input` with default options.
    pub async fn run(&self, input: impl Into<String>) -> Result<TeamResult> {
        self.run_with(input, TeamRunOptions::default()).await
    }

    /// Runs the team on `input`.
    ///
    /// With a tracer configured, opens trace `team:<name>` and a root
    /// `team-run` span, and wraps the hooks so rounds and agent invocations
    /// get nested spans. The root span closes `ok` on success and `error`
    /// on failure; either way the trace ends and the runner's result,
    /// including the original error unchanged, is returned.
    pub async fn run_with(
        &self,
        input: impl Into<String>,
        options: TeamRunOptions,
    ) -> Result<TeamResult> {
        let input = input.into();
        let signal = options.signal;
        info!(team = %self.name, mode = %self.mode.kind(), "starting team run");

        let Some(tracer) = &self.tracer else {
            return match &self.hooks {
                Some(hooks) => self.dispatch(&input, hooks.as_ref(), signal.as_ref()).await,
                None => self.dispatch(&input, &NoopHooks, signal.as_ref()).await,
            };
        };

        let trace = tracer.start_trace(
            &format!("team:{}", self.name),
            json!({
                "team": self.name,
                "coordination_mode": self.mode.kind().to_string(),
                "input": input,
            }),
        );
        let root = tracer.start_span("team-run", None, json!({}));
        let traced = TracedHooks::new(self.hooks.clone(), tracer.clone(), root.clone());

        let result = self.dispatch(&input, &traced, signal.as_ref()).await;

        match &result {
            Ok(res) => tracer.end_span(
                &root,
                SpanStatus::Ok,
                json!({
                    "rounds": res.rounds,
                    "total_tokens": res.total_usage.total_tokens,
                }),
            ),
            Err(err) => {
                traced.abandon_open_spans(err);
                tracer.end_span(
                    &root,
                    SpanStatus::Error,
                    json!({ "error": err.to_string() }),
                );
            }
        }
        tracer.end_trace(&trace);

        result
    }

    async fn dispatch(
        &self,
        input: &str,
        hooks: &dyn TeamHooks,
        signal: Option<&CancellationToken>,
    ) -> Result<TeamResult> {
        match &self.mode {
            CoordinationMode::Sequential => {
                sequential::run_sequential(&self.agents, input, hooks, signal).await
            }
            CoordinationMode::Parallel {
                aggregation,
                agent_timeout,
                reducer,
            } => {
                parallel::run_parallel(
                    &self.agents,
                    input,
                    *aggregation,
                    *agent_timeout,
                    reducer.as_deref(),
                    hooks,
                    signal,
                )
                .await
            }
            CoordinationMode::Debate { rounds, judge } => {
                debate::run_debate(
                    &self.agents,
                    input,
                    rounds.unwrap_or(self.max_rounds),
                    judge.as_ref(),
                    hooks,
                    signal,
                )
                .await
            }
            CoordinationMode::Supervisor { supervisor } => {
                supervisor::run_supervisor(
                    &self.agents,
                    supervisor.as_deref(),
                    input,
                    self.max_rounds,
                    hooks,
                    signal,
                )
                .await
            }
            CoordinationMode::Custom { coordination_fn } => {
                let coordination_fn = coordination_fn
                    .as_ref()
                    .ok_or(TeamError::MissingCoordinationFn)?;
                custom::run_custom(&self.agents, input, coordination_fn.as_ref()).await
            }
        }
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("agents", &self.agents.len())
            .field("max_rounds", &self.max_rounds)
            .finish()
    }
}

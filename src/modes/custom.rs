//! User-supplied coordination: the engine hands over the agents and a
//! fresh run context, then passes the function's result through verbatim.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::agent::AgentRole;
use crate::comms::TeamContext;
use crate::error::Result;
use crate::team::TeamResult;

/// The future a coordination function returns.
pub type CoordinationFuture = Pin<Box<dyn Future<Output = Result<TeamResult>> + Send>>;

/// A user-supplied coordination strategy.
///
/// Receives the team's agents, the task input, and a fresh [`TeamContext`]
/// whose blackboard and message bus live exactly as long as this run. The
/// engine performs no implicit looping: round and result bookkeeping is the
/// function's own business.
pub type CoordinationFn =
    dyn Fn(Vec<AgentRole>, String, TeamContext) -> CoordinationFuture + Send + Sync;

/// Delegates the whole run to the coordination function.
pub(crate) async fn run_custom(
    agents: &[AgentRole],
    input: &str,
    coordination_fn: &CoordinationFn,
) -> Result<TeamResult> {
    info!(agents = agents.len(), "delegating to custom coordination");

    let context = TeamContext::new();
    coordination_fn(agents.to_vec(), input.to_string(), context).await
}

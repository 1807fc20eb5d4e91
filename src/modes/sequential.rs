//! Sequential pipeline: each agent's output feeds the next agent's input.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::{AgentRole, RunOptions};
use crate::error::Result;
use crate::team::{TeamHooks, TeamResult};
use crate::usage::Usage;

/// Runs agents once each, strictly in configured order.
///
/// The first agent receives the original input; every subsequent agent
/// receives the previous agent's response text. Any agent error fires
/// `on_error` and fails the whole run. Always a single round.
pub(crate) async fn run_sequential(
    agents: &[AgentRole],
    input: &str,
    hooks: &dyn TeamHooks,
    signal: Option<&CancellationToken>,
) -> Result<TeamResult> {
    info!(agents = agents.len(), "starting sequential pipeline");

    let options = RunOptions::with_signal(signal.cloned());
    let mut results = Vec::with_capacity(agents.len());
    let mut current_input = input.to_string();

    hooks.on_round_start(1);

    for role in agents {
        let name = role.name().to_string();
        debug!(agent = %name, "dispatching pipeline stage");
        hooks.on_agent_start(&name, &current_input);

        match role.agent.run(&current_input, options.clone()).await {
            Ok(response) => {
                hooks.on_agent_end(&name, &response);
                current_input = response.text.clone();
                results.push(response);
            }
            Err(err) => {
                hooks.on_error(&err);
                return Err(err);
            }
        }
    }

    hooks.on_round_end(1, &results);

    let final_output = results
        .last()
        .map(|r| r.text.clone())
        .unwrap_or_default();
    let total_usage = Usage::sum_of(&results);

    Ok(TeamResult {
        final_output,
        agent_results: results,
        rounds: 1,
        total_usage,
    })
}

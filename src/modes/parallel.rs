//! Concurrent fan-out: every agent gets the same input, survivors are
//! aggregated.

use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{AgentResponse, AgentRole, RunOptions};
use crate::aggregate::{aggregate, AggregationStrategy, Reducer};
use crate::error::{Result, TeamError};
use crate::team::{TeamHooks, TeamResult};
use crate::usage::Usage;

/// Runs all agents concurrently on the identical input.
///
/// Failures and timeouts are isolated per agent: they fire `on_error` once
/// each and are excluded from the results and the usage total, without
/// aborting siblings. Surviving responses keep the original configuration
/// order regardless of completion order, then feed the aggregation
/// strategy. Always a single round.
///
/// When `agent_timeout` is set, each call is spawned as a task and the
/// runner stops waiting once the timer fires. The spawned call itself is
/// not cancelled and may keep consuming resources until it finishes on its
/// own.
pub(crate) async fn run_parallel(
    agents: &[AgentRole],
    input: &str,
    aggregation: AggregationStrategy,
    agent_timeout: Option<Duration>,
    reducer: Option<&Reducer>,
    hooks: &dyn TeamHooks,
    signal: Option<&CancellationToken>,
) -> Result<TeamResult> {
    info!(
        agents = agents.len(),
        strategy = %aggregation,
        "starting parallel fan-out"
    );

    let options = RunOptions::with_signal(signal.cloned());

    hooks.on_round_start(1);

    let mut calls = Vec::with_capacity(agents.len());
    for role in agents {
        let name = role.name().to_string();
        hooks.on_agent_start(&name, input);
        calls.push(invoke_one(
            role.clone(),
            input.to_string(),
            agent_timeout,
            options.clone(),
        ));
    }

    // Join preserves configuration order, not completion order.
    let outcomes = join_all(calls).await;

    let mut survivors: Vec<AgentResponse> = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Ok(response) => {
                debug!(agent = %response.agent_name, "agent completed");
                let name = response.agent_name.clone();
                hooks.on_agent_end(&name, &response);
                survivors.push(response);
            }
            Err(err) => {
                warn!(error = %err, "agent excluded from aggregation");
                hooks.on_error(&err);
            }
        }
    }

    let final_output = aggregate(aggregation, &survivors, reducer)?;

    hooks.on_round_end(1, &survivors);

    let total_usage = Usage::sum_of(&survivors);
    Ok(TeamResult {
        final_output,
        agent_results: survivors,
        rounds: 1,
        total_usage,
    })
}

/// One wrapped agent call.
///
/// Without a timeout the call runs inline in the join. With a timeout it is
/// spawned so that an expired timer only abandons the join handle; the task
/// keeps running detached.
async fn invoke_one(
    role: AgentRole,
    input: String,
    timeout: Option<Duration>,
    options: RunOptions,
) -> Result<AgentResponse> {
    let name = role.name().to_string();

    match timeout {
        None => role.agent.run(&input, options).await,
        Some(limit) => {
            let agent = role.agent.clone();
            let handle =
                tokio::spawn(async move { agent.run(&input, options).await });

            match tokio::time::timeout(limit, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(TeamError::AgentFailed {
                    agent: name,
                    message: join_err.to_string(),
                }),
                Err(_elapsed) => Err(TeamError::AgentTimeout {
                    agent: name,
                    ms: limit.as_millis() as u64,
                }),
            }
        }
    }
}

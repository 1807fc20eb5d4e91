//! Multi-round debate with convergence detection and an optional judge.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::{Agent, AgentResponse, AgentRole, RunOptions};
use crate::aggregate::merge_outputs;
use crate::error::Result;
use crate::team::{TeamHooks, TeamResult};
use crate::usage::Usage;

/// One argument made during the debate.
struct Argument {
    round: usize,
    agent: String,
    text: String,
}

impl Argument {
    fn render(&self) -> String {
        format!("[Round {} - {}]: {}", self.round, self.agent, self.text)
    }
}

/// Runs up to `rounds` sequential debate rounds.
///
/// Each round every agent argues once, seeing the original input plus the
/// chronological history of all prior rounds. The debate ends early when
/// all agents produce identical trimmed text in the same round
/// (`on_consensus` fires) or when the cancellation signal is observed
/// between rounds (the accumulated results are returned, not an error).
/// Any agent error fails the whole run.
///
/// When the rounds run out without convergence, a configured judge reads
/// the full transcript and its text becomes the final output; without a
/// judge the final output is the last round merged as `[agent]: text`
/// entries.
pub(crate) async fn run_debate(
    agents: &[AgentRole],
    input: &str,
    rounds: usize,
    judge: Option<&Arc<dyn Agent>>,
    hooks: &dyn TeamHooks,
    signal: Option<&CancellationToken>,
) -> Result<TeamResult> {
    info!(agents = agents.len(), rounds, "starting debate");

    let options = RunOptions::with_signal(signal.cloned());
    let mut history: Vec<Argument> = Vec::new();
    let mut all_results: Vec<AgentResponse> = Vec::new();
    let mut rounds_run = 0;
    let mut aborted = false;

    for round in 1..=rounds {
        if signal.is_some_and(|s| s.is_cancelled()) {
            info!(round, "debate cancelled between rounds");
            aborted = true;
            break;
        }

        hooks.on_round_start(round);

        let mut round_results: Vec<AgentResponse> = Vec::with_capacity(agents.len());
        for role in agents {
            let name = role.name().to_string();
            let prompt = build_round_prompt(input, &history, round);
            hooks.on_agent_start(&name, &prompt);

            match role.agent.run(&prompt, options.clone()).await {
                Ok(response) => {
                    hooks.on_agent_end(&name, &response);
                    round_results.push(response);
                }
                Err(err) => {
                    hooks.on_error(&err);
                    return Err(err);
                }
            }
        }

        hooks.on_round_end(round, &round_results);
        rounds_run = round;

        let consensus = converged(&round_results);
        all_results.extend(round_results.iter().cloned());

        if let Some(text) = consensus {
            debug!(round, "debate converged");
            hooks.on_consensus(round, &text);
            let total_usage = Usage::sum_of(&all_results);
            return Ok(TeamResult {
                final_output: text,
                agent_results: all_results,
                rounds: round,
                total_usage,
            });
        }

        for response in &round_results {
            history.push(Argument {
                round,
                agent: response.agent_name.clone(),
                text: response.text.clone(),
            });
        }
    }

    // No consensus. A judge settles a debate that ran its full course; an
    // aborted debate just returns what it accumulated.
    let final_output = match judge {
        Some(judge) if !aborted => {
            let prompt = build_judge_prompt(input, &history);
            let name = judge.name().to_string();
            hooks.on_agent_start(&name, &prompt);

            match judge.run(&prompt, options).await {
                Ok(response) => {
                    hooks.on_agent_end(&name, &response);
                    let text = response.text.clone();
                    all_results.push(response);
                    text
                }
                Err(err) => {
                    hooks.on_error(&err);
                    return Err(err);
                }
            }
        }
        _ if rounds_run == 0 => String::new(),
        _ => {
            let start = all_results.len().saturating_sub(agents.len());
            merge_outputs(&all_results[start..])
        }
    };

    let total_usage = Usage::sum_of(&all_results);
    Ok(TeamResult {
        final_output,
        agent_results: all_results,
        rounds: rounds_run,
        total_usage,
    })
}

/// The common trimmed text if every agent in the round produced it.
///
/// A round with at most one participant is trivially converged.
fn converged(round_results: &[AgentResponse]) -> Option<String> {
    let mut texts = round_results.iter().map(|r| r.text.trim());
    let first = texts.next()?;
    if texts.all(|t| t == first) {
        Some(first.to_string())
    } else {
        None
    }
}

fn build_round_prompt(input: &str, history: &[Argument], round: usize) -> String {
    if history.is_empty() {
        return format!("{}\n\nProvide your initial argument.", input);
    }

    let transcript = history
        .iter()
        .map(Argument::render)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nDebate so far:\n{}\n\nConsider the arguments above and provide your argument for round {}.",
        input, transcript, round
    )
}

fn build_judge_prompt(input: &str, history: &[Argument]) -> String {
    let transcript = history
        .iter()
        .map(Argument::render)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nFull debate transcript:\n{}\n\nAs the judge, review the debate and provide the final answer.",
        input, transcript
    )
}

//! Supervisor-led delegation: a coordinator directs workers through
//! text-embedded directives.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{AgentResponse, AgentRole, RunOptions};
use crate::error::{Result, TeamError};
use crate::team::{TeamHooks, TeamResult};
use crate::usage::Usage;

const DELEGATE_MARKER: &str = "[DELEGATE:";
const FINAL_MARKER: &str = "[FINAL]";

/// A directive embedded in a coordinator response.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    Delegate { worker: String, instructions: String },
    Final { answer: String },
}

/// Runs the supervisor loop.
///
/// The coordinator is the agent named by `supervisor`, else the first in
/// the list; everyone else is an addressable worker. Each round the
/// coordinator sees the original task plus (from round 2) the previous
/// round's worker outputs, and its response is scanned for
/// `[DELEGATE: <worker>] <instructions>` and `[FINAL] <answer>` directives.
///
/// Worker failure never fails the run: an unknown worker name or a worker
/// error becomes feedback text the coordinator sees next round, after an
/// `on_error` call. A `[FINAL]` answer ends the loop; so does a response
/// with no directives at all. If `[FINAL]` never appears the loop stops at
/// `max_rounds` with the coordinator's latest text. A coordinator failure
/// does fail the run.
pub(crate) async fn run_supervisor(
    agents: &[AgentRole],
    supervisor: Option<&str>,
    input: &str,
    max_rounds: usize,
    hooks: &dyn TeamHooks,
    signal: Option<&CancellationToken>,
) -> Result<TeamResult> {
    let coordinator = match supervisor {
        Some(name) => agents
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| TeamError::UnknownAgent {
                name: name.to_string(),
            })?,
        None => &agents[0],
    };
    let coordinator_name = coordinator.name().to_string();

    let workers: HashMap<&str, &AgentRole> = agents
        .iter()
        .filter(|r| r.name() != coordinator_name)
        .map(|r| (r.name(), r))
        .collect();

    info!(
        coordinator = %coordinator_name,
        workers = workers.len(),
        "starting supervisor loop"
    );

    let options = RunOptions::with_signal(signal.cloned());
    let preamble = build_preamble(input, agents, &coordinator_name);

    let mut all_results: Vec<AgentResponse> = Vec::new();
    let mut previous_round: Vec<String> = Vec::new();
    let mut latest_text = String::new();
    let mut final_answer: Option<String> = None;
    let mut rounds_run = 0;

    for round in 1..=max_rounds {
        hooks.on_round_start(round);
        rounds_run = round;

        let coordinator_input = if previous_round.is_empty() {
            preamble.clone()
        } else {
            format!(
                "{}\n\nResults from the previous round:\n{}",
                preamble,
                previous_round.join("\n")
            )
        };

        hooks.on_agent_start(&coordinator_name, &coordinator_input);
        let response = match coordinator
            .agent
            .run(&coordinator_input, options.clone())
            .await
        {
            Ok(response) => {
                hooks.on_agent_end(&coordinator_name, &response);
                response
            }
            Err(err) => {
                hooks.on_error(&err);
                return Err(err);
            }
        };

        latest_text = response.text.clone();
        let mut round_results = vec![response.clone()];
        all_results.push(response);

        let directives = parse_directives(&latest_text);
        debug!(round, directives = directives.len(), "parsed coordinator response");

        // A [FINAL] answer ends the loop even when the same response also
        // delegates; the pending delegations are not dispatched.
        if let Some(answer) = directives.iter().find_map(|d| match d {
            Directive::Final { answer } => Some(answer.clone()),
            _ => None,
        }) {
            hooks.on_round_end(round, &round_results);
            final_answer = Some(answer);
            break;
        }

        let delegations: Vec<_> = directives
            .into_iter()
            .filter_map(|d| match d {
                Directive::Delegate {
                    worker,
                    instructions,
                } => Some((worker, instructions)),
                Directive::Final { .. } => None,
            })
            .collect();

        if delegations.is_empty() {
            hooks.on_round_end(round, &round_results);
            final_answer = Some(latest_text.clone());
            break;
        }

        previous_round.clear();
        for (worker_name, instructions) in delegations {
            match workers.get(worker_name.as_str()) {
                None => {
                    let err = TeamError::UnknownAgent {
                        name: worker_name.clone(),
                    };
                    warn!(worker = %worker_name, "delegation to unknown worker");
                    previous_round.push(format!("[{}]: Error: {}", worker_name, err));
                    hooks.on_error(&err);
                }
                Some(worker) => {
                    hooks.on_agent_start(&worker_name, &instructions);
                    match worker.agent.run(&instructions, options.clone()).await {
                        Ok(response) => {
                            hooks.on_agent_end(&worker_name, &response);
                            previous_round
                                .push(format!("[{}]: {}", worker_name, response.text));
                            round_results.push(response.clone());
                            all_results.push(response);
                        }
                        Err(err) => {
                            warn!(worker = %worker_name, error = %err, "worker failed");
                            previous_round
                                .push(format!("[{}]: Error: {}", worker_name, err));
                            hooks.on_error(&err);
                        }
                    }
                }
            }
        }

        hooks.on_round_end(round, &round_results);
    }

    let final_output = final_answer.unwrap_or(latest_text);
    let total_usage = Usage::sum_of(&all_results);

    Ok(TeamResult {
        final_output,
        agent_results: all_results,
        rounds: rounds_run,
        total_usage,
    })
}

/// The coordinator's standing instructions: the task, the roster of
/// delegatable workers, and the directive protocol.
fn build_preamble(input: &str, agents: &[AgentRole], coordinator_name: &str) -> String {
    let roster = agents
        .iter()
        .filter(|r| r.name() != coordinator_name && r.can_delegate)
        .map(|r| match &r.description {
            Some(description) => format!("- {}: {}", r.name(), description),
            None => format!("- {} ({})", r.name(), r.role),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nYou coordinate the following workers:\n{}\n\n\
         To delegate work, respond with [DELEGATE: <worker>] followed by instructions.\n\
         When the task is complete, respond with [FINAL] followed by the answer.",
        input, roster
    )
}

/// Scans a coordinator response for directives.
///
/// Marker-based string scanning: each directive's payload runs from the end
/// of its marker to the start of the next marker (or the end of the text).
/// A `[DELEGATE:` marker without a closing `]` is ignored as plain text.
fn parse_directives(text: &str) -> Vec<Directive> {
    let mut markers: Vec<(usize, bool)> = Vec::new(); // (position, is_final)
    for (pos, _) in text.match_indices(DELEGATE_MARKER) {
        markers.push((pos, false));
    }
    for (pos, _) in text.match_indices(FINAL_MARKER) {
        markers.push((pos, true));
    }
    markers.sort_unstable_by_key(|(pos, _)| *pos);

    let mut directives = Vec::new();
    for (idx, &(pos, is_final)) in markers.iter().enumerate() {
        let payload_end = markers
            .get(idx + 1)
            .map(|&(next, _)| next)
            .unwrap_or(text.len());

        if is_final {
            let answer = text[pos + FINAL_MARKER.len()..payload_end].trim();
            directives.push(Directive::Final {
                answer: answer.to_string(),
            });
        } else {
            let rest = &text[pos + DELEGATE_MARKER.len()..payload_end];
            let Some(close) = rest.find(']') else {
                continue;
            };
            let worker = rest[..close].trim();
            if worker.is_empty() {
                continue;
            }
            let instructions = rest[close + 1..].trim();
            directives.push(Directive::Delegate {
                worker: worker.to_string(),
                instructions: instructions.to_string(),
            });
        }
    }
    directives
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::test_support::ScriptedAgent;
    use crate::team::NoopHooks;

    fn member(agent: Arc<ScriptedAgent>) -> AgentRole {
        AgentRole::member(agent)
    }

    #[test]
    fn test_parse_single_delegation() {
        let directives = parse_directives("[DELEGATE: researcher] find recent papers");
        assert_eq!(
            directives,
            vec![Directive::Delegate {
                worker: "researcher".to_string(),
                instructions: "find recent papers".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_multiple_directives_in_order() {
        let text = "Plan:\n[DELEGATE: a] task one\n[DELEGATE: b] task two";
        let directives = parse_directives(text);
        assert_eq!(directives.len(), 2);
        assert_eq!(
            directives[1],
            Directive::Delegate {
                worker: "b".to_string(),
                instructions: "task two".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_final() {
        let directives = parse_directives("[FINAL] all done here");
        assert_eq!(
            directives,
            vec![Directive::Final {
                answer: "all done here".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_ignores_malformed_delegate() {
        assert!(parse_directives("[DELEGATE: broken with no close").is_empty());
        assert!(parse_directives("plain text, no directives").is_empty());
    }

    #[tokio::test]
    async fn test_delegate_then_final() {
        let coordinator = Arc::new(
            ScriptedAgent::new("boss")
                .reply("[DELEGATE: researcher] dig into the topic")
                .reply("[FINAL] done"),
        );
        let researcher = Arc::new(ScriptedAgent::new("researcher").reply("findings"));
        let agents = vec![member(coordinator.clone()), member(researcher.clone())];

        let result = run_supervisor(&agents, None, "task", 10, &NoopHooks, None)
            .await
            .unwrap();

        assert_eq!(result.final_output, "done");
        assert_eq!(result.agent_results.len(), 3);
        assert_eq!(result.rounds, 2);
        assert_eq!(result.total_usage.total_tokens, 45);

        // The worker got the instructions, and the coordinator saw the
        // worker's output in round 2.
        assert_eq!(researcher.inputs(), vec!["dig into the topic"]);
        assert!(coordinator.inputs()[1].contains("[researcher]: findings"));
    }

    #[tokio::test]
    async fn test_directiveless_response_is_final() {
        let coordinator = Arc::new(ScriptedAgent::new("boss").reply("just the answer"));
        let worker = Arc::new(ScriptedAgent::new("helper"));
        let agents = vec![member(coordinator), member(worker.clone())];

        let result = run_supervisor(&agents, None, "task", 10, &NoopHooks, None)
            .await
            .unwrap();

        assert_eq!(result.final_output, "just the answer");
        assert_eq!(result.rounds, 1);
        assert_eq!(result.agent_results.len(), 1);
        assert!(worker.inputs().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_worker_becomes_feedback() {
        let coordinator = Arc::new(
            ScriptedAgent::new("boss")
                .reply("[DELEGATE: ghost] do something")
                .reply("[FINAL] recovered"),
        );
        let worker = Arc::new(ScriptedAgent::new("real"));
        let agents = vec![member(coordinator.clone()), member(worker)];

        let result = run_supervisor(&agents, None, "task", 10, &NoopHooks, None)
            .await
            .unwrap();

        assert_eq!(result.final_output, "recovered");
        // Only coordinator calls recorded; the failed delegation fed back.
        assert_eq!(result.agent_results.len(), 2);
        assert!(coordinator.inputs()[1].contains("[ghost]: Error:"));
        assert!(coordinator.inputs()[1].contains("No agent named \"ghost\""));
    }

    #[tokio::test]
    async fn test_worker_failure_becomes_feedback() {
        let coordinator = Arc::new(
            ScriptedAgent::new("boss")
                .reply("[DELEGATE: flaky] try this")
                .reply("[FINAL] moved on"),
        );
        let flaky = Arc::new(ScriptedAgent::new("flaky").fail("crash"));
        let agents = vec![member(coordinator.clone()), member(flaky)];

        let result = run_supervisor(&agents, None, "task", 10, &NoopHooks, None)
            .await
            .unwrap();

        assert_eq!(result.final_output, "moved on");
        assert!(coordinator.inputs()[1].contains("[flaky]: Error:"));
    }

    #[tokio::test]
    async fn test_final_wins_over_delegation_in_same_response() {
        let coordinator = Arc::new(
            ScriptedAgent::new("boss").reply("[DELEGATE: helper] keep going\n[FINAL] stop here"),
        );
        let helper = Arc::new(ScriptedAgent::new("helper"));
        let agents = vec![member(coordinator), member(helper.clone())];

        let result = run_supervisor(&agents, None, "task", 10, &NoopHooks, None)
            .await
            .unwrap();

        assert_eq!(result.final_output, "stop here");
        assert!(helper.inputs().is_empty());
    }

    #[tokio::test]
    async fn test_round_cap_returns_latest_text() {
        let coordinator = Arc::new(
            ScriptedAgent::new("boss")
                .reply("[DELEGATE: helper] step one")
                .reply("[DELEGATE: helper] step two"),
        );
        let helper = Arc::new(ScriptedAgent::new("helper").reply("one").reply("two"));
        let agents = vec![member(coordinator), member(helper)];

        let result = run_supervisor(&agents, None, "task", 2, &NoopHooks, None)
            .await
            .unwrap();

        assert_eq!(result.final_output, "[DELEGATE: helper] step two");
        assert_eq!(result.rounds, 2);
        assert_eq!(result.agent_results.len(), 4);
    }

    #[tokio::test]
    async fn test_explicit_supervisor_selection() {
        let worker = Arc::new(ScriptedAgent::new("w").reply("did it"));
        let boss = Arc::new(
            ScriptedAgent::new("boss")
                .reply("[DELEGATE: w] go")
                .reply("[FINAL] ok"),
        );
        // Coordinator is not first in the list.
        let agents = vec![member(worker), member(boss)];

        let result = run_supervisor(&agents, Some("boss"), "task", 10, &NoopHooks, None)
            .await
            .unwrap();
        assert_eq!(result.final_output, "ok");

        let err = run_supervisor(&agents, Some("nobody"), "task", 10, &NoopHooks, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TeamError::UnknownAgent { .. }));
    }
}

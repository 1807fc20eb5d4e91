//! # Aggregation Strategies
//!
//! Pure functions that combine the surviving responses of a parallel
//! fan-out into one final output. The runner hands over responses in the
//! original configuration order, so "first" here always means first in the
//! team's agent list, never first to complete.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::agent::AgentResponse;
use crate::error::{Result, TeamError};

/// A caller-supplied reducer for the `Custom` strategy.
pub type Reducer = dyn Fn(&[AgentResponse]) -> String + Send + Sync;

/// How parallel-mode responses are combined into one output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationStrategy {
    /// The text of the earliest-in-config-order surviving response.
    FirstWins,

    /// The most common trimmed text; ties resolve to the group seen first.
    MajorityVote,

    /// All responses joined as `[agent]: text` blocks.
    #[default]
    MergeAll,

    /// A caller-supplied reducer over the surviving responses.
    Custom,
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            AggregationStrategy::FirstWins => "first-wins",
            AggregationStrategy::MajorityVote => "majority-vote",
            AggregationStrategy::MergeAll => "merge-all",
            AggregationStrategy::Custom => "custom",
        };
        f.write_str(tag)
    }
}

/// Joins responses as `[agent]: text` entries separated by blank lines.
///
/// Also used by debate mode to merge a final round.
pub fn merge_outputs(responses: &[AgentResponse]) -> String {
    responses
        .iter()
        .map(|r| format!("[{}]: {}", r.agent_name, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Combines surviving responses according to `strategy`.
///
/// An empty survivor list yields `""` for every strategy. The `Custom`
/// strategy requires `reducer`; selecting it without one is an error.
pub fn aggregate(
    strategy: AggregationStrategy,
    responses: &[AgentResponse],
    reducer: Option<&Reducer>,
) -> Result<String> {
    if responses.is_empty() {
        return Ok(String::new());
    }

    match strategy {
        AggregationStrategy::FirstWins => Ok(responses[0].text.clone()),
        AggregationStrategy::MajorityVote => Ok(majority_vote(responses)),
        AggregationStrategy::MergeAll => Ok(merge_outputs(responses)),
        AggregationStrategy::Custom => match reducer {
            Some(reduce) => Ok(reduce(responses)),
            None => Err(TeamError::MissingReducer),
        },
    }
}

/// Groups responses by trimmed text and returns the largest group's text.
///
/// The tally map is insertion-ordered, so on a tie the first group to reach
/// the maximum count wins.
fn majority_vote(responses: &[AgentResponse]) -> String {
    let mut tally: IndexMap<&str, usize> = IndexMap::new();
    for response in responses {
        *tally.entry(response.text.trim()).or_insert(0) += 1;
    }

    let mut winner = "";
    let mut best = 0;
    for (text, count) in &tally {
        if *count > best {
            winner = text;
            best = *count;
        }
    }
    winner.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::Usage;

    fn resp(name: &str, text: &str) -> AgentResponse {
        AgentResponse::text_only(name, text, Usage::new(10, 5))
    }

    #[test]
    fn test_first_wins_takes_config_order() {
        let responses = vec![resp("a", "X"), resp("c", "Z")];
        let out = aggregate(AggregationStrategy::FirstWins, &responses, None).unwrap();
        assert_eq!(out, "X");
    }

    #[test]
    fn test_majority_vote_picks_largest_group() {
        let responses = vec![resp("a", "A"), resp("b", "B"), resp("c", "A")];
        let out = aggregate(AggregationStrategy::MajorityVote, &responses, None).unwrap();
        assert_eq!(out, "A");
    }

    #[test]
    fn test_majority_vote_tie_goes_to_first_group() {
        let responses = vec![resp("a", "A"), resp("b", "B")];
        let out = aggregate(AggregationStrategy::MajorityVote, &responses, None).unwrap();
        assert_eq!(out, "A");
    }

    #[test]
    fn test_majority_vote_trims_before_grouping() {
        let responses = vec![resp("a", "  yes "), resp("b", "yes"), resp("c", "no")];
        let out = aggregate(AggregationStrategy::MajorityVote, &responses, None).unwrap();
        assert_eq!(out, "yes");
    }

    #[test]
    fn test_merge_all_labels_every_entry() {
        let responses = vec![resp("A", "Result A"), resp("B", "Result B")];
        let out = aggregate(AggregationStrategy::MergeAll, &responses, None).unwrap();
        assert_eq!(out, "[A]: Result A\n\n[B]: Result B");
    }

    #[test]
    fn test_custom_reducer() {
        let responses = vec![resp("a", "1"), resp("b", "2")];
        let reduce = |rs: &[AgentResponse]| {
            rs.iter()
                .map(|r| r.text.as_str())
                .collect::<Vec<_>>()
                .join("+")
        };
        let out = aggregate(AggregationStrategy::Custom, &responses, Some(&reduce)).unwrap();
        assert_eq!(out, "1+2");
    }

    #[test]
    fn test_custom_without_reducer_errors() {
        let responses = vec![resp("a", "1")];
        let err = aggregate(AggregationStrategy::Custom, &responses, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Aggregation strategy \"custom\" requires a customReducer function."
        );
    }

    #[test]
    fn test_empty_survivors_yield_empty_string() {
        for strategy in [
            AggregationStrategy::FirstWins,
            AggregationStrategy::MajorityVote,
            AggregationStrategy::MergeAll,
            AggregationStrategy::Custom,
        ] {
            let out = aggregate(strategy, &[], None).unwrap();
            assert_eq!(out, "");
        }
    }

    #[test]
    fn test_strategy_tags() {
        assert_eq!(AggregationStrategy::default(), AggregationStrategy::MergeAll);
        assert_eq!(AggregationStrategy::MajorityVote.to_string(), "majority-vote");

        let parsed: AggregationStrategy = serde_json::from_str("\"first-wins\"").unwrap();
        assert_eq!(parsed, AggregationStrategy::FirstWins);
    }
}

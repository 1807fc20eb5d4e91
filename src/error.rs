//! Error types for the team coordination engine

use thiserror::Error;

/// Result type alias used throughout the engine
pub type Result<T> = std::result::Result<T, TeamError>;

/// Main error type for team coordination
#[derive(Debug, Error)]
pub enum TeamError {
    /// A team was configured with no agents
    #[error("Team must have at least one agent")]
    EmptyTeam,

    /// A coordination mode tag was not recognized
    #[error("Unknown coordination mode: \"{0}\"")]
    UnknownMode(String),

    /// Custom mode was selected without a coordination function
    #[error("Custom coordination mode requires a coordination function")]
    MissingCoordinationFn,

    /// Custom aggregation was selected without a reducer
    #[error("Aggregation strategy \"custom\" requires a customReducer function.")]
    MissingReducer,

    /// An agent invocation failed
    #[error("Agent \"{agent}\" failed: {message}")]
    AgentFailed { agent: String, message: String },

    /// An agent did not respond within the configured timeout
    #[error("Agent \"{agent}\" timed out after {ms}ms")]
    AgentTimeout { agent: String, ms: u64 },

    /// A name did not resolve to any agent registered with the team
    #[error("No agent named \"{name}\" is registered with this team")]
    UnknownAgent { name: String },

    /// Configuration file error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl TeamError {
    /// The name of the agent an invocation error is attributed to, if any.
    pub fn agent_name(&self) -> Option<&str> {
        match self {
            TeamError::AgentFailed { agent, .. } => Some(agent),
            TeamError::AgentTimeout { agent, .. } => Some(agent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TeamError::UnknownMode("banana".to_string());
        assert_eq!(err.to_string(), "Unknown coordination mode: \"banana\"");

        let err = TeamError::AgentTimeout {
            agent: "researcher".to_string(),
            ms: 250,
        };
        assert_eq!(err.to_string(), "Agent \"researcher\" timed out after 250ms");

        let err = TeamError::MissingReducer;
        assert_eq!(
            err.to_string(),
            "Aggregation strategy \"custom\" requires a customReducer function."
        );
    }

    #[test]
    fn test_agent_name_attribution() {
        let err = TeamError::AgentFailed {
            agent: "writer".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.agent_name(), Some("writer"));

        assert_eq!(TeamError::EmptyTeam.agent_name(), None);
    }

    #[test]
    fn test_result_type() {
        fn might_fail(ok: bool) -> Result<&'static str> {
            if ok {
                Ok("fine")
            } else {
                Err(TeamError::EmptyTeam)
            }
        }

        assert!(might_fail(true).is_ok());
        assert!(matches!(might_fail(false), Err(TeamError::EmptyTeam)));
    }
}

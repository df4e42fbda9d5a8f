//! Error types for flow orchestration

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for flow orchestration
#[derive(Debug, Error)]
pub enum Error {
    /// Flow string could not be parsed into at least one named stage
    #[error("malformed flow: {0}")]
    MalformedFlow(String),

    /// Parsed flow references agent names absent from the registry
    #[error("invalid flow: unknown agent(s): {}", .0.join(", "))]
    InvalidFlow(Vec<String>),

    /// Registry lookup miss
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// An agent's execute call failed; caught at the orchestrator boundary
    #[error("agent {agent} failed: {message}")]
    AgentExecution {
        /// Name of the agent that failed
        agent: String,
        /// Failure description
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a malformed flow error
    pub fn malformed_flow(msg: impl Into<String>) -> Self {
        Self::MalformedFlow(msg.into())
    }

    /// Create an agent execution error
    pub fn agent_execution(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AgentExecution {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The unknown agent names carried by an `InvalidFlow` error, if any
    pub fn unknown_agents(&self) -> Option<&[String]> {
        match self {
            Self::InvalidFlow(names) => Some(names),
            _ => None,
        }
    }
}

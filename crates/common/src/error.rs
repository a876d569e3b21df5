//! Error types for the coordination core.

use thiserror::Error;

use crate::agent::AgentId;
use crate::tier::TierId;

#[derive(Error, Debug)]
pub enum UaoError {
    #[error("No available agents for tier {tier}")]
    NoAvailableAgents { tier: TierId },

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Gateway for tier {0} has not been aligned")]
    NotAligned(String),

    #[error("Agent {0} is already assigned")]
    AlreadyAssigned(AgentId),

    #[error("Invalid agent id: {0}")]
    InvalidAgentId(String),

    #[error("Invalid pool: {0}")]
    InvalidPool(String),

    #[error("Invalid sector assignment: {0}")]
    InvalidAssignment(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UaoError {
    /// Whether the caller may retry the same request later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoAvailableAgents { .. })
    }
}

pub type Result<T> = std::result::Result<T, UaoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_exhaustion_is_recoverable() {
        let exhausted = UaoError::NoAvailableAgents {
            tier: TierId::from("team"),
        };
        assert!(exhausted.is_recoverable());
        assert!(!UaoError::UnknownTier("ghost".into()).is_recoverable());
        assert!(!UaoError::SecretNotFound("UAO_TIERS".into()).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = UaoError::AlreadyAssigned(AgentId::new(3, 7));
        assert_eq!(err.to_string(), "Agent wfa-3-7 is already assigned");

        let err = UaoError::NoAvailableAgents {
            tier: TierId::from("enterprise"),
        };
        assert_eq!(err.to_string(), "No available agents for tier enterprise");
    }
}

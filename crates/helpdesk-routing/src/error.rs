//! Error types for the routing engine

use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{AgentId, DomainError, TicketId, TransitionError};
use crate::ports::outbound::RepositoryError;

/// Routing engine error type
#[derive(Error, Debug)]
pub enum RoutingError {
    /// Unknown ticket id
    #[error("ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// Unknown agent id
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// Forced assignment target is not active
    #[error("agent is inactive: {0}")]
    AgentInactive(AgentId),

    /// Agent id already present in the registry
    #[error("agent already registered: {0}")]
    DuplicateAgent(AgentId),

    /// No active agent could take the ticket
    #[error("no agent available")]
    NoAgentAvailable,

    /// Lifecycle guard rejected the operation
    #[error("invalid transition for ticket {ticket}: {source}")]
    InvalidTransition {
        ticket: TicketId,
        #[source]
        source: TransitionError,
    },

    /// Caller supplied an unusable argument
    #[error("invalid request: {0}")]
    Validation(String),

    /// Caller deadline passed before the unit of work began
    #[error("deadline exceeded before the operation started")]
    DeadlineExceeded,

    /// Persistence failure; the unit of work was rolled back
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    /// Value object validation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RoutingError {
    pub(crate) fn transition(ticket: &TicketId, source: TransitionError) -> Self {
        RoutingError::InvalidTransition {
            ticket: ticket.clone(),
            source,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoutingError::Storage(_) | RoutingError::DeadlineExceeded)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RoutingError::TicketNotFound(_) | RoutingError::AgentNotFound(_))
    }

    /// Resolution attempted on a ticket that is already resolved
    pub fn is_already_resolved(&self) -> bool {
        matches!(
            self,
            RoutingError::InvalidTransition {
                source: TransitionError::AlreadyResolved,
                ..
            }
        )
    }
}

/// Result type for the routing engine
pub type Result<T> = std::result::Result<T, RoutingError>;

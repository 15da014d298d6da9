//! Domain Layer
//!
//! - **Value Objects**: identifiers and classification enums
//! - **Aggregates**: `Ticket` (lifecycle state machine) and agent profiles
//! - **Events**: what happened to a ticket, for the notification collaborator
//! - **Services**: stateless reporting over tickets and agents

pub mod aggregates;
pub mod events;
pub mod services;
pub mod value_objects;

pub use aggregates::*;
pub use events::TicketEvent;
pub use value_objects::*;

/// Validation errors raised by value objects
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid agent id: {0}")]
    InvalidAgentId(String),

    #[error("invalid ticket id: {0}")]
    InvalidTicketId(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown priority: {0}")]
    UnknownPriority(String),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("unknown export filter: {0}")]
    UnknownExportFilter(String),
}

//! Ports layer
//!
//! Hexagonal architecture: outbound ports are the persistence and
//! publication interfaces the engine depends on.

pub mod outbound;

pub use outbound::{AuditRepository, EventPublisher, RepositoryError, TicketRepository};

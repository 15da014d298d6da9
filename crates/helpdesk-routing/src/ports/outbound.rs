//! Outbound ports (Repository traits)
//!
//! Hexagonal architecture: these are the interfaces that infrastructure must
//! implement. Each call is expected to be individually atomic; the engine
//! composes them into units of work and compensates on failure.

use async_trait::async_trait;

use crate::audit::{AuditEntry, AuditEntryId, AuditRecord};
use crate::domain::{AgentId, Ticket, TicketEvent, TicketId};

/// Repository result type
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Ticket repository port
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Insert a new ticket; fails with `Conflict` if the id exists
    async fn insert(&self, ticket: &Ticket) -> RepoResult<()>;

    /// Find ticket by ID
    async fn find_by_id(&self, id: &TicketId) -> RepoResult<Option<Ticket>>;

    /// Overwrite an existing ticket
    async fn save(&self, ticket: &Ticket) -> RepoResult<()>;

    /// Remove a ticket; only used to undo an insert
    async fn delete(&self, id: &TicketId) -> RepoResult<()>;

    /// Tickets without an assignee, oldest first
    async fn find_unassigned(&self) -> RepoResult<Vec<Ticket>>;

    /// Tickets referencing an agent, oldest first
    async fn find_by_assignee(&self, agent_id: &AgentId) -> RepoResult<Vec<Ticket>>;

    /// Every ticket, oldest first
    async fn list(&self) -> RepoResult<Vec<Ticket>>;
}

/// Audit log port (append-only)
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Append an entry and return its id
    async fn append(&self, entry: AuditEntry) -> RepoResult<AuditEntryId>;

    /// Entries for a ticket, oldest first
    async fn list_for_ticket(&self, ticket_id: &TicketId) -> RepoResult<Vec<AuditRecord>>;

    /// Total number of entries
    async fn count(&self) -> RepoResult<u64>;
}

/// Event publisher port
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish domain events
    async fn publish(&self, events: Vec<TicketEvent>) -> RepoResult<()>;
}

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

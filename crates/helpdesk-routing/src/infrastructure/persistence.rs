//! In-memory repository implementations
//!
//! Backing stores for tests, the CLI and embedded use. A durable store
//! implements the same ports.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::audit::{AuditEntry, AuditEntryId, AuditRecord};
use crate::domain::{AgentId, Ticket, TicketEvent, TicketId};
use crate::ports::outbound::{AuditRepository, EventPublisher, RepoResult, RepositoryError, TicketRepository};

/// In-memory ticket repository
#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: DashMap<TicketId, Ticket>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<F>(&self, filter: F) -> Vec<Ticket>
    where
        F: Fn(&Ticket) -> bool,
    {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        tickets.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
        tickets
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn insert(&self, ticket: &Ticket) -> RepoResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.tickets.entry(ticket.id().clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(ticket.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(ticket.clone());
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: &TicketId) -> RepoResult<Option<Ticket>> {
        Ok(self.tickets.get(id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, ticket: &Ticket) -> RepoResult<()> {
        match self.tickets.get_mut(ticket.id()) {
            Some(mut entry) => {
                *entry = ticket.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(ticket.id().to_string())),
        }
    }

    async fn delete(&self, id: &TicketId) -> RepoResult<()> {
        self.tickets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_unassigned(&self) -> RepoResult<Vec<Ticket>> {
        Ok(self.collect(|t| t.assignee().is_none() && !t.is_resolved()))
    }

    async fn find_by_assignee(&self, agent_id: &AgentId) -> RepoResult<Vec<Ticket>> {
        Ok(self.collect(|t| t.assignee() == Some(agent_id)))
    }

    async fn list(&self) -> RepoResult<Vec<Ticket>> {
        Ok(self.collect(|_| true))
    }
}

/// In-memory append-only audit log
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditRecord>>,
    sequence: AtomicU64,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> RepoResult<AuditEntryId> {
        let id = AuditEntryId::new(self.sequence.fetch_add(1, Ordering::AcqRel) + 1);
        self.entries.write().push(AuditRecord { id, entry });
        Ok(id)
    }

    async fn list_for_ticket(&self, ticket_id: &TicketId) -> RepoResult<Vec<AuditRecord>> {
        let mut records: Vec<AuditRecord> = self
            .entries
            .read()
            .iter()
            .filter(|record| &record.entry.ticket_id == ticket_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.entry
                .recorded_at
                .cmp(&b.entry.recorded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.entries.read().len() as u64)
    }
}

/// Publisher that keeps every event in memory
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<TicketEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TicketEvent> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<TicketEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, events: Vec<TicketEvent>) -> RepoResult<()> {
        self.events.lock().extend(events);
        Ok(())
    }
}

/// No-op event publisher
#[derive(Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _events: Vec<TicketEvent>) -> RepoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, AssignmentKind, Category, Priority};

    fn ticket() -> Ticket {
        Ticket::register(TicketId::generate("TKT"), Category::Billing, Priority::Low)
    }

    #[tokio::test]
    async fn test_ticket_repository_insert_and_find() {
        let repo = InMemoryTicketRepository::new();
        let t = ticket();

        repo.insert(&t).await.unwrap();
        assert!(matches!(repo.insert(&t).await, Err(RepositoryError::Conflict(_))));

        let found = repo.find_by_id(t.id()).await.unwrap().unwrap();
        assert_eq!(found.id(), t.id());
        assert_eq!(repo.find_unassigned().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_requires_existing() {
        let repo = InMemoryTicketRepository::new();
        assert!(matches!(repo.save(&ticket()).await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_assignee() {
        let repo = InMemoryTicketRepository::new();
        let agent = AgentId::new("balu").unwrap();
        let mut t = ticket();
        t.assign(agent.clone(), AssignmentKind::CapabilityMatch).unwrap();
        repo.insert(&t).await.unwrap();
        repo.insert(&ticket()).await.unwrap();

        assert_eq!(repo.find_by_assignee(&agent).await.unwrap().len(), 1);
        assert_eq!(repo.find_unassigned().await.unwrap().len(), 1);
        assert_eq!(repo.list().await.unwrap().len(), 2);

        repo.delete(t.id()).await.unwrap();
        assert!(repo.find_by_id(t.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audit_log_append_and_list() {
        let log = InMemoryAuditLog::new();
        let ticket_id = TicketId::new("TKT-1").unwrap();
        let other = TicketId::new("TKT-2").unwrap();

        for (ticket, agent) in [(&ticket_id, "leena"), (&other, "balu"), (&ticket_id, "lakshmi")] {
            log.append(AuditEntry::assignment(
                ticket.clone(),
                None,
                AgentId::new(agent).unwrap(),
                Actor::System,
                AssignmentKind::CapabilityMatch,
                "test",
            ))
            .await
            .unwrap();
        }

        let trail = log.list_for_ticket(&ticket_id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert!(trail[0].id < trail[1].id);
        assert_eq!(trail[1].entry.new_assignee.as_str(), "lakshmi");
        assert_eq!(log.count().await.unwrap(), 3);
    }
}

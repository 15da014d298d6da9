//! Shared fixtures for the engine integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use helpdesk_routing::infrastructure::{InMemoryAuditLog, InMemoryTicketRepository, RecordingEventPublisher};
use helpdesk_routing::ports::outbound::RepoResult;
use helpdesk_routing::{
    AgentConfig, AgentId, AuditEntry, AuditEntryId, AuditRecord, AuditRepository, Capability, EngineConfig,
    RepositoryError, RoutingEngine, Ticket, TicketId, TicketRepository,
};

pub fn agent(id: &str, name: &str, capabilities: &[Capability], ceiling: Option<u32>) -> AgentConfig {
    AgentConfig {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@support.test", id),
        capabilities: capabilities.to_vec(),
        ceiling,
        active: true,
    }
}

pub fn config(agents: Vec<AgentConfig>) -> EngineConfig {
    let mut config = EngineConfig::empty();
    config.agents = agents;
    config
}

pub fn id(agent: &str) -> AgentId {
    AgentId::new(agent).unwrap()
}

/// Ticket store whose writes can be made to fail or stall
#[derive(Default)]
pub struct FlakyTicketRepository {
    inner: InMemoryTicketRepository,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
}

impl FlakyTicketRepository {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn delay_writes(&self, delay: Duration) {
        self.write_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn check(&self) -> RepoResult<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::StorageError("ticket store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TicketRepository for FlakyTicketRepository {
    async fn insert(&self, ticket: &Ticket) -> RepoResult<()> {
        self.check().await?;
        self.inner.insert(ticket).await
    }

    async fn find_by_id(&self, id: &TicketId) -> RepoResult<Option<Ticket>> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, ticket: &Ticket) -> RepoResult<()> {
        self.check().await?;
        self.inner.save(ticket).await
    }

    async fn delete(&self, id: &TicketId) -> RepoResult<()> {
        self.inner.delete(id).await
    }

    async fn find_unassigned(&self) -> RepoResult<Vec<Ticket>> {
        self.inner.find_unassigned().await
    }

    async fn find_by_assignee(&self, agent_id: &AgentId) -> RepoResult<Vec<Ticket>> {
        self.inner.find_by_assignee(agent_id).await
    }

    async fn list(&self) -> RepoResult<Vec<Ticket>> {
        self.inner.list().await
    }
}

/// Audit log whose appends can be made to fail
#[derive(Default)]
pub struct FlakyAuditLog {
    inner: InMemoryAuditLog,
    fail_appends: AtomicBool,
}

impl FlakyAuditLog {
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditRepository for FlakyAuditLog {
    async fn append(&self, entry: AuditEntry) -> RepoResult<AuditEntryId> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(RepositoryError::StorageError("audit log unavailable".into()));
        }
        self.inner.append(entry).await
    }

    async fn list_for_ticket(&self, ticket_id: &TicketId) -> RepoResult<Vec<AuditRecord>> {
        self.inner.list_for_ticket(ticket_id).await
    }

    async fn count(&self) -> RepoResult<u64> {
        self.inner.count().await
    }
}

/// Engine plus handles on its ports
pub struct Harness {
    pub engine: RoutingEngine,
    pub tickets: Arc<FlakyTicketRepository>,
    pub audit: Arc<FlakyAuditLog>,
    pub events: Arc<RecordingEventPublisher>,
}

impl Harness {
    pub fn new(config: &EngineConfig) -> Self {
        let tickets = Arc::new(FlakyTicketRepository::default());
        let audit = Arc::new(FlakyAuditLog::default());
        let events = Arc::new(RecordingEventPublisher::new());
        let engine = RoutingEngine::new(config, tickets.clone(), audit.clone(), events.clone())
            .unwrap()
            .seeded(42);
        Self {
            engine,
            tickets,
            audit,
            events,
        }
    }

    pub async fn workload(&self, agent: &str) -> u32 {
        self.engine.get_agent_workloads().await[&id(agent)].current
    }

    pub async fn audit_count(&self) -> u64 {
        self.audit.count().await.unwrap()
    }

    /// Panics if any counter drifted from the ticket store
    pub async fn assert_consistent(&self) {
        let report = self.engine.reconcile_workloads(false).await.unwrap();
        assert!(report.is_consistent(), "workload drift: {:?}", report);
    }
}

//! Routing engine
//!
//! Application service tying the registry, routing policy, ledger, ticket
//! store and audit log together. Each ticket operation is one unit of work:
//!
//! 1. take the ticket's lock (operations on one ticket never interleave)
//! 2. honour the caller deadline, which can only abort before step 3
//! 3. enter the snapshot gate as a reader
//! 4. release, route, charge, save, audit; compensate on any failure
//! 5. leave the gate, then publish domain events
//!
//! Snapshot readers enter the gate as writers, so they only ever observe
//! whole units of work. Units on different tickets share the gate and run
//! in parallel; concurrent charges on one agent meet at its atomic counter.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::application::dto::*;
use crate::application::unit_of_work::UnitOfWork;
use crate::audit::{AuditEntry, AuditRecord};
use crate::config::EngineConfig;
use crate::domain::services::{AgentLoad, DashboardStats, DetailedAnalytics, ExportFilter, TicketExport, TicketStatsService};
use crate::domain::{
    Actor, AgentId, AgentProfile, AgentResponse, AgentSnapshot, AssignmentKind, Capability, Category, Priority,
    Ticket, TicketEvent, TicketId, TransitionError,
};
use crate::error::{Result, RoutingError};
use crate::infrastructure::{InMemoryAuditLog, InMemoryTicketRepository, NoOpEventPublisher};
use crate::ledger::{ChargeOutcome, LedgerInconsistency, WorkloadLedger};
use crate::ports::outbound::{AuditRepository, EventPublisher, TicketRepository};
use crate::registry::AgentRegistry;
use crate::routing::{RoutingDecision, RoutingPolicy};

const REASON_CREATED: &str = "ticket created";
const REASON_SWEEP: &str = "auto-assignment sweep";
const REASON_OFFBOARDED: &str = "agent off-boarded";

struct EngineInner {
    registry: Arc<AgentRegistry>,
    ledger: WorkloadLedger,
    policy: RoutingPolicy,
    tickets: Arc<dyn TicketRepository>,
    audit: Arc<dyn AuditRepository>,
    events: Arc<dyn EventPublisher>,
    locks: DashMap<TicketId, Arc<Mutex<()>>>,
    gate: RwLock<()>,
    rng: parking_lot::Mutex<StdRng>,
    id_prefix: String,
    max_charge_attempts: u32,
}

/// Ticket routing and workload balancing engine
///
/// Cheap to clone; clones share all state. A clone made with
/// [`RoutingEngine::with_deadline`] bounds how long its operations may wait
/// before starting.
#[derive(Clone)]
pub struct RoutingEngine {
    inner: Arc<EngineInner>,
    deadline: Option<Instant>,
}

/// Exclusive hold on one ticket; the lock table entry is pruned on drop
/// once nobody else is waiting for it
struct TicketLock<'a> {
    locks: &'a DashMap<TicketId, Arc<Mutex<()>>>,
    ticket_id: TicketId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TicketLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.ticket_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

struct UnitGuard<'a> {
    _ticket: TicketLock<'a>,
    gate: Option<RwLockReadGuard<'a, ()>>,
}

impl UnitGuard<'_> {
    /// Leave the snapshot gate while keeping the ticket lock
    fn leave_gate(&mut self) {
        self.gate.take();
    }
}

/// How one sweep unit ended
enum SweepOutcome {
    Assigned,
    Unassigned,
    /// Assigned or resolved by someone else since the sweep listed it
    Skipped,
}

impl RoutingEngine {
    /// Build an engine over the given ports and provision the configured roster
    ///
    /// Counters start at zero. Use [`RoutingEngine::open`] when the ticket
    /// store may already hold assigned tickets.
    pub fn new(
        config: &EngineConfig,
        tickets: Arc<dyn TicketRepository>,
        audit: Arc<dyn AuditRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(AgentRegistry::new());
        for (profile, active) in config.agent_profiles()? {
            registry.register(profile, active)?;
        }

        let inner = EngineInner {
            ledger: WorkloadLedger::new(Arc::clone(&registry)),
            registry,
            policy: config.routing_policy(),
            tickets,
            audit,
            events,
            locks: DashMap::new(),
            gate: RwLock::new(()),
            rng: parking_lot::Mutex::new(StdRng::from_entropy()),
            id_prefix: config.tickets.id_prefix.clone(),
            max_charge_attempts: config.routing.max_charge_attempts,
        };

        info!(
            agents = inner.registry.len(),
            guarantee_assignment = inner.policy.guarantees_assignment(),
            "routing engine ready"
        );

        Ok(Self {
            inner: Arc::new(inner),
            deadline: None,
        })
    }

    /// Build an engine and rebuild workload counters from the ticket store
    pub async fn open(
        config: &EngineConfig,
        tickets: Arc<dyn TicketRepository>,
        audit: Arc<dyn AuditRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        let engine = Self::new(config, tickets, audit, events)?;
        let report = engine.reconcile_workloads(true).await?;
        if !report.orphaned.is_empty() {
            warn!(orphaned = report.orphaned.len(), "tickets charged to unknown agents");
        }
        Ok(engine)
    }

    /// Engine backed by in-memory stores
    pub fn in_memory(config: &EngineConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(InMemoryTicketRepository::new()),
            Arc::new(InMemoryAuditLog::new()),
            Arc::new(NoOpEventPublisher),
        )
    }

    /// Reseed the Medium/Low tie-break generator
    pub fn seeded(self, seed: u64) -> Self {
        *self.inner.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    /// Handle whose operations abort with `DeadlineExceeded` if they cannot
    /// start before `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            deadline: Some(deadline),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.inner.registry
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.inner.policy
    }

    // =========================================================================
    // Ticket operations
    // =========================================================================

    /// Register a ticket and route it
    ///
    /// When nobody can take it the ticket is still stored, stays
    /// `Registered` and is returned with no assignee.
    pub async fn create_ticket_with_routing(&self, request: NewTicket) -> Result<CreatedTicket> {
        let mut ticket = Ticket::register(
            TicketId::generate(&self.inner.id_prefix),
            request.category,
            request.priority,
        )
        .with_title(request.title)
        .with_description(request.description)
        .with_requester(request.requester);

        let ticket_id = ticket.id().clone();
        let mut guard = self.enter(&ticket_id).await?;

        let mut uow = self.unit(&ticket_id);
        let result = self.create_steps(&mut uow, &mut ticket).await;
        let decision = match result {
            Ok(decision) => {
                uow.commit();
                decision
            }
            Err(e) => {
                uow.rollback().await;
                return Err(e);
            }
        };
        guard.leave_gate();

        match &decision {
            Some(d) => info!(ticket = %ticket_id, agent = %d.agent_id, kind = %d.kind, "ticket created and assigned"),
            None => warn!(ticket = %ticket_id, category = %ticket.category(), "no agent available, ticket queued"),
        }
        self.publish(ticket.take_events()).await;

        Ok(CreatedTicket {
            ticket_id,
            assignee: decision.as_ref().map(|d| d.agent_id.clone()),
            kind: decision.map(|d| d.kind),
            estimated_resolution: ticket.estimated_resolution(),
        })
    }

    async fn create_steps(&self, uow: &mut UnitOfWork<'_>, ticket: &mut Ticket) -> Result<Option<RoutingDecision>> {
        let decision = self.route_and_charge(ticket.category(), ticket.priority(), None)?;
        if let Some(d) = &decision {
            uow.charged(&d.agent_id);
            ticket
                .assign(d.agent_id.clone(), d.kind)
                .map_err(|e| RoutingError::transition(ticket.id(), e))?;
        }

        let stored = without_events(ticket);
        uow.insert_ticket(&stored).await?;

        if let Some(d) = &decision {
            uow.append_audit(AuditEntry::assignment(
                ticket.id().clone(),
                None,
                d.agent_id.clone(),
                Actor::System,
                d.kind,
                REASON_CREATED,
            ))
            .await?;
        }
        Ok(decision)
    }

    /// Move a ticket to `target`, or to a routed agent other than the
    /// current assignee when `target` is `None`
    pub async fn reassign(
        &self,
        ticket_id: &TicketId,
        target: Option<AgentId>,
        actor: Actor,
        reason: &str,
    ) -> Result<ReassignOutcome> {
        if reason.trim().is_empty() {
            return Err(RoutingError::Validation("a reassignment reason is required".into()));
        }

        let mut guard = self.enter(ticket_id).await?;
        let mut ticket = self.load(ticket_id).await?;
        if ticket.is_resolved() {
            return Err(RoutingError::transition(ticket_id, TransitionError::AlreadyResolved));
        }
        if let Some(target) = &target {
            let agent = self.inner.registry.get(target)?;
            if !agent.active {
                return Err(RoutingError::AgentInactive(target.clone()));
            }
            if ticket.assignee() == Some(target) {
                return Err(RoutingError::transition(
                    ticket_id,
                    TransitionError::SameAssignee(target.clone()),
                ));
            }
        }

        let mut uow = self.unit(ticket_id);
        let result = self
            .reassign_steps(&mut uow, &mut ticket, target.as_ref(), &actor, reason)
            .await;
        let outcome = match result {
            Ok(outcome) => {
                uow.commit();
                outcome
            }
            Err(e) => {
                uow.rollback().await;
                return Err(e);
            }
        };
        guard.leave_gate();

        info!(
            ticket = %ticket_id,
            from = ?outcome.previous_assignee.as_ref().map(AgentId::as_str),
            to = %outcome.new_assignee,
            kind = %outcome.kind,
            %actor,
            "ticket reassigned"
        );
        self.publish(ticket.take_events()).await;
        Ok(outcome)
    }

    async fn reassign_steps(
        &self,
        uow: &mut UnitOfWork<'_>,
        ticket: &mut Ticket,
        target: Option<&AgentId>,
        actor: &Actor,
        reason: &str,
    ) -> Result<ReassignOutcome> {
        let before = ticket.clone();
        let previous = ticket.charged_agent().cloned();
        if let Some(previous) = &previous {
            uow.release(previous)?;
        }

        let decision = match target {
            Some(target) => match self.inner.ledger.try_charge(target, false)? {
                ChargeOutcome::Charged(_) => RoutingDecision {
                    agent_id: target.clone(),
                    kind: AssignmentKind::Forced,
                },
                _ => return Err(RoutingError::AgentInactive(target.clone())),
            },
            None => self
                .route_and_charge(ticket.category(), ticket.priority(), previous.as_ref())?
                .ok_or(RoutingError::NoAgentAvailable)?,
        };
        uow.charged(&decision.agent_id);

        ticket
            .assign(decision.agent_id.clone(), decision.kind)
            .map_err(|e| RoutingError::transition(ticket.id(), e))?;
        uow.save_ticket(&before, &without_events(ticket)).await?;

        let audit_entry = uow
            .append_audit(AuditEntry::assignment(
                ticket.id().clone(),
                previous.clone(),
                decision.agent_id.clone(),
                actor.clone(),
                decision.kind,
                reason,
            ))
            .await?;

        Ok(ReassignOutcome {
            ticket_id: ticket.id().clone(),
            previous_assignee: previous,
            new_assignee: decision.agent_id,
            kind: decision.kind,
            audit_entry,
        })
    }

    /// Resolve an open ticket and release its assignee
    pub async fn resolve_ticket(&self, ticket_id: &TicketId, resolution_note: &str) -> Result<ResolvedTicket> {
        let mut guard = self.enter(ticket_id).await?;
        let mut ticket = self.load(ticket_id).await?;
        let before = ticket.clone();

        let released_agent = ticket
            .resolve(resolution_note)
            .map_err(|e| RoutingError::transition(ticket_id, e))?;

        let mut uow = self.unit(ticket_id);
        let result = match uow.release(&released_agent) {
            Ok(()) => uow.save_ticket(&before, &without_events(&ticket)).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => uow.commit(),
            Err(e) => {
                uow.rollback().await;
                return Err(e);
            }
        }
        guard.leave_gate();

        info!(ticket = %ticket_id, agent = %released_agent, "ticket resolved");
        self.publish(ticket.take_events()).await;

        Ok(ResolvedTicket {
            ticket_id: ticket_id.clone(),
            released_agent,
            resolved_at: ticket.resolved_at().unwrap_or_else(Utc::now),
        })
    }

    /// Append an agent response; the first one starts work on the ticket
    pub async fn record_response(&self, command: RecordResponse) -> Result<Ticket> {
        if command.text.trim().is_empty() {
            return Err(RoutingError::Validation("response text must not be empty".into()));
        }
        if !self.inner.registry.contains(&command.agent_id) {
            return Err(RoutingError::AgentNotFound(command.agent_id));
        }

        let ticket_id = command.ticket_id;
        let mut guard = self.enter(&ticket_id).await?;
        let mut ticket = self.load(&ticket_id).await?;
        let before = ticket.clone();

        let started = ticket
            .record_response(AgentResponse {
                agent_id: command.agent_id.clone(),
                text: command.text,
                kind: command.kind,
                created_at: Utc::now(),
            })
            .map_err(|e| RoutingError::transition(&ticket_id, e))?;

        let mut uow = self.unit(&ticket_id);
        if let Err(e) = uow.save_ticket(&before, &without_events(&ticket)).await {
            uow.rollback().await;
            return Err(e);
        }
        uow.commit();
        guard.leave_gate();

        debug!(ticket = %ticket_id, agent = %command.agent_id, started, "response recorded");
        self.publish(ticket.take_events()).await;
        Ok(ticket)
    }

    /// Route every unassigned ticket concurrently
    ///
    /// Tickets are independent units: one failure neither blocks nor undoes
    /// another, it just leaves that ticket in the queue.
    pub async fn auto_assign_all_unassigned(&self, actor: Actor) -> Result<SweepReport> {
        let queued: Vec<TicketId> = self
            .inner
            .tickets
            .find_unassigned()
            .await?
            .iter()
            .map(|t| t.id().clone())
            .collect();

        let mut tasks = JoinSet::new();
        for ticket_id in queued.iter().cloned() {
            let engine = self.clone();
            let actor = actor.clone();
            tasks.spawn(async move {
                let outcome = engine.sweep_one(&ticket_id, &actor).await;
                (ticket_id, outcome)
            });
        }

        let mut report = SweepReport::default();
        let mut placed = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ticket_id, Ok(SweepOutcome::Assigned))) => {
                    report.assigned += 1;
                    placed.insert(ticket_id);
                }
                Ok((ticket_id, Ok(SweepOutcome::Skipped))) => {
                    placed.insert(ticket_id);
                }
                Ok((_, Ok(SweepOutcome::Unassigned))) => {}
                Ok((ticket_id, Err(e))) => {
                    warn!(ticket = %ticket_id, error = %e, "sweep could not assign ticket");
                }
                Err(e) => error!(error = %e, "sweep task failed"),
            }
        }

        report.still_unassigned = queued.into_iter().filter(|id| !placed.contains(id)).collect();
        info!(
            assigned = report.assigned,
            remaining = report.still_unassigned.len(),
            %actor,
            "auto-assignment sweep finished"
        );
        Ok(report)
    }

    async fn sweep_one(&self, ticket_id: &TicketId, actor: &Actor) -> Result<SweepOutcome> {
        let mut guard = self.enter(ticket_id).await?;
        let mut ticket = self.load(ticket_id).await?;
        if ticket.assignee().is_some() || ticket.is_resolved() {
            return Ok(SweepOutcome::Skipped);
        }

        let mut uow = self.unit(ticket_id);
        let result = self.assign_steps(&mut uow, &mut ticket, actor, REASON_SWEEP).await;
        let outcome = match result {
            Ok(outcome) => {
                uow.commit();
                outcome
            }
            Err(e) => {
                uow.rollback().await;
                return Err(e);
            }
        };
        guard.leave_gate();

        self.publish(ticket.take_events()).await;
        Ok(outcome)
    }

    /// Route an unassigned ticket; `Unassigned` when nobody can take it
    async fn assign_steps(
        &self,
        uow: &mut UnitOfWork<'_>,
        ticket: &mut Ticket,
        actor: &Actor,
        reason: &str,
    ) -> Result<SweepOutcome> {
        let before = ticket.clone();
        let Some(decision) = self.route_and_charge(ticket.category(), ticket.priority(), None)? else {
            return Ok(SweepOutcome::Unassigned);
        };
        uow.charged(&decision.agent_id);

        ticket
            .assign(decision.agent_id.clone(), decision.kind)
            .map_err(|e| RoutingError::transition(ticket.id(), e))?;
        uow.save_ticket(&before, &without_events(ticket)).await?;
        uow.append_audit(AuditEntry::assignment(
            ticket.id().clone(),
            None,
            decision.agent_id.clone(),
            actor.clone(),
            decision.kind,
            reason,
        ))
        .await?;

        debug!(ticket = %ticket.id(), agent = %decision.agent_id, kind = %decision.kind, "ticket assigned");
        Ok(SweepOutcome::Assigned)
    }

    // =========================================================================
    // Agent administration
    // =========================================================================

    /// Dry-run the routing policy against the current registry
    pub fn select_agent(&self, category: Category, priority: Priority) -> Result<RoutingDecision> {
        let snapshot = self.inner.registry.snapshot();
        let mut rng = self.inner.rng.lock();
        self.inner
            .policy
            .select(category, priority, &snapshot, None, &mut *rng)
            .ok_or(RoutingError::NoAgentAvailable)
    }

    pub fn register_agent(&self, profile: AgentProfile, active: bool) -> Result<()> {
        if profile.capabilities.is_empty() {
            return Err(RoutingError::Validation(format!("agent {} has no capabilities", profile.id)));
        }
        self.inner.registry.register(profile, active)
    }

    /// Toggle routing eligibility; returns the previous value
    pub fn set_agent_active(&self, agent_id: &AgentId, active: bool) -> Result<bool> {
        self.inner.registry.set_active(agent_id, active)
    }

    /// Deactivate an agent and move its open tickets elsewhere
    ///
    /// Tickets nobody else can take go back to the unassigned queue.
    pub async fn offboard_agent(&self, agent_id: &AgentId, actor: Actor) -> Result<OffboardReport> {
        self.inner.registry.set_active(agent_id, false)?;
        // units that charged the agent before deactivation must land first
        drop(self.inner.gate.write().await);

        let mut report = OffboardReport {
            agent_id: agent_id.clone(),
            reassigned: Vec::new(),
            unassigned: Vec::new(),
        };

        let held = self.inner.tickets.find_by_assignee(agent_id).await?;
        for ticket_id in held.iter().filter(|t| t.is_open()).map(|t| t.id().clone()) {
            let mut guard = self.enter(&ticket_id).await?;
            let mut ticket = self.load(&ticket_id).await?;
            if ticket.charged_agent() != Some(agent_id) {
                continue;
            }

            let mut uow = self.unit(&ticket_id);
            let result = self.offboard_steps(&mut uow, &mut ticket, agent_id, &actor).await;
            let moved_to = match result {
                Ok(moved_to) => {
                    uow.commit();
                    moved_to
                }
                Err(e) => {
                    uow.rollback().await;
                    return Err(e);
                }
            };
            guard.leave_gate();

            match moved_to {
                Some(to) => report.reassigned.push((ticket_id, to)),
                None => report.unassigned.push(ticket_id),
            }
            self.publish(ticket.take_events()).await;
        }

        info!(
            agent = %agent_id,
            reassigned = report.reassigned.len(),
            unassigned = report.unassigned.len(),
            %actor,
            "agent off-boarded"
        );
        Ok(report)
    }

    async fn offboard_steps(
        &self,
        uow: &mut UnitOfWork<'_>,
        ticket: &mut Ticket,
        agent_id: &AgentId,
        actor: &Actor,
    ) -> Result<Option<AgentId>> {
        let before = ticket.clone();
        uow.release(agent_id)?;

        let decision = self.route_and_charge(ticket.category(), ticket.priority(), Some(agent_id))?;
        let Some(decision) = decision else {
            ticket.unassign().map_err(|e| RoutingError::transition(ticket.id(), e))?;
            uow.save_ticket(&before, &without_events(ticket)).await?;
            return Ok(None);
        };
        uow.charged(&decision.agent_id);

        ticket
            .assign(decision.agent_id.clone(), decision.kind)
            .map_err(|e| RoutingError::transition(ticket.id(), e))?;
        uow.save_ticket(&before, &without_events(ticket)).await?;
        uow.append_audit(AuditEntry::assignment(
            ticket.id().clone(),
            Some(agent_id.clone()),
            decision.agent_id.clone(),
            actor.clone(),
            decision.kind,
            REASON_OFFBOARDED,
        ))
        .await?;
        Ok(Some(decision.agent_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Consistent view of every agent's workload
    pub async fn get_agent_workloads(&self) -> BTreeMap<AgentId, WorkloadView> {
        let _snapshot = self.inner.gate.write().await;
        self.inner
            .registry
            .snapshot()
            .into_iter()
            .map(|agent| {
                let view = WorkloadView {
                    current: agent.workload,
                    ceiling: agent.profile.ceiling,
                    active: agent.active,
                };
                (agent.profile.id, view)
            })
            .collect()
    }

    /// Registry snapshot taken between units of work
    pub async fn agents(&self) -> Vec<AgentSnapshot> {
        let _snapshot = self.inner.gate.write().await;
        self.inner.registry.snapshot()
    }

    pub async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket> {
        self.load(ticket_id).await
    }

    pub async fn list_unassigned(&self) -> Result<Vec<Ticket>> {
        Ok(self.inner.tickets.find_unassigned().await?)
    }

    pub async fn tickets_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Ticket>> {
        if !self.inner.registry.contains(agent_id) {
            return Err(RoutingError::AgentNotFound(agent_id.clone()));
        }
        Ok(self.inner.tickets.find_by_assignee(agent_id).await?)
    }

    pub async fn audit_trail(&self, ticket_id: &TicketId) -> Result<Vec<AuditRecord>> {
        Ok(self.inner.audit.list_for_ticket(ticket_id).await?)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let tickets = self.inner.tickets.list().await?;
        Ok(TicketStatsService::dashboard(&tickets))
    }

    /// Dashboard counters with per-agent history and recent activity
    pub async fn detailed_analytics(&self) -> Result<DetailedAnalytics> {
        let tickets = self.inner.tickets.list().await?;
        Ok(TicketStatsService::detailed(&tickets, Utc::now()))
    }

    /// Tickets matching `filter`, newest first
    pub async fn export(&self, filter: ExportFilter) -> Result<Vec<TicketExport>> {
        let tickets = self.inner.tickets.list().await?;
        debug!(%filter, total = tickets.len(), "exporting tickets");
        Ok(TicketStatsService::export(&tickets, filter))
    }

    pub async fn category_workload(&self) -> Result<BTreeMap<Capability, Vec<AgentLoad>>> {
        let _snapshot = self.inner.gate.write().await;
        let tickets = self.inner.tickets.list().await?;
        let agents = self.inner.registry.snapshot();
        Ok(TicketStatsService::category_workload(&agents, &tickets))
    }

    pub fn ledger_inconsistencies(&self) -> Vec<LedgerInconsistency> {
        self.inner.ledger.inconsistencies()
    }

    /// Compare counters against the ticket store; overwrite drifted
    /// counters when `repair` is set
    pub async fn reconcile_workloads(&self, repair: bool) -> Result<ReconcileReport> {
        let _snapshot = self.inner.gate.write().await;
        let tickets = self.inner.tickets.list().await?;
        let mut expected = TicketStatsService::expected_workloads(&tickets);

        let mut report = ReconcileReport::default();
        for agent_id in self.inner.registry.ids() {
            let recorded = self.inner.ledger.workload(&agent_id)?;
            let want = expected.remove(&agent_id).unwrap_or(0);
            if recorded != want {
                warn!(agent = %agent_id, recorded, expected = want, "workload drift");
                if repair {
                    self.inner.ledger.set(&agent_id, want)?;
                }
                report.drift.push(WorkloadDrift {
                    agent_id,
                    recorded,
                    expected: want,
                });
            }
        }

        // whatever is left in `expected` belongs to unregistered agents
        report.orphaned = tickets
            .iter()
            .filter(|t| t.charged_agent().is_some_and(|a| expected.contains_key(a)))
            .map(|t| t.id().clone())
            .collect();
        report.repaired = repair && !report.drift.is_empty();

        debug!(drift = report.drift.len(), orphaned = report.orphaned.len(), "workloads reconciled");
        Ok(report)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn unit(&self, ticket_id: &TicketId) -> UnitOfWork<'_> {
        UnitOfWork::begin(
            ticket_id.clone(),
            &self.inner.ledger,
            self.inner.tickets.as_ref(),
            self.inner.audit.as_ref(),
        )
    }

    /// Lock the ticket and enter the gate, or fail before anything changes
    async fn enter(&self, ticket_id: &TicketId) -> Result<UnitGuard<'_>> {
        self.check_deadline()?;

        let lock = self
            .inner
            .locks
            .entry(ticket_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let ticket = TicketLock {
            locks: &self.inner.locks,
            ticket_id: ticket_id.clone(),
            guard: Some(self.bounded(lock.lock_owned()).await?),
        };
        let gate = self.bounded(self.inner.gate.read()).await?;

        self.check_deadline()?;
        Ok(UnitGuard {
            _ticket: ticket,
            gate: Some(gate),
        })
    }

    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output> {
        match self.deadline {
            Some(deadline) => timeout_at(deadline, fut)
                .await
                .map_err(|_| RoutingError::DeadlineExceeded),
            None => Ok(fut.await),
        }
    }

    fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(RoutingError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    async fn load(&self, ticket_id: &TicketId) -> Result<Ticket> {
        self.inner
            .tickets
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| RoutingError::TicketNotFound(ticket_id.clone()))
    }

    /// Select and charge an agent
    ///
    /// A concurrent unit may fill the chosen agent or deactivate it between
    /// the snapshot and the charge; selection is then retried on a fresh
    /// snapshot. Only escape-valve picks are charged past the ceiling.
    ///
    /// Each ceiling loss means another agent filled up, so those retries
    /// are budgeted by roster size; deactivation races use
    /// `max_charge_attempts`. Exhausting either leaves the ticket unrouted.
    fn route_and_charge(
        &self,
        category: Category,
        priority: Priority,
        exclude: Option<&AgentId>,
    ) -> Result<Option<RoutingDecision>> {
        let mut ceiling_losses = 0;
        let mut inactive_losses = 0;
        let ceiling_budget = self.inner.registry.len() + 1;
        let inactive_budget = self.inner.max_charge_attempts.max(1);

        loop {
            let snapshot = self.inner.registry.snapshot();
            let decision = {
                let mut rng = self.inner.rng.lock();
                self.inner.policy.select(category, priority, &snapshot, exclude, &mut *rng)
            };
            let Some(decision) = decision else {
                return Ok(None);
            };

            let respect_ceiling = decision.kind != AssignmentKind::EscapeValve;
            match self.inner.ledger.try_charge(&decision.agent_id, respect_ceiling)? {
                ChargeOutcome::Charged(workload) => {
                    debug!(agent = %decision.agent_id, workload, "agent charged");
                    return Ok(Some(decision));
                }
                ChargeOutcome::AtCeiling => ceiling_losses += 1,
                ChargeOutcome::Inactive => inactive_losses += 1,
            }

            if ceiling_losses >= ceiling_budget || inactive_losses >= inactive_budget {
                warn!(%category, %priority, ceiling_losses, inactive_losses, "charge retries exhausted");
                return Ok(None);
            }
            debug!(agent = %decision.agent_id, ceiling_losses, inactive_losses, "charge lost a race, rerouting");
        }
    }

    async fn publish(&self, events: Vec<TicketEvent>) {
        if events.is_empty() {
            return;
        }
        let count = events.len();
        if let Err(e) = self.inner.events.publish(events).await {
            warn!(error = %e, count, "event publication failed");
        }
    }
}

/// Stored copy of a ticket; pending events stay with the caller
fn without_events(ticket: &Ticket) -> Ticket {
    let mut stored = ticket.clone();
    stored.take_events();
    stored
}

//! Unit of work with compensating actions
//!
//! Every step that touches shared state records how to undo itself. On
//! failure the recorded compensations run in reverse order, so a ticket
//! operation either lands completely or leaves no trace in the ledger or
//! the ticket store. The audit append is always the last fallible step and
//! therefore never needs undoing.

use tracing::{debug, error};

use crate::audit::{AuditEntry, AuditEntryId};
use crate::domain::{AgentId, Ticket, TicketId};
use crate::error::Result;
use crate::ledger::{Delta, WorkloadLedger};
use crate::ports::outbound::{AuditRepository, TicketRepository};

#[derive(Debug)]
enum Compensation {
    /// Undo a charge
    Release(AgentId),
    /// Undo a release
    Recharge(AgentId),
    /// Undo a save by writing the prior version back
    RestoreTicket(Box<Ticket>),
    /// Undo an insert
    DeleteTicket(TicketId),
}

pub(crate) struct UnitOfWork<'a> {
    ticket_id: TicketId,
    ledger: &'a WorkloadLedger,
    tickets: &'a dyn TicketRepository,
    audit: &'a dyn AuditRepository,
    compensations: Vec<Compensation>,
}

impl<'a> UnitOfWork<'a> {
    pub(crate) fn begin(
        ticket_id: TicketId,
        ledger: &'a WorkloadLedger,
        tickets: &'a dyn TicketRepository,
        audit: &'a dyn AuditRepository,
    ) -> Self {
        Self {
            ticket_id,
            ledger,
            tickets,
            audit,
            compensations: Vec::new(),
        }
    }

    /// Record a charge that was already applied to the ledger
    pub(crate) fn charged(&mut self, agent_id: &AgentId) {
        self.compensations.push(Compensation::Release(agent_id.clone()));
    }

    /// Release one unit from `agent_id`
    ///
    /// A clamped release changed nothing and so records nothing to undo.
    pub(crate) fn release(&mut self, agent_id: &AgentId) -> Result<()> {
        if self.ledger.try_release(agent_id)?.is_some() {
            self.compensations.push(Compensation::Recharge(agent_id.clone()));
        }
        Ok(())
    }

    pub(crate) async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.tickets.insert(ticket).await?;
        self.compensations.push(Compensation::DeleteTicket(ticket.id().clone()));
        Ok(())
    }

    /// Overwrite the stored ticket, remembering `previous` for rollback
    pub(crate) async fn save_ticket(&mut self, previous: &Ticket, ticket: &Ticket) -> Result<()> {
        self.tickets.save(ticket).await?;
        self.compensations
            .push(Compensation::RestoreTicket(Box::new(previous.clone())));
        Ok(())
    }

    pub(crate) async fn append_audit(&mut self, entry: AuditEntry) -> Result<AuditEntryId> {
        Ok(self.audit.append(entry).await?)
    }

    pub(crate) fn commit(self) {
        debug!(ticket = %self.ticket_id, steps = self.compensations.len(), "unit of work committed");
    }

    /// Undo every recorded step, newest first
    pub(crate) async fn rollback(self) {
        let ticket_id = self.ticket_id;
        for compensation in self.compensations.into_iter().rev() {
            let outcome: Result<()> = match &compensation {
                Compensation::Release(agent_id) => self.ledger.apply_delta(agent_id, Delta::Release).map(|_| ()),
                Compensation::Recharge(agent_id) => self.ledger.apply_delta(agent_id, Delta::Charge).map(|_| ()),
                Compensation::RestoreTicket(previous) => self.tickets.save(previous).await.map_err(Into::into),
                Compensation::DeleteTicket(id) => self.tickets.delete(id).await.map_err(Into::into),
            };
            if let Err(e) = outcome {
                error!(ticket = %ticket_id, ?compensation, error = %e, "compensation failed");
            }
        }
        debug!(ticket = %ticket_id, "unit of work rolled back");
    }
}

//! Data Transfer Objects (DTOs)
//!
//! Commands accepted by the engine and the results it hands back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditEntryId;
use crate::domain::{AgentId, AssignmentKind, Category, Priority, ResponseKind, TicketId};

// =============================================================================
// Commands
// =============================================================================

/// Classified ticket handed over by the intake collaborator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewTicket {
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub requester: Option<String>,
}

impl NewTicket {
    pub fn new(category: Category, priority: Priority) -> Self {
        Self {
            category,
            priority,
            ..Default::default()
        }
    }

    /// Build from raw classifier labels
    ///
    /// Unknown categories become `General`, unknown priorities `Medium`.
    pub fn from_labels(category: &str, priority: &str) -> Self {
        Self::new(Category::from_label(category), Priority::from_label(priority))
    }

    pub fn titled(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.title = title.into();
        self.description = description.into();
        self
    }

    pub fn requested_by(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub ticket_id: TicketId,
    pub agent_id: AgentId,
    pub text: String,
    pub kind: ResponseKind,
}

// =============================================================================
// Results
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatedTicket {
    pub ticket_id: TicketId,
    pub assignee: Option<AgentId>,
    pub kind: Option<AssignmentKind>,
    pub estimated_resolution: &'static str,
}

impl CreatedTicket {
    /// No agent was available; the ticket waits in the unassigned queue
    pub fn is_queued(&self) -> bool {
        self.assignee.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReassignOutcome {
    pub ticket_id: TicketId,
    pub previous_assignee: Option<AgentId>,
    pub new_assignee: AgentId,
    pub kind: AssignmentKind,
    pub audit_entry: AuditEntryId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedTicket {
    pub ticket_id: TicketId,
    pub released_agent: AgentId,
    pub resolved_at: DateTime<Utc>,
}

/// Live workload of one agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadView {
    pub current: u32,
    pub ceiling: Option<u32>,
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub assigned: usize,
    /// Tickets the sweep could not place, oldest first
    pub still_unassigned: Vec<TicketId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OffboardReport {
    pub agent_id: AgentId,
    pub reassigned: Vec<(TicketId, AgentId)>,
    /// Tickets returned to the unassigned queue
    pub unassigned: Vec<TicketId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkloadDrift {
    pub agent_id: AgentId,
    pub recorded: u32,
    pub expected: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub drift: Vec<WorkloadDrift>,
    /// Open tickets charged to agents missing from the registry
    pub orphaned: Vec<TicketId>,
    pub repaired: bool,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty() && self.orphaned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ticket_from_unknown_labels() {
        let ticket = NewTicket::from_labels("Warranty", "whenever");
        assert_eq!(ticket.category, Category::General);
        assert_eq!(ticket.priority, Priority::Medium);

        let ticket = NewTicket::from_labels("billing", "URGENT");
        assert_eq!(ticket.category, Category::Billing);
        assert_eq!(ticket.priority, Priority::Urgent);
    }
}

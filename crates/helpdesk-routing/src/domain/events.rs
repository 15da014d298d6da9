//! Domain Events
//!
//! Raised by the `Ticket` aggregate and published after a unit of work
//! commits. The notification collaborator consumes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{AgentId, AssignmentKind, Category, Priority, TicketId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TicketEvent {
    Created {
        ticket_id: TicketId,
        category: Category,
        priority: Priority,
        created_at: DateTime<Utc>,
    },

    Assigned {
        ticket_id: TicketId,
        agent_id: AgentId,
        kind: AssignmentKind,
        assigned_at: DateTime<Utc>,
    },

    Reassigned {
        ticket_id: TicketId,
        from_agent: AgentId,
        to_agent: AgentId,
        kind: AssignmentKind,
        reassigned_at: DateTime<Utc>,
    },

    Unassigned {
        ticket_id: TicketId,
        from_agent: AgentId,
        unassigned_at: DateTime<Utc>,
    },

    Started {
        ticket_id: TicketId,
        agent_id: AgentId,
        started_at: DateTime<Utc>,
    },

    Resolved {
        ticket_id: TicketId,
        agent_id: AgentId,
        resolved_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    pub fn ticket_id(&self) -> &TicketId {
        match self {
            TicketEvent::Created { ticket_id, .. }
            | TicketEvent::Assigned { ticket_id, .. }
            | TicketEvent::Reassigned { ticket_id, .. }
            | TicketEvent::Unassigned { ticket_id, .. }
            | TicketEvent::Started { ticket_id, .. }
            | TicketEvent::Resolved { ticket_id, .. } => ticket_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::Created { .. } => "ticket.created",
            TicketEvent::Assigned { .. } => "ticket.assigned",
            TicketEvent::Reassigned { .. } => "ticket.reassigned",
            TicketEvent::Unassigned { .. } => "ticket.unassigned",
            TicketEvent::Started { .. } => "ticket.started",
            TicketEvent::Resolved { .. } => "ticket.resolved",
        }
    }
}

//! Ticket Aggregate
//!
//! Owns the status lifecycle:
//!
//! ```text
//! Registered ──assign──▶ Assigned ──first response──▶ InProgress
//!     ▲                    │  ▲                           │
//!     └──── unassign ──────┘  └──────── reassign ─────────┤
//!                          │                              │
//!                          └────────── resolve ──────────▶ Resolved (terminal)
//! ```
//!
//! The aggregate only enforces the guards and records events; workload and
//! audit side effects belong to the unit of work that drives it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::events::TicketEvent;
use crate::domain::value_objects::{AgentId, AssignmentKind, Category, Priority, TicketId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    #[default]
    Registered,
    Assigned,
    InProgress,
    Resolved,
}

impl TicketStatus {
    /// Statuses that hold a workload charge against the assignee
    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Assigned | TicketStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        *self == TicketStatus::Resolved
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Registered => "Registered",
            TicketStatus::Assigned => "Assigned",
            TicketStatus::InProgress => "InProgress",
            TicketStatus::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    #[default]
    Update,
    Question,
    Resolution,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: AgentId,
    pub text: String,
    pub kind: ResponseKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    title: String,
    description: String,
    category: Category,
    priority: Priority,
    status: TicketStatus,
    assignee: Option<AgentId>,
    requester: Option<String>,
    responses: Vec<AgentResponse>,
    resolution_note: Option<String>,
    first_response_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<TicketEvent>,
}

impl Ticket {
    /// Register a new, unassigned ticket
    pub fn register(id: TicketId, category: Category, priority: Priority) -> Self {
        let now = Utc::now();
        let mut ticket = Self {
            id: id.clone(),
            title: String::new(),
            description: String::new(),
            category,
            priority,
            status: TicketStatus::Registered,
            assignee: None,
            requester: None,
            responses: vec![],
            resolution_note: None,
            first_response_at: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            events: vec![],
        };
        ticket.raise_event(TicketEvent::Created {
            ticket_id: id,
            category,
            priority,
            created_at: now,
        });
        ticket
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_requester(mut self, requester: Option<String>) -> Self {
        self.requester = requester;
        self
    }

    /// Backdate registration, for tickets carried over from another system
    pub fn registered_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> &TicketId { &self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn description(&self) -> &str { &self.description }
    pub fn category(&self) -> Category { self.category }
    pub fn priority(&self) -> Priority { self.priority }
    pub fn status(&self) -> TicketStatus { self.status }
    pub fn assignee(&self) -> Option<&AgentId> { self.assignee.as_ref() }
    pub fn requester(&self) -> Option<&str> { self.requester.as_deref() }
    pub fn responses(&self) -> &[AgentResponse] { &self.responses }
    pub fn resolution_note(&self) -> Option<&str> { self.resolution_note.as_deref() }
    pub fn first_response_at(&self) -> Option<DateTime<Utc>> { self.first_response_at }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn resolved_at(&self) -> Option<DateTime<Utc>> { self.resolved_at }
    pub fn is_open(&self) -> bool { self.status.is_open() }
    pub fn is_resolved(&self) -> bool { self.status.is_terminal() }

    pub fn estimated_resolution(&self) -> &'static str {
        self.priority.estimated_resolution()
    }

    /// Agent currently carrying this ticket in its workload
    pub fn charged_agent(&self) -> Option<&AgentId> {
        if self.status.is_open() {
            self.assignee.as_ref()
        } else {
            None
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Assign or reassign; returns the previous assignee
    pub fn assign(&mut self, agent_id: AgentId, kind: AssignmentKind) -> Result<Option<AgentId>, TransitionError> {
        if self.is_resolved() {
            return Err(TransitionError::AlreadyResolved);
        }
        if self.assignee.as_ref() == Some(&agent_id) {
            return Err(TransitionError::SameAssignee(agent_id));
        }

        let now = Utc::now();
        let previous = self.assignee.replace(agent_id.clone());
        self.status = TicketStatus::Assigned;
        self.touch(now);

        let event = match &previous {
            Some(from) => TicketEvent::Reassigned {
                ticket_id: self.id.clone(),
                from_agent: from.clone(),
                to_agent: agent_id,
                kind,
                reassigned_at: now,
            },
            None => TicketEvent::Assigned {
                ticket_id: self.id.clone(),
                agent_id,
                kind,
                assigned_at: now,
            },
        };
        self.raise_event(event);

        Ok(previous)
    }

    /// Record an agent response; returns true when it started work on the ticket
    pub fn record_response(&mut self, response: AgentResponse) -> Result<bool, TransitionError> {
        match self.status {
            TicketStatus::Resolved => return Err(TransitionError::AlreadyResolved),
            TicketStatus::Registered => return Err(TransitionError::NotAssigned),
            TicketStatus::Assigned | TicketStatus::InProgress => {}
        }

        let now = response.created_at;
        let agent_id = response.agent_id.clone();
        self.responses.push(response);
        self.touch(now);

        if self.first_response_at.is_none() {
            self.first_response_at = Some(now);
        }

        if self.status == TicketStatus::Assigned {
            self.status = TicketStatus::InProgress;
            self.raise_event(TicketEvent::Started {
                ticket_id: self.id.clone(),
                agent_id,
                started_at: now,
            });
            return Ok(true);
        }

        Ok(false)
    }

    /// Resolve the ticket; returns the agent whose workload is released
    pub fn resolve(&mut self, note: impl Into<String>) -> Result<AgentId, TransitionError> {
        self.resolve_at(note, Utc::now())
    }

    /// Resolve with an explicit resolution time
    pub fn resolve_at(&mut self, note: impl Into<String>, now: DateTime<Utc>) -> Result<AgentId, TransitionError> {
        let note = note.into();
        if self.is_resolved() {
            return Err(TransitionError::AlreadyResolved);
        }
        if note.trim().is_empty() {
            return Err(TransitionError::MissingResolutionNote);
        }
        let agent_id = match (&self.status, &self.assignee) {
            (status, Some(agent)) if status.is_open() => agent.clone(),
            _ => return Err(TransitionError::NotAssigned),
        };

        self.status = TicketStatus::Resolved;
        self.resolution_note = Some(note);
        self.resolved_at = Some(now);
        self.touch(now);

        self.raise_event(TicketEvent::Resolved {
            ticket_id: self.id.clone(),
            agent_id: agent_id.clone(),
            resolved_at: now,
        });

        Ok(agent_id)
    }

    /// Return an open ticket to the unassigned queue
    pub fn unassign(&mut self) -> Result<AgentId, TransitionError> {
        if self.is_resolved() {
            return Err(TransitionError::AlreadyResolved);
        }
        let agent_id = match self.assignee.take() {
            Some(agent) => agent,
            None => return Err(TransitionError::NotAssigned),
        };

        let now = Utc::now();
        self.status = TicketStatus::Registered;
        self.touch(now);

        self.raise_event(TicketEvent::Unassigned {
            ticket_id: self.id.clone(),
            from_agent: agent_id.clone(),
            unassigned_at: now,
        });

        Ok(agent_id)
    }

    pub fn take_events(&mut self) -> Vec<TicketEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, event: TicketEvent) {
        self.events.push(event);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Lifecycle guard violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("ticket is already resolved")]
    AlreadyResolved,

    #[error("ticket has no assignee")]
    NotAssigned,

    #[error("ticket is already assigned to {0}")]
    SameAssignee(AgentId),

    #[error("a resolution note is required")]
    MissingResolutionNote,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str) -> AgentId {
        AgentId::new(id).unwrap()
    }

    fn ticket() -> Ticket {
        Ticket::register(TicketId::generate("TKT"), Category::Technical, Priority::High)
    }

    fn response(id: &str) -> AgentResponse {
        AgentResponse {
            agent_id: agent(id),
            text: "Looking into it".into(),
            kind: ResponseKind::Update,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ticket_workflow() {
        let mut t = ticket();
        assert_eq!(t.status(), TicketStatus::Registered);
        assert!(t.charged_agent().is_none());

        assert_eq!(t.assign(agent("leena"), AssignmentKind::CapabilityMatch).unwrap(), None);
        assert_eq!(t.status(), TicketStatus::Assigned);
        assert_eq!(t.charged_agent(), Some(&agent("leena")));

        assert!(t.record_response(response("leena")).unwrap());
        assert_eq!(t.status(), TicketStatus::InProgress);
        assert!(!t.record_response(response("leena")).unwrap());
        assert_eq!(t.responses().len(), 2);

        assert_eq!(t.resolve("Restarted the router").unwrap(), agent("leena"));
        assert_eq!(t.status(), TicketStatus::Resolved);
        assert!(t.charged_agent().is_none());
        assert_eq!(t.resolution_note(), Some("Restarted the router"));
    }

    #[test]
    fn test_resolve_guards() {
        let mut t = ticket();
        assert_eq!(t.resolve("done"), Err(TransitionError::NotAssigned));

        t.assign(agent("leena"), AssignmentKind::CapabilityMatch).unwrap();
        assert_eq!(t.resolve("   "), Err(TransitionError::MissingResolutionNote));
        assert_eq!(t.status(), TicketStatus::Assigned);

        t.resolve("done").unwrap();
        assert_eq!(t.resolve("again"), Err(TransitionError::AlreadyResolved));
    }

    #[test]
    fn test_reassign_from_in_progress_returns_to_assigned() {
        let mut t = ticket();
        t.assign(agent("leena"), AssignmentKind::CapabilityMatch).unwrap();
        t.record_response(response("leena")).unwrap();

        let previous = t.assign(agent("lakshmi"), AssignmentKind::Forced).unwrap();
        assert_eq!(previous, Some(agent("leena")));
        assert_eq!(t.status(), TicketStatus::Assigned);
        assert_eq!(
            t.assign(agent("lakshmi"), AssignmentKind::Forced),
            Err(TransitionError::SameAssignee(agent("lakshmi")))
        );
    }

    #[test]
    fn test_response_guards() {
        let mut t = ticket();
        assert_eq!(t.record_response(response("leena")), Err(TransitionError::NotAssigned));
        assert!(t.first_response_at().is_none());
    }

    #[test]
    fn test_unassign() {
        let mut t = ticket();
        assert_eq!(t.unassign(), Err(TransitionError::NotAssigned));
        t.assign(agent("leena"), AssignmentKind::CapabilityMatch).unwrap();
        assert_eq!(t.unassign().unwrap(), agent("leena"));
        assert_eq!(t.status(), TicketStatus::Registered);
        assert!(t.assignee().is_none());
    }

    #[test]
    fn test_events_raised() {
        let mut t = ticket();
        t.assign(agent("leena"), AssignmentKind::CapabilityMatch).unwrap();
        t.assign(agent("lakshmi"), AssignmentKind::Forced).unwrap();
        t.resolve("fixed").unwrap();

        let types: Vec<_> = t.take_events().iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec!["ticket.created", "ticket.assigned", "ticket.reassigned", "ticket.resolved"]
        );
        assert!(t.take_events().is_empty());
    }
}

//! Audit Log records
//!
//! One entry per successful assignment or reassignment. Entries are
//! immutable once appended; storage lives behind `AuditRepository`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Actor, AgentId, AssignmentKind, TicketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(u64);

impl AuditEntryId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audit-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ticket_id: TicketId,
    pub previous_assignee: Option<AgentId>,
    pub new_assignee: AgentId,
    pub actor: Actor,
    pub kind: AssignmentKind,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry whose reason is prefixed with how the agent was chosen
    ///
    /// e.g. `"fallback assignment: ticket created"`
    pub fn assignment(
        ticket_id: TicketId,
        previous_assignee: Option<AgentId>,
        new_assignee: AgentId,
        actor: Actor,
        kind: AssignmentKind,
        reason: &str,
    ) -> Self {
        Self {
            ticket_id,
            previous_assignee,
            new_assignee,
            actor,
            kind,
            reason: format!("{}: {}", kind.label(), reason.trim()),
            recorded_at: Utc::now(),
        }
    }
}

/// Appended entry with its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditEntryId,
    #[serde(flatten)]
    pub entry: AuditEntry,
}

//! Agent entity
//!
//! `AgentProfile` is the immutable identity of an agent. Live state (active
//! flag and workload) is owned by the registry; `AgentSnapshot` is a
//! point-in-time copy of both, which is what routing decisions read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::value_objects::{AgentId, Capability};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    pub email: String,
    pub capabilities: BTreeSet<Capability>,
    /// Soft upper bound on open tickets; `None` means unbounded
    pub ceiling: Option<u32>,
}

impl AgentProfile {
    pub fn new(id: AgentId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            capabilities: BTreeSet::new(),
            ceiling: None,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    pub fn covers(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Point-in-time view of an agent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub profile: AgentProfile,
    pub active: bool,
    pub workload: u32,
}

impl AgentSnapshot {
    pub fn id(&self) -> &AgentId {
        &self.profile.id
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Workload strictly below the ceiling (or no ceiling at all)
    pub fn has_headroom(&self) -> bool {
        self.profile.ceiling.map_or(true, |ceiling| self.workload < ceiling)
    }

    /// Remaining slots before the ceiling, if one is set
    pub fn availability(&self) -> Option<u32> {
        self.profile.ceiling.map(|ceiling| ceiling.saturating_sub(self.workload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(workload: u32, ceiling: Option<u32>) -> AgentSnapshot {
        let mut profile = AgentProfile::new(AgentId::new("a1").unwrap(), "A One", "a1@support.test")
            .with_capability(Capability::Billing);
        profile.ceiling = ceiling;
        AgentSnapshot { profile, active: true, workload }
    }

    #[test]
    fn test_headroom() {
        assert!(snapshot(9, Some(10)).has_headroom());
        assert!(!snapshot(10, Some(10)).has_headroom());
        assert!(snapshot(500, None).has_headroom());
    }

    #[test]
    fn test_availability() {
        assert_eq!(snapshot(3, Some(10)).availability(), Some(7));
        assert_eq!(snapshot(12, Some(10)).availability(), Some(0));
        assert_eq!(snapshot(3, None).availability(), None);
    }

    #[test]
    fn test_covers() {
        let s = snapshot(0, None);
        assert!(s.profile.covers(Capability::Billing));
        assert!(!s.profile.covers(Capability::Escalation));
    }
}

//! Agent Registry
//!
//! Arena of agent records addressed by stable id. Profiles are immutable
//! once registered; the active flag and workload counter live in atomics on
//! each record so that routing reads and ledger writes for different agents
//! never contend on a shared lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::domain::{AgentId, AgentProfile, AgentSnapshot, Category};
use crate::error::{Result, RoutingError};
use crate::routing::CategoryMap;

/// Live agent record
#[derive(Debug)]
pub struct AgentRecord {
    profile: AgentProfile,
    active: AtomicBool,
    workload: AtomicU32,
}

impl AgentRecord {
    fn new(profile: AgentProfile, active: bool) -> Self {
        Self {
            profile,
            active: AtomicBool::new(active),
            workload: AtomicU32::new(0),
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn workload(&self) -> u32 {
        self.workload.load(Ordering::Acquire)
    }

    /// Counter cell; only the ledger writes through it
    pub(crate) fn workload_cell(&self) -> &AtomicU32 {
        &self.workload
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            profile: self.profile.clone(),
            active: self.is_active(),
            workload: self.workload(),
        }
    }
}

#[derive(Default)]
struct Arena {
    slots: Vec<Arc<AgentRecord>>,
    index: HashMap<AgentId, usize>,
}

/// Agent registry
#[derive(Default)]
pub struct AgentRegistry {
    arena: RwLock<Arena>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent; ids are unique for the process lifetime
    pub fn register(&self, profile: AgentProfile, active: bool) -> Result<()> {
        let mut arena = self.arena.write();
        if arena.index.contains_key(&profile.id) {
            return Err(RoutingError::DuplicateAgent(profile.id));
        }

        info!(agent = %profile.id, name = %profile.name, active, "agent registered");
        let slot = arena.slots.len();
        arena.index.insert(profile.id.clone(), slot);
        arena.slots.push(Arc::new(AgentRecord::new(profile, active)));
        Ok(())
    }

    pub fn record(&self, agent_id: &AgentId) -> Option<Arc<AgentRecord>> {
        let arena = self.arena.read();
        arena.index.get(agent_id).map(|&slot| Arc::clone(&arena.slots[slot]))
    }

    pub fn get(&self, agent_id: &AgentId) -> Result<AgentSnapshot> {
        self.record(agent_id)
            .map(|record| record.snapshot())
            .ok_or_else(|| RoutingError::AgentNotFound(agent_id.clone()))
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.arena.read().index.contains_key(agent_id)
    }

    /// Toggle routing eligibility; returns the previous value
    pub fn set_active(&self, agent_id: &AgentId, active: bool) -> Result<bool> {
        let record = self
            .record(agent_id)
            .ok_or_else(|| RoutingError::AgentNotFound(agent_id.clone()))?;
        let previous = record.active.swap(active, Ordering::AcqRel);
        if previous != active {
            info!(agent = %agent_id, active, "agent availability changed");
        }
        Ok(previous)
    }

    /// Active agents able to handle `category`, least loaded first
    pub fn list_capable(&self, category: Category, map: &CategoryMap) -> Vec<AgentSnapshot> {
        let snapshot = self.snapshot();
        let mut agents: Vec<AgentSnapshot> = map.capable(category, &snapshot).cloned().collect();
        agents.sort_by(|a, b| {
            a.workload
                .cmp(&b.workload)
                .then_with(|| a.name().cmp(b.name()))
                .then_with(|| a.id().cmp(b.id()))
        });
        agents
    }

    /// Every agent in registration order
    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.arena
            .read()
            .slots
            .iter()
            .map(|record| record.snapshot())
            .collect()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.arena
            .read()
            .slots
            .iter()
            .map(|record| record.profile.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Capability;

    fn profile(id: &str, name: &str, capability: Capability) -> AgentProfile {
        AgentProfile::new(AgentId::new(id).unwrap(), name, format!("{}@support.test", id))
            .with_capability(capability)
    }

    #[test]
    fn test_register_and_get() {
        let registry = AgentRegistry::new();
        registry.register(profile("leena", "G. Leena", Capability::Technical), true).unwrap();

        let agent = registry.get(&AgentId::new("leena").unwrap()).unwrap();
        assert_eq!(agent.name(), "G. Leena");
        assert!(agent.active);
        assert_eq!(agent.workload, 0);

        let missing = registry.get(&AgentId::new("ghost").unwrap());
        assert!(matches!(missing, Err(RoutingError::AgentNotFound(_))));
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = AgentRegistry::new();
        registry.register(profile("balu", "B. Balu", Capability::Billing), true).unwrap();
        let err = registry
            .register(profile("balu", "Another Balu", Capability::Billing), true)
            .unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateAgent(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_active() {
        let registry = AgentRegistry::new();
        let id = AgentId::new("rahul").unwrap();
        registry.register(profile("rahul", "K. Rahul", Capability::Service), true).unwrap();

        assert!(registry.set_active(&id, false).unwrap());
        assert!(!registry.get(&id).unwrap().active);
        assert!(registry.set_active(&AgentId::new("nobody").unwrap(), true).is_err());
    }

    #[test]
    fn test_list_capable_filters_and_orders() {
        let registry = AgentRegistry::new();
        registry.register(profile("b", "Bravo", Capability::Technical), true).unwrap();
        registry.register(profile("a", "Alpha", Capability::Technical), true).unwrap();
        registry.register(profile("c", "Charlie", Capability::Technical), false).unwrap();
        registry.register(profile("d", "Delta", Capability::Billing), true).unwrap();

        registry
            .record(&AgentId::new("a").unwrap())
            .unwrap()
            .workload_cell()
            .store(3, Ordering::Release);

        let capable = registry.list_capable(Category::Technical, &CategoryMap::default());
        let names: Vec<_> = capable.iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["Bravo", "Alpha"]);
    }
}

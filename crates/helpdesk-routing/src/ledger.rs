//! Workload Ledger
//!
//! Atomic per-agent open-ticket counters. Charges use compare-and-swap so
//! concurrent decisions targeting the same agent never lose an update and a
//! ceiling check cannot be raced past. Releases never drive a counter below
//! zero; an underflow is clamped and kept for operator attention.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::AgentId;
use crate::error::{Result, RoutingError};
use crate::registry::AgentRegistry;

/// Unit workload change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Charge,
    Release,
}

/// Outcome of a conditional charge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// Counter incremented to the contained value
    Charged(u32),
    /// Agent reached its ceiling since the routing snapshot
    AtCeiling,
    /// Agent was deactivated since the routing snapshot
    Inactive,
}

/// Release attempted against an agent whose counter was already zero
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerInconsistency {
    pub agent_id: AgentId,
    pub detected_at: DateTime<Utc>,
    pub context: String,
}

pub struct WorkloadLedger {
    registry: Arc<AgentRegistry>,
    inconsistencies: Mutex<Vec<LedgerInconsistency>>,
}

impl WorkloadLedger {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            inconsistencies: Mutex::new(Vec::new()),
        }
    }

    /// Apply an unconditional delta and return the new workload
    pub fn apply_delta(&self, agent_id: &AgentId, delta: Delta) -> Result<u32> {
        match delta {
            Delta::Charge => self.charge(agent_id),
            Delta::Release => self.release(agent_id),
        }
    }

    /// +1 regardless of ceiling or active flag
    pub fn charge(&self, agent_id: &AgentId) -> Result<u32> {
        let record = self
            .registry
            .record(agent_id)
            .ok_or_else(|| RoutingError::AgentNotFound(agent_id.clone()))?;
        let workload = record.workload_cell().fetch_add(1, Ordering::AcqRel) + 1;
        debug!(agent = %agent_id, workload, "workload charged");
        Ok(workload)
    }

    /// +1 only if the agent is active and, when requested, below its ceiling
    pub fn try_charge(&self, agent_id: &AgentId, respect_ceiling: bool) -> Result<ChargeOutcome> {
        let record = self
            .registry
            .record(agent_id)
            .ok_or_else(|| RoutingError::AgentNotFound(agent_id.clone()))?;
        if !record.is_active() {
            return Ok(ChargeOutcome::Inactive);
        }

        let ceiling = if respect_ceiling { record.profile().ceiling } else { None };
        let updated = record
            .workload_cell()
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match ceiling {
                Some(limit) if current >= limit => None,
                _ => Some(current + 1),
            });

        match updated {
            Ok(previous) => {
                debug!(agent = %agent_id, workload = previous + 1, "workload charged");
                Ok(ChargeOutcome::Charged(previous + 1))
            }
            Err(_) => Ok(ChargeOutcome::AtCeiling),
        }
    }

    /// -1, clamped at zero
    pub fn release(&self, agent_id: &AgentId) -> Result<u32> {
        Ok(self.try_release(agent_id)?.unwrap_or(0))
    }

    /// -1; `None` when the counter was already zero and the release was clamped
    pub(crate) fn try_release(&self, agent_id: &AgentId) -> Result<Option<u32>> {
        let record = self
            .registry
            .record(agent_id)
            .ok_or_else(|| RoutingError::AgentNotFound(agent_id.clone()))?;
        let updated = record
            .workload_cell()
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| current.checked_sub(1));

        match updated {
            Ok(previous) => {
                debug!(agent = %agent_id, workload = previous - 1, "workload released");
                Ok(Some(previous - 1))
            }
            Err(_) => {
                self.flag(agent_id, "release below zero clamped");
                Ok(None)
            }
        }
    }

    /// Overwrite a counter; used only by reconciliation repairs
    pub(crate) fn set(&self, agent_id: &AgentId, workload: u32) -> Result<u32> {
        let record = self
            .registry
            .record(agent_id)
            .ok_or_else(|| RoutingError::AgentNotFound(agent_id.clone()))?;
        Ok(record.workload_cell().swap(workload, Ordering::AcqRel))
    }

    pub fn workload(&self, agent_id: &AgentId) -> Result<u32> {
        self.registry
            .record(agent_id)
            .map(|record| record.workload())
            .ok_or_else(|| RoutingError::AgentNotFound(agent_id.clone()))
    }

    pub(crate) fn flag(&self, agent_id: &AgentId, context: impl Into<String>) {
        let context = context.into();
        warn!(agent = %agent_id, %context, "ledger inconsistency");
        self.inconsistencies.lock().push(LedgerInconsistency {
            agent_id: agent_id.clone(),
            detected_at: Utc::now(),
            context,
        });
    }

    pub fn inconsistencies(&self) -> Vec<LedgerInconsistency> {
        self.inconsistencies.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentProfile, Capability};

    fn ledger_with(id: &str, ceiling: Option<u32>) -> (WorkloadLedger, AgentId) {
        let registry = Arc::new(AgentRegistry::new());
        let agent_id = AgentId::new(id).unwrap();
        let mut profile = AgentProfile::new(agent_id.clone(), id, format!("{}@support.test", id))
            .with_capability(Capability::Technical);
        profile.ceiling = ceiling;
        registry.register(profile, true).unwrap();
        (WorkloadLedger::new(registry), agent_id)
    }

    #[test]
    fn test_apply_delta() {
        let (ledger, id) = ledger_with("leena", None);
        assert_eq!(ledger.apply_delta(&id, Delta::Charge).unwrap(), 1);
        assert_eq!(ledger.apply_delta(&id, Delta::Charge).unwrap(), 2);
        assert_eq!(ledger.apply_delta(&id, Delta::Release).unwrap(), 1);
        assert!(ledger.inconsistencies().is_empty());
    }

    #[test]
    fn test_release_below_zero_is_clamped_and_flagged() {
        let (ledger, id) = ledger_with("leena", None);
        assert_eq!(ledger.release(&id).unwrap(), 0);
        assert_eq!(ledger.workload(&id).unwrap(), 0);

        let flagged = ledger.inconsistencies();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].agent_id, id);
    }

    #[test]
    fn test_try_charge_respects_ceiling() {
        let (ledger, id) = ledger_with("balu", Some(1));
        assert_eq!(ledger.try_charge(&id, true).unwrap(), ChargeOutcome::Charged(1));
        assert_eq!(ledger.try_charge(&id, true).unwrap(), ChargeOutcome::AtCeiling);
        assert_eq!(ledger.try_charge(&id, false).unwrap(), ChargeOutcome::Charged(2));
    }

    #[test]
    fn test_try_charge_inactive() {
        let (ledger, id) = ledger_with("rahul", None);
        ledger.registry.set_active(&id, false).unwrap();
        assert_eq!(ledger.try_charge(&id, true).unwrap(), ChargeOutcome::Inactive);
        assert_eq!(ledger.workload(&id).unwrap(), 0);
    }

    #[test]
    fn test_unknown_agent() {
        let (ledger, _) = ledger_with("rahul", None);
        let ghost = AgentId::new("ghost").unwrap();
        assert!(matches!(ledger.charge(&ghost), Err(RoutingError::AgentNotFound(_))));
    }

    #[test]
    fn test_concurrent_charges_are_not_lost() {
        let (ledger, id) = ledger_with("lakshmi", None);
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        ledger.charge(&id).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.workload(&id).unwrap(), 2000);
    }
}

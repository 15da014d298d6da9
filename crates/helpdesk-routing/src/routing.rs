//! Routing Policy
//!
//! Pure selection over a registry snapshot. The fallback chain is:
//!
//! 1. agents holding a capability mapped to the category, with headroom
//! 2. agents holding the fallback capability, with headroom
//! 3. (when assignment is guaranteed) the least-loaded active agent overall
//!
//! Within a pool the least-loaded agent wins. Urgent and High tickets break
//! ties by name then id so identical state yields identical choices; Medium
//! and Low tickets break ties at random to spread routine work.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{AgentId, AgentSnapshot, AssignmentKind, Capability, Category, Priority};

/// Static category → capability mapping with a designated fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    routes: BTreeMap<Category, BTreeSet<Capability>>,
    fallback: Capability,
}

impl Default for CategoryMap {
    fn default() -> Self {
        let routes = [
            (Category::Technical, Capability::Technical),
            (Category::Billing, Capability::Billing),
            (Category::Service, Capability::Service),
            (Category::Product, Capability::Product),
            (Category::General, Capability::Escalation),
        ]
        .into_iter()
        .map(|(category, capability)| (category, BTreeSet::from([capability])))
        .collect();

        Self {
            routes,
            fallback: Capability::Escalation,
        }
    }
}

impl CategoryMap {
    pub fn new(fallback: Capability) -> Self {
        Self {
            routes: BTreeMap::new(),
            fallback,
        }
    }

    /// Replace the capability set for one category
    pub fn route(mut self, category: Category, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.routes.insert(category, capabilities.into_iter().collect());
        self
    }

    pub fn with_fallback(mut self, fallback: Capability) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback(&self) -> Capability {
        self.fallback
    }

    /// Capabilities qualified for `category`; unmapped categories use the fallback
    pub fn capabilities_for(&self, category: Category) -> BTreeSet<Capability> {
        match self.routes.get(&category) {
            Some(capabilities) if !capabilities.is_empty() => capabilities.clone(),
            _ => BTreeSet::from([self.fallback]),
        }
    }

    /// Active agents holding a capability qualified for `category`
    pub fn capable<'a>(
        &self,
        category: Category,
        agents: &'a [AgentSnapshot],
    ) -> impl Iterator<Item = &'a AgentSnapshot> {
        let capabilities = self.capabilities_for(category);
        agents
            .iter()
            .filter(move |agent| agent.active && capabilities.iter().any(|c| agent.profile.covers(*c)))
    }
}

/// Chosen agent and how it was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub agent_id: AgentId,
    pub kind: AssignmentKind,
}

#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    categories: CategoryMap,
    guarantee_assignment: bool,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self::new(CategoryMap::default(), true)
    }
}

impl RoutingPolicy {
    pub fn new(categories: CategoryMap, guarantee_assignment: bool) -> Self {
        Self {
            categories,
            guarantee_assignment,
        }
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn guarantees_assignment(&self) -> bool {
        self.guarantee_assignment
    }

    /// Select an agent for a ticket
    ///
    /// `exclude` removes one agent from every pool; reassignment uses it to
    /// route away from the current assignee.
    pub fn select<R: Rng + ?Sized>(
        &self,
        category: Category,
        priority: Priority,
        agents: &[AgentSnapshot],
        exclude: Option<&AgentId>,
        rng: &mut R,
    ) -> Option<RoutingDecision> {
        let eligible = |agent: &&AgentSnapshot| agent.active && Some(agent.id()) != exclude;

        let matched: Vec<&AgentSnapshot> = self
            .categories
            .capable(category, agents)
            .filter(eligible)
            .filter(|agent| agent.has_headroom())
            .collect();
        if let Some(agent) = pick(matched, priority, rng) {
            return Some(decision(agent, AssignmentKind::CapabilityMatch));
        }

        let fallback = self.categories.fallback();
        if !self.categories.capabilities_for(category).contains(&fallback) {
            let generalists: Vec<&AgentSnapshot> = agents
                .iter()
                .filter(eligible)
                .filter(|agent| agent.has_headroom())
                .filter(|agent| agent.profile.covers(fallback))
                .collect();
            if let Some(agent) = pick(generalists, priority, rng) {
                return Some(decision(agent, AssignmentKind::Fallback));
            }
        }

        if !self.guarantee_assignment {
            return None;
        }

        let anyone: Vec<&AgentSnapshot> = agents.iter().filter(eligible).collect();
        pick(anyone, priority, rng).map(|agent| decision(agent, AssignmentKind::EscapeValve))
    }
}

fn decision(agent: &AgentSnapshot, kind: AssignmentKind) -> RoutingDecision {
    RoutingDecision {
        agent_id: agent.id().clone(),
        kind,
    }
}

/// Least-loaded candidate with the priority-class tie-break
fn pick<'a, R: Rng + ?Sized>(
    pool: Vec<&'a AgentSnapshot>,
    priority: Priority,
    rng: &mut R,
) -> Option<&'a AgentSnapshot> {
    let lowest = pool.iter().map(|agent| agent.workload).min()?;
    let mut tied: Vec<&AgentSnapshot> = pool.into_iter().filter(|agent| agent.workload == lowest).collect();

    if priority.is_expedited() {
        tied.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
        tied.first().copied()
    } else {
        tied.choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentProfile;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn agent(id: &str, capability: Capability, workload: u32) -> AgentSnapshot {
        AgentSnapshot {
            profile: AgentProfile::new(AgentId::new(id).unwrap(), id.to_uppercase(), format!("{}@support.test", id))
                .with_capability(capability),
            active: true,
            workload,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_urgent_picks_least_loaded() {
        let agents = vec![agent("a", Capability::Technical, 2), agent("b", Capability::Technical, 1)];
        let policy = RoutingPolicy::default();

        let chosen = policy
            .select(Category::Technical, Priority::Urgent, &agents, None, &mut rng())
            .unwrap();
        assert_eq!(chosen.agent_id.as_str(), "b");
        assert_eq!(chosen.kind, AssignmentKind::CapabilityMatch);
    }

    #[test]
    fn test_urgent_tie_breaks_by_name() {
        let agents = vec![agent("b", Capability::Technical, 2), agent("a", Capability::Technical, 2)];
        let policy = RoutingPolicy::default();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let chosen = policy
                .select(Category::Technical, Priority::High, &agents, None, &mut rng)
                .unwrap();
            assert_eq!(chosen.agent_id.as_str(), "a");
        }
    }

    #[test]
    fn test_routine_tie_break_spreads() {
        let agents = vec![
            agent("a", Capability::Service, 0),
            agent("b", Capability::Service, 0),
            agent("c", Capability::Service, 0),
            agent("d", Capability::Service, 1),
        ];
        let policy = RoutingPolicy::default();
        let mut rng = rng();

        let chosen: HashSet<String> = (0..200)
            .map(|_| {
                policy
                    .select(Category::Service, Priority::Low, &agents, None, &mut rng)
                    .unwrap()
                    .agent_id
                    .to_string()
            })
            .collect();
        assert_eq!(chosen, HashSet::from(["a".to_string(), "b".to_string(), "c".to_string()]));
    }

    #[test]
    fn test_fallback_to_general() {
        let mut billing = agent("balu", Capability::Billing, 0);
        billing.active = false;
        let agents = vec![billing, agent("lakshmi", Capability::Escalation, 4)];

        let chosen = RoutingPolicy::default()
            .select(Category::Billing, Priority::Medium, &agents, None, &mut rng())
            .unwrap();
        assert_eq!(chosen.agent_id.as_str(), "lakshmi");
        assert_eq!(chosen.kind, AssignmentKind::Fallback);
    }

    #[test]
    fn test_ceiling_pushes_to_fallback() {
        let full = AgentSnapshot {
            profile: AgentProfile::new(AgentId::new("leena").unwrap(), "Leena", "l@support.test")
                .with_capability(Capability::Technical)
                .with_ceiling(2),
            active: true,
            workload: 2,
        };
        let agents = vec![full, agent("lakshmi", Capability::Escalation, 9)];

        let chosen = RoutingPolicy::default()
            .select(Category::Technical, Priority::Urgent, &agents, None, &mut rng())
            .unwrap();
        assert_eq!(chosen.kind, AssignmentKind::Fallback);
    }

    #[test]
    fn test_escape_valve_ignores_capability_and_ceiling() {
        let capped = AgentSnapshot {
            profile: AgentProfile::new(AgentId::new("charshima").unwrap(), "Charshima", "c@support.test")
                .with_capability(Capability::Product)
                .with_ceiling(1),
            active: true,
            workload: 5,
        };
        let agents = vec![capped, agent("rahul", Capability::Service, 7)];

        let chosen = RoutingPolicy::default()
            .select(Category::Billing, Priority::Urgent, &agents, None, &mut rng())
            .unwrap();
        assert_eq!(chosen.agent_id.as_str(), "charshima");
        assert_eq!(chosen.kind, AssignmentKind::EscapeValve);

        let strict = RoutingPolicy::new(CategoryMap::default(), false);
        assert!(strict
            .select(Category::Billing, Priority::Urgent, &agents, None, &mut rng())
            .is_none());
    }

    #[test]
    fn test_no_active_agents() {
        let mut only = agent("leena", Capability::Technical, 0);
        only.active = false;
        assert!(RoutingPolicy::default()
            .select(Category::Technical, Priority::Urgent, &[only], None, &mut rng())
            .is_none());
        assert!(RoutingPolicy::default()
            .select(Category::Technical, Priority::Urgent, &[], None, &mut rng())
            .is_none());
    }

    #[test]
    fn test_exclude_current_assignee() {
        let agents = vec![agent("a", Capability::Technical, 0), agent("b", Capability::Technical, 3)];
        let excluded = AgentId::new("a").unwrap();

        let chosen = RoutingPolicy::default()
            .select(Category::Technical, Priority::Urgent, &agents, Some(&excluded), &mut rng())
            .unwrap();
        assert_eq!(chosen.agent_id.as_str(), "b");
    }

    #[test]
    fn test_unmapped_category_uses_fallback_capability() {
        let map = CategoryMap::new(Capability::Escalation).route(Category::Technical, [Capability::Technical]);
        assert_eq!(
            map.capabilities_for(Category::Product),
            BTreeSet::from([Capability::Escalation])
        );

        let agents = vec![agent("lakshmi", Capability::Escalation, 0)];
        let chosen = RoutingPolicy::new(map, false)
            .select(Category::Product, Priority::Medium, &agents, None, &mut rng())
            .unwrap();
        assert_eq!(chosen.kind, AssignmentKind::CapabilityMatch);
    }

    #[test]
    fn test_capable_skips_inactive_and_unqualified() {
        let mut away = agent("c", Capability::Technical, 0);
        away.active = false;
        let agents = vec![
            agent("a", Capability::Technical, 4),
            agent("b", Capability::Billing, 0),
            away,
        ];

        let ids: Vec<&str> = CategoryMap::default()
            .capable(Category::Technical, &agents)
            .map(|a| a.id().as_str())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }
}

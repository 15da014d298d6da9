//! Domain services module

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{AgentSnapshot, Ticket, TicketStatus};
use crate::domain::value_objects::{AgentId, Capability, Category, Priority, TicketId};
use crate::domain::DomainError;

/// Days covered by the recent-activity histogram
pub const RECENT_ACTIVITY_DAYS: i64 = 7;

/// Ticket counters for the operator dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub open: usize,
    pub resolved: usize,
    pub unassigned: usize,
    /// Urgent and High tickets still open
    pub expedited_open: usize,
    pub open_by_priority: BTreeMap<Priority, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub by_status: BTreeMap<String, usize>,
}

/// One agent's load within a capability group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentLoad {
    pub agent_id: AgentId,
    pub name: String,
    pub workload: u32,
    pub open_tickets: usize,
}

/// One agent's ticket history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPerformance {
    pub agent_id: AgentId,
    pub total: usize,
    pub active: usize,
    pub resolved: usize,
    /// Mean hours from registration to resolution
    pub avg_resolution_hours: Option<f64>,
}

/// Dashboard counters plus history-based figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedAnalytics {
    pub summary: DashboardStats,
    pub agents: Vec<AgentPerformance>,
    /// Tickets registered per day, most recent days only
    pub recent_activity: BTreeMap<NaiveDate, usize>,
    pub avg_resolution_hours: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

/// Which tickets an export covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFilter {
    #[default]
    All,
    /// Everything not yet resolved, queued tickets included
    Active,
    Resolved,
}

impl ExportFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFilter::All => "all",
            ExportFilter::Active => "active",
            ExportFilter::Resolved => "resolved",
        }
    }

    fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            ExportFilter::All => true,
            ExportFilter::Active => !ticket.is_resolved(),
            ExportFilter::Resolved => ticket.is_resolved(),
        }
    }
}

impl FromStr for ExportFilter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ExportFilter::All),
            "active" => Ok(ExportFilter::Active),
            "resolved" => Ok(ExportFilter::Resolved),
            _ => Err(DomainError::UnknownExportFilter(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat ticket record for export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketExport {
    pub ticket_id: TicketId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub status: TicketStatus,
    pub assigned_to: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolution_note: Option<String>,
}

impl From<&Ticket> for TicketExport {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id().clone(),
            title: ticket.title().to_string(),
            description: ticket.description().to_string(),
            category: ticket.category(),
            priority: ticket.priority(),
            status: ticket.status(),
            assigned_to: ticket.assignee().cloned(),
            created_at: ticket.created_at(),
            updated_at: ticket.updated_at(),
            resolution_note: ticket.resolution_note().map(str::to_string),
        }
    }
}

/// Ticket statistics domain service
pub struct TicketStatsService;

impl TicketStatsService {
    pub fn dashboard(tickets: &[Ticket]) -> DashboardStats {
        let mut stats = DashboardStats {
            total: tickets.len(),
            ..Default::default()
        };

        for ticket in tickets {
            *stats.by_category.entry(ticket.category()).or_default() += 1;
            *stats.by_status.entry(ticket.status().to_string()).or_default() += 1;

            if ticket.is_resolved() {
                stats.resolved += 1;
                continue;
            }
            if ticket.assignee().is_none() {
                stats.unassigned += 1;
            }
            if ticket.is_open() {
                stats.open += 1;
                *stats.open_by_priority.entry(ticket.priority()).or_default() += 1;
                if ticket.priority().is_expedited() {
                    stats.expedited_open += 1;
                }
            }
        }

        stats
    }

    /// Active agents grouped by capability, least loaded first
    ///
    /// An agent holding several capabilities appears in each group.
    pub fn category_workload(agents: &[AgentSnapshot], tickets: &[Ticket]) -> BTreeMap<Capability, Vec<AgentLoad>> {
        let mut open_counts: HashMap<&AgentId, usize> = HashMap::new();
        for agent_id in tickets.iter().filter_map(|t| t.charged_agent()) {
            *open_counts.entry(agent_id).or_default() += 1;
        }

        let mut groups: BTreeMap<Capability, Vec<AgentLoad>> = BTreeMap::new();
        for agent in agents.iter().filter(|a| a.active) {
            for capability in &agent.profile.capabilities {
                groups.entry(*capability).or_default().push(AgentLoad {
                    agent_id: agent.id().clone(),
                    name: agent.name().to_string(),
                    workload: agent.workload,
                    open_tickets: open_counts.get(agent.id()).copied().unwrap_or(0),
                });
            }
        }

        for loads in groups.values_mut() {
            loads.sort_by(|a, b| a.workload.cmp(&b.workload).then_with(|| a.name.cmp(&b.name)));
        }
        groups
    }

    /// Per-agent totals, busiest first
    ///
    /// Resolved tickets keep their last assignee, so they count towards it.
    pub fn agent_performance(tickets: &[Ticket]) -> Vec<AgentPerformance> {
        let mut by_agent: BTreeMap<&AgentId, Vec<&Ticket>> = BTreeMap::new();
        for ticket in tickets {
            if let Some(agent_id) = ticket.assignee() {
                by_agent.entry(agent_id).or_default().push(ticket);
            }
        }

        let mut rows: Vec<AgentPerformance> = by_agent
            .into_iter()
            .map(|(agent_id, held)| AgentPerformance {
                agent_id: agent_id.clone(),
                total: held.len(),
                active: held.iter().filter(|t| !t.is_resolved()).count(),
                resolved: held.iter().filter(|t| t.is_resolved()).count(),
                avg_resolution_hours: mean_resolution_hours(held.iter().copied()),
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.agent_id.cmp(&b.agent_id)));
        rows
    }

    /// Mean registration-to-resolution time, in hours to two decimals
    pub fn avg_resolution_hours(tickets: &[Ticket]) -> Option<f64> {
        mean_resolution_hours(tickets.iter())
    }

    /// Tickets registered per day, from `days` days before `now` onwards
    pub fn recent_activity(tickets: &[Ticket], now: DateTime<Utc>, days: i64) -> BTreeMap<NaiveDate, usize> {
        let since = now.date_naive() - Duration::days(days);
        let mut activity = BTreeMap::new();
        for day in tickets.iter().map(|t| t.created_at().date_naive()).filter(|d| *d >= since) {
            *activity.entry(day).or_default() += 1;
        }
        activity
    }

    pub fn detailed(tickets: &[Ticket], now: DateTime<Utc>) -> DetailedAnalytics {
        DetailedAnalytics {
            summary: Self::dashboard(tickets),
            agents: Self::agent_performance(tickets),
            recent_activity: Self::recent_activity(tickets, now, RECENT_ACTIVITY_DAYS),
            avg_resolution_hours: Self::avg_resolution_hours(tickets),
            generated_at: now,
        }
    }

    /// Matching tickets, newest first
    ///
    /// Resolved exports order by last update, the others by registration.
    pub fn export(tickets: &[Ticket], filter: ExportFilter) -> Vec<TicketExport> {
        let mut rows: Vec<TicketExport> = tickets
            .iter()
            .filter(|t| filter.matches(t))
            .map(TicketExport::from)
            .collect();
        rows.sort_by(|a, b| {
            let (a_at, b_at) = match filter {
                ExportFilter::Resolved => (a.updated_at, b.updated_at),
                _ => (a.created_at, b.created_at),
            };
            b_at.cmp(&a_at).then_with(|| a.ticket_id.cmp(&b.ticket_id))
        });
        rows
    }

    /// Expected workload per agent: non-terminal tickets referencing it
    pub fn expected_workloads(tickets: &[Ticket]) -> HashMap<AgentId, u32> {
        let mut expected = HashMap::new();
        for agent_id in tickets.iter().filter_map(|t| t.charged_agent()) {
            *expected.entry(agent_id.clone()).or_insert(0u32) += 1;
        }
        expected
    }
}

fn mean_resolution_hours<'a>(tickets: impl Iterator<Item = &'a Ticket>) -> Option<f64> {
    let durations: Vec<f64> = tickets
        .filter_map(|t| t.resolved_at().map(|at| (at - t.created_at()).num_seconds() as f64 / 3600.0))
        .collect();
    if durations.is_empty() {
        return None;
    }
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

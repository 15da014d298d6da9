//! Simulate command
//!
//! Creates a burst of random tickets concurrently, resolves a share of
//! them, runs the auto-assignment sweep and checks every counter against
//! the ticket store. The resulting ticket history can be reported as
//! detailed analytics or exported.

use std::path::Path;

use colored::Colorize;
use helpdesk_routing::{
    Actor, AgentPerformance, Category, DetailedAnalytics, ExportFilter, NewTicket, Priority, TicketExport,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tabled::Tabled;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{engine, AgentRow};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct SimulationReport {
    seed: u64,
    created: usize,
    queued: usize,
    resolved: usize,
    swept: usize,
    still_unassigned: usize,
    consistent: bool,
    agents: Vec<AgentRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analytics: Option<DetailedAnalytics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    export: Option<Vec<TicketExport>>,
}

/// What to report besides the roster
#[derive(Debug, Clone, Copy, Default)]
pub struct Extras {
    pub analytics: bool,
    pub export: Option<ExportFilter>,
}

#[derive(Debug, Serialize, Tabled)]
struct PerformanceRow {
    agent: String,
    total: usize,
    active: usize,
    resolved: usize,
    avg_resolution_hours: String,
}

impl From<&AgentPerformance> for PerformanceRow {
    fn from(perf: &AgentPerformance) -> Self {
        Self {
            agent: perf.agent_id.to_string(),
            total: perf.total,
            active: perf.active,
            resolved: perf.resolved,
            avg_resolution_hours: hours(perf.avg_resolution_hours),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct ExportRow {
    ticket: String,
    category: Category,
    priority: Priority,
    status: &'static str,
    assigned_to: String,
    created_at: String,
    resolution_note: String,
}

impl From<&TicketExport> for ExportRow {
    fn from(ticket: &TicketExport) -> Self {
        Self {
            ticket: ticket.ticket_id.to_string(),
            category: ticket.category,
            priority: ticket.priority,
            status: ticket.status.as_str(),
            assigned_to: ticket.assigned_to.as_ref().map_or_else(|| "Unassigned".to_string(), |a| a.to_string()),
            created_at: ticket.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            resolution_note: ticket.resolution_note.clone().unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

fn hours(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |h| format!("{:.2}", h))
}

pub async fn handle(
    path: &Path,
    tickets: usize,
    seed: Option<u64>,
    extras: Extras,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let seed = seed.unwrap_or_else(rand::random);
    let engine = engine(path)?.seeded(seed);
    let mut rng = StdRng::seed_from_u64(seed);
    info!(tickets, seed, "starting simulation");

    let mut tasks = JoinSet::new();
    for _ in 0..tickets {
        let category = Category::ALL[rng.gen_range(0..Category::ALL.len())];
        let priority = Priority::ALL[rng.gen_range(0..Priority::ALL.len())];
        let engine = engine.clone();
        tasks.spawn(async move {
            engine
                .create_ticket_with_routing(NewTicket::new(category, priority).titled("simulated ticket", "generated by helpdesk simulate"))
                .await
        });
    }

    let mut created = Vec::with_capacity(tickets);
    while let Some(joined) = tasks.join_next().await {
        created.push(joined??);
    }
    let queued = created.iter().filter(|c| c.is_queued()).count();

    // resolve roughly a third of the assigned tickets
    let mut resolved = 0;
    for ticket in created.iter().filter(|c| !c.is_queued()) {
        if rng.gen_bool(1.0 / 3.0) {
            engine.resolve_ticket(&ticket.ticket_id, "simulated resolution").await?;
            resolved += 1;
        }
    }

    let sweep = engine.auto_assign_all_unassigned(Actor::System).await?;
    let reconcile = engine.reconcile_workloads(false).await?;
    if !reconcile.is_consistent() {
        warn!(drift = reconcile.drift.len(), "workload drift detected");
    }

    let report = SimulationReport {
        seed,
        created: created.len(),
        queued,
        resolved,
        swept: sweep.assigned,
        still_unassigned: sweep.still_unassigned.len(),
        consistent: reconcile.is_consistent(),
        agents: engine.agents().await.iter().map(AgentRow::from).collect(),
        analytics: if extras.analytics { Some(engine.detailed_analytics().await?) } else { None },
        export: match extras.export {
            Some(filter) => Some(engine.export(filter).await?),
            None => None,
        },
    };

    if !format.is_table() {
        return format.print(&report);
    }

    format.print_rows(&report.agents)?;
    println!(
        "seed {}: {} created ({} queued), {} resolved, {} swept, {} still unassigned",
        report.seed, report.created, report.queued, report.resolved, report.swept, report.still_unassigned
    );
    if report.consistent {
        println!("{}", "workloads consistent".green());
    } else {
        println!("{}", "workload drift detected".red());
    }

    if let Some(analytics) = &report.analytics {
        let rows: Vec<PerformanceRow> = analytics.agents.iter().map(PerformanceRow::from).collect();
        println!("\n{}", "Agent performance".bold());
        format.print_rows(&rows)?;
        println!("average resolution: {} hours", hours(analytics.avg_resolution_hours));
        for (day, count) in &analytics.recent_activity {
            println!("  {}  {}", day, count);
        }
    }

    if let (Some(filter), Some(export)) = (extras.export, &report.export) {
        let rows: Vec<ExportRow> = export.iter().map(ExportRow::from).collect();
        println!("\n{} {} ({} tickets)", "Export:".bold(), filter, rows.len());
        format.print_rows(&rows)?;
    }
    Ok(())
}

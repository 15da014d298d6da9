//! Route command

use std::path::Path;

use helpdesk_routing::{Category, Priority};
use serde::Serialize;
use tabled::Tabled;

use super::engine;
use crate::output::OutputFormat;

#[derive(Debug, Serialize, Tabled)]
struct RouteRow {
    category: Category,
    priority: Priority,
    agent: String,
    reason: &'static str,
}

pub async fn handle(path: &Path, category: Category, priority: Priority, format: OutputFormat) -> anyhow::Result<()> {
    let engine = engine(path)?;
    let decision = engine.select_agent(category, priority)?;
    format.print_rows(&[RouteRow {
        category,
        priority,
        agent: decision.agent_id.to_string(),
        reason: decision.kind.label(),
    }])
}

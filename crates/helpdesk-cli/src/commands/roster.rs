//! Roster command

use std::path::Path;

use super::{engine, AgentRow};
use crate::output::OutputFormat;

pub async fn handle(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let engine = engine(path)?;
    let rows: Vec<AgentRow> = engine.agents().await.iter().map(AgentRow::from).collect();
    format.print_rows(&rows)
}

//! CLI Commands

pub mod config;
pub mod roster;
pub mod route;
pub mod simulate;

use std::path::Path;

use helpdesk_routing::{AgentSnapshot, RoutingEngine};
use serde::Serialize;
use tabled::Tabled;

/// Build an in-memory engine from the configuration file
pub fn engine(path: &Path) -> anyhow::Result<RoutingEngine> {
    let config = crate::config::load(path)?;
    Ok(RoutingEngine::in_memory(&config)?)
}

/// One agent as shown by `roster` and `simulate`
#[derive(Debug, Serialize, Tabled)]
pub struct AgentRow {
    pub id: String,
    pub name: String,
    pub capabilities: String,
    pub workload: u32,
    pub ceiling: String,
    pub active: bool,
}

impl From<&AgentSnapshot> for AgentRow {
    fn from(agent: &AgentSnapshot) -> Self {
        let capabilities: Vec<&str> = agent.profile.capabilities.iter().map(|c| c.as_str()).collect();
        Self {
            id: agent.id().to_string(),
            name: agent.name().to_string(),
            capabilities: capabilities.join(","),
            workload: agent.workload,
            ceiling: agent.profile.ceiling.map_or_else(|| "-".to_string(), |c| c.to_string()),
            active: agent.active,
        }
    }
}

//! Engine configuration
//!
//! Loaded from TOML. Every section has defaults, so an empty file yields
//! the stock five-agent roster with the built-in category routes.
//!
//! ```toml
//! [routing]
//! guarantee_assignment = true
//! max_charge_attempts = 3
//!
//! [routing.category_routes]
//! general = ["escalation"]
//!
//! [[agents]]
//! id = "leena"
//! name = "G. Leena"
//! email = "leena@support.example.com"
//! capabilities = ["technical"]
//! ceiling = 10
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AgentId, AgentProfile, Capability, Category};
use crate::routing::{CategoryMap, RoutingPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub routing: RoutingSettings,
    pub tickets: TicketSettings,
    pub agents: Vec<AgentConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            routing: RoutingSettings::default(),
            tickets: TicketSettings::default(),
            agents: default_roster(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Use the escape valve when no capable agent has headroom
    pub guarantee_assignment: bool,
    /// Routing attempts before a charge ignores the ceiling
    pub max_charge_attempts: u32,
    /// Overrides for the built-in category routes, keyed by category label
    pub category_routes: BTreeMap<String, Vec<Capability>>,
    pub fallback_capability: Capability,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            guarantee_assignment: true,
            max_charge_attempts: 3,
            category_routes: BTreeMap::new(),
            fallback_capability: Capability::Escalation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketSettings {
    pub id_prefix: String,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self {
            id_prefix: "TKT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub email: String,
    pub capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceiling: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl AgentConfig {
    pub fn to_profile(&self) -> Result<AgentProfile, ConfigError> {
        let id = AgentId::new(self.id.as_str()).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let mut profile = AgentProfile::new(id, self.name.as_str(), self.email.as_str());
        profile.capabilities = self.capabilities.iter().copied().collect();
        profile.ceiling = self.ceiling;
        Ok(profile)
    }
}

fn default_active() -> bool {
    true
}

fn default_roster() -> Vec<AgentConfig> {
    let agent = |id: &str, name: &str, capability: Capability, ceiling: u32| AgentConfig {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@support.example.com", id),
        capabilities: vec![capability],
        ceiling: Some(ceiling),
        active: true,
    };

    vec![
        agent("leena", "G. Leena", Capability::Technical, 10),
        agent("balu", "B. Balu", Capability::Billing, 10),
        agent("rahul", "K. Rahul", Capability::Service, 10),
        agent("charshima", "R. Charshima", Capability::Product, 10),
        agent("lakshmi", "Lakshmi", Capability::Escalation, 15),
    ]
}

impl EngineConfig {
    /// Configuration with no agents
    pub fn empty() -> Self {
        Self {
            agents: Vec::new(),
            ..Default::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if it exists, otherwise the stock configuration
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml_string()?).map_err(io_err)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.max_charge_attempts == 0 {
            return Err(ConfigError::Invalid("max_charge_attempts must be at least 1".into()));
        }
        if self.tickets.id_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("ticket id prefix must not be empty".into()));
        }

        for category in self.routing.category_routes.keys() {
            category
                .parse::<Category>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            let profile = agent.to_profile()?;
            if !seen.insert(profile.id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate agent id: {}", profile.id)));
            }
            if profile.capabilities.is_empty() {
                return Err(ConfigError::Invalid(format!("agent {} has no capabilities", profile.id)));
            }
        }
        Ok(())
    }

    /// Built-in routes with the configured overrides applied
    ///
    /// Labels that do not name a category are skipped; `validate` rejects them.
    pub fn category_map(&self) -> CategoryMap {
        let mut map = CategoryMap::default().with_fallback(self.routing.fallback_capability);
        for (label, capabilities) in &self.routing.category_routes {
            if let Ok(category) = label.parse::<Category>() {
                map = map.route(category, capabilities.iter().copied());
            }
        }
        map
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy::new(self.category_map(), self.routing.guarantee_assignment)
    }

    pub fn agent_profiles(&self) -> Result<Vec<(AgentProfile, bool)>, ConfigError> {
        self.agents
            .iter()
            .map(|agent| agent.to_profile().map(|profile| (profile, agent.active)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster() {
        let config = EngineConfig::default();
        assert_eq!(config.agents.len(), 5);
        assert!(config.validate().is_ok());
        assert_eq!(config.routing.max_charge_attempts, 3);
        assert_eq!(config.tickets.id_prefix, "TKT");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_parse_agents_and_routes() {
        let config = EngineConfig::from_toml_str(
            r#"
            [routing]
            guarantee_assignment = false

            [routing.category_routes]
            Product = ["product", "technical"]

            [[agents]]
            id = "ana"
            name = "Ana"
            email = "ana@support.test"
            capabilities = ["product", "general"]
            "#,
        )
        .unwrap();

        assert!(!config.routing.guarantee_assignment);
        assert_eq!(config.agents.len(), 1);
        assert!(config.agents[0].active);
        assert_eq!(config.agents[0].ceiling, None);
        assert!(config.agents[0].capabilities.contains(&Capability::Escalation));

        let map = config.category_map();
        assert!(map.capabilities_for(Category::Product).contains(&Capability::Technical));
        assert!(!config.routing_policy().guarantees_assignment());
    }

    #[test]
    fn test_unknown_route_category_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [routing.category_routes]
            warranty = ["product"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_duplicate_agents_rejected() {
        let mut config = EngineConfig::default();
        config.agents.push(config.agents[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_agent_without_capabilities_rejected() {
        let mut config = EngineConfig::default();
        config.agents[1].capabilities.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helpdesk.toml");

        let config = EngineConfig::default();
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/nonexistent/helpdesk.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(EngineConfig::load_or_default("/nonexistent/helpdesk.toml").is_ok());
    }
}

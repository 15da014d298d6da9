//! Value Objects - Immutable domain primitives with validation
//!
//! Identifiers are validated on construction; classification enums are
//! parsed either strictly (`FromStr`) or leniently (`from_label`) for input
//! coming from the classification collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Agent identifier (Value Object)
///
/// # Invariants
/// - Must be non-empty
/// - Max 64 characters
/// - Alphanumeric with hyphens, underscores or dots only
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Create new agent ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::InvalidAgentId("cannot be empty".into()));
        }
        if id.len() > 64 {
            return Err(DomainError::InvalidAgentId("max 64 characters".into()));
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(DomainError::InvalidAgentId(format!("invalid characters in '{}'", id)));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

impl FromStr for AgentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket identifier (Value Object)
///
/// Generated as `<PREFIX>-XXXXXXXX` where the suffix is eight upper-case hex
/// digits taken from a v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    /// Generate a fresh ticket ID
    pub fn generate(prefix: &str) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", prefix, hex[..8].to_uppercase()))
    }

    /// Wrap an existing ticket ID (e.g. from a caller)
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidTicketId("cannot be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TicketId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket category as resolved by the classification collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    Technical,
    Billing,
    Service,
    Product,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Technical,
        Category::Billing,
        Category::Service,
        Category::Product,
        Category::General,
    ];

    /// Lenient parse: unrecognized labels fall back to `General`
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_else(|_| {
            tracing::debug!(label, "unrecognized category, using General");
            Category::General
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technical => "Technical",
            Category::Billing => "Billing",
            Category::Service => "Service",
            Category::Product => "Product",
            Category::General => "General",
        }
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(Category::Technical),
            "billing" => Ok(Category::Billing),
            "service" => Ok(Category::Service),
            "product" => Ok(Category::Product),
            "general" => Ok(Category::General),
            _ => Err(DomainError::UnknownCategory(s.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket priority, declared most- to least-urgent
///
/// The derived ordering therefore sorts `Urgent` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Urgent, Priority::High, Priority::Medium, Priority::Low];

    /// Lenient parse: unrecognized labels fall back to `Medium`
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_else(|_| {
            tracing::debug!(label, "unrecognized priority, using Medium");
            Priority::Medium
        })
    }

    /// Urgent and High tickets get the deterministic tie-break
    pub fn is_expedited(&self) -> bool {
        matches!(self, Priority::Urgent | Priority::High)
    }

    /// Customer-facing resolution estimate
    pub fn estimated_resolution(&self) -> &'static str {
        match self {
            Priority::Urgent => "2-4 hours",
            Priority::High => "1-2 days",
            Priority::Medium => "3-5 days",
            Priority::Low => "5-7 days",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urgent" => Ok(Priority::Urgent),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(DomainError::UnknownPriority(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tag carried by agents
///
/// `Escalation` is the general-support capability that can stand in for
/// any category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Technical,
    Billing,
    Service,
    Product,
    #[serde(alias = "general")]
    Escalation,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Technical => "technical",
            Capability::Billing => "billing",
            Capability::Service => "service",
            Capability::Product => "product",
            Capability::Escalation => "escalation",
        }
    }
}

impl FromStr for Capability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(Capability::Technical),
            "billing" => Ok(Capability::Billing),
            "service" => Ok(Capability::Service),
            "product" => Ok(Capability::Product),
            "escalation" | "general" => Ok(Capability::Escalation),
            _ => Err(DomainError::UnknownCapability(s.to_string())),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who triggered an assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Actor {
    System,
    Admin(String),
}

impl Actor {
    pub fn admin(id: impl Into<String>) -> Self {
        Actor::Admin(id.into())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Admin(id) => write!(f, "admin:{}", id),
        }
    }
}

/// How an assignee was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Agent holds a capability mapped to the ticket's category
    CapabilityMatch,
    /// No specialist had headroom; the fallback capability was used
    Fallback,
    /// Nobody qualified; least-loaded active agent overall
    EscapeValve,
    /// Target chosen explicitly by an administrator
    Forced,
}

impl AssignmentKind {
    /// Prefix recorded in audit reasons
    pub fn label(&self) -> &'static str {
        match self {
            AssignmentKind::CapabilityMatch => "capability match",
            AssignmentKind::Fallback => "fallback assignment",
            AssignmentKind::EscapeValve => "escape-valve assignment",
            AssignmentKind::Forced => "forced assignment",
        }
    }
}

impl fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_validation() {
        assert!(AgentId::new("leena").is_ok());
        assert!(AgentId::new("agent.one_2").is_ok());
        assert!(AgentId::new("").is_err());
        assert!(AgentId::new("has space").is_err());
        assert!(AgentId::new("x".repeat(65)).is_err());
    }

    #[test]
    fn test_ticket_id_format() {
        let id = TicketId::generate("TKT");
        let (prefix, suffix) = id.as_str().split_once('-').unwrap();
        assert_eq!(prefix, "TKT");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(id, TicketId::generate("TKT"));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("billing".parse::<Category>().unwrap(), Category::Billing);
        assert_eq!(" Technical ".parse::<Category>().unwrap(), Category::Technical);
        assert!("Pending".parse::<Category>().is_err());
        assert_eq!(Category::from_label("Pending"), Category::General);
    }

    #[test]
    fn test_priority_order_and_fallback() {
        assert!(Priority::Urgent < Priority::High);
        assert!(Priority::Medium < Priority::Low);
        assert!(Priority::High.is_expedited());
        assert!(!Priority::Low.is_expedited());
        assert_eq!(Priority::from_label("critical"), Priority::Medium);
        assert_eq!(Priority::Urgent.estimated_resolution(), "2-4 hours");
    }

    #[test]
    fn test_capability_aliases() {
        assert_eq!("general".parse::<Capability>().unwrap(), Capability::Escalation);
        assert_eq!("ESCALATION".parse::<Capability>().unwrap(), Capability::Escalation);
    }

    #[test]
    fn test_agent_id_serde_validates() {
        let ok: AgentId = serde_json::from_str("\"balu\"").unwrap();
        assert_eq!(ok.as_str(), "balu");
        assert!(serde_json::from_str::<AgentId>("\"\"").is_err());
    }
}

//! Helpdesk Routing Engine
//!
//! Routes incoming support tickets to agents and keeps every agent's
//! workload balanced, consistent and auditable as tickets are created,
//! reassigned and resolved.
//!
//! ## Architecture
//!
//! - **Domain Layer**: ticket lifecycle aggregate, agent profiles, value objects, events
//! - **Application Layer**: `RoutingEngine` and its units of work, DTOs
//! - **Ports Layer**: ticket store, audit log and event publisher interfaces
//! - **Infrastructure Layer**: in-memory port implementations
//!
//! ## Components
//!
//! - **Agent Registry**: arena of agent records with atomic live state
//! - **Routing Policy**: capability match, fallback, escape valve
//! - **Workload Ledger**: compare-and-swap open-ticket counters
//! - **Audit Log**: append-only assignment history
//!
//! ## Example
//!
//! ```rust,no_run
//! use helpdesk_routing::{EngineConfig, NewTicket, Category, Priority, RoutingEngine};
//!
//! # async fn run() -> helpdesk_routing::Result<()> {
//! let engine = RoutingEngine::in_memory(&EngineConfig::default())?;
//! let created = engine
//!     .create_ticket_with_routing(NewTicket::new(Category::Billing, Priority::High))
//!     .await?;
//! println!("{} -> {:?}", created.ticket_id, created.assignee);
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ledger;
pub mod ports;
pub mod registry;
pub mod routing;

// Re-exports for convenience
pub use application::{
    CreatedTicket, NewTicket, OffboardReport, ReassignOutcome, ReconcileReport, RecordResponse, ResolvedTicket,
    RoutingEngine, SweepReport, WorkloadDrift, WorkloadView,
};
pub use audit::{AuditEntry, AuditEntryId, AuditRecord};
pub use config::{AgentConfig, ConfigError, EngineConfig};
pub use domain::services::{
    AgentLoad, AgentPerformance, DashboardStats, DetailedAnalytics, ExportFilter, TicketExport, RECENT_ACTIVITY_DAYS,
};
pub use domain::{
    Actor, AgentId, AgentProfile, AgentSnapshot, AssignmentKind, Capability, Category, Priority, ResponseKind,
    Ticket, TicketEvent, TicketId, TicketStatus, TransitionError,
};
pub use error::{Result, RoutingError};
pub use ledger::LedgerInconsistency;
pub use ports::{AuditRepository, EventPublisher, RepositoryError, TicketRepository};
pub use routing::{CategoryMap, RoutingDecision, RoutingPolicy};

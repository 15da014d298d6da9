//! Aggregates
pub mod agent;
pub mod ticket;

pub use agent::{AgentProfile, AgentSnapshot};
pub use ticket::{AgentResponse, ResponseKind, Ticket, TicketStatus, TransitionError};

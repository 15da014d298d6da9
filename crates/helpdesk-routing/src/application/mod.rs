//! Application layer
//!
//! Orchestrates ticket use cases as units of work over the domain and ports.

pub mod dto;
pub mod engine;
mod unit_of_work;

pub use dto::*;
pub use engine::RoutingEngine;

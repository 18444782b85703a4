//! Ad-platform synchronization service.
//!
//! Hexagonal layout: `domain` holds the canonical model, ports, and the
//! orchestrator; `inbound` adapts HTTP onto the domain; `outbound` adapts
//! the domain onto PostgreSQL and the platform reporting APIs; `server`
//! wires them together.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

pub use middleware::Trace;

//! HTTP inbound adapter exposing REST endpoints.

pub mod auth;
pub mod state;
pub mod sync;

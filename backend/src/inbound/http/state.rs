//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on the domain service and remain testable without I/O.

use std::sync::Arc;

use crate::domain::sync_service::SyncService;
use crate::inbound::http::auth::AuthState;

/// Everything the HTTP handlers need: the sync orchestrator plus the
/// credential configuration checked before it runs.
pub struct HttpState {
    pub sync_service: Arc<SyncService>,
    pub auth: AuthState,
}

//! Domain model, ports, and orchestration for ad-platform synchronization.
//!
//! Purpose: keep the canonical entities, the port traits adapters implement,
//! and the sync orchestrator free of I/O so every invariant here is testable
//! with in-memory adapters.

pub mod model;
pub mod normalize;
pub mod ports;
pub mod sync_service;

pub use self::model::{
    AccessToken, AdAccount, AudienceDraft, AudienceKind, CampaignDraft, CampaignStatus,
    DailyMetricDraft, HourlyMetricDraft, KeywordDraft, KeywordMatchType, KeywordStatus, Platform,
    SyncResult, SyncStatus, SyncTrigger,
};
pub use self::sync_service::{SyncOutcome, SyncRequest, SyncService, SyncServiceConfig};

//! Domain ports defining the edges of the sync pipeline.
//!
//! Ports describe how the orchestrator expects to interact with driven
//! adapters (the metrics store, the credential store, and the four platform
//! reporting APIs). Each trait exposes strongly typed errors so adapters map
//! their failures into predictable variants instead of returning
//! `anyhow::Result`.

use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::model::{AccessToken, AdAccount, Platform, SyncResult, SyncTrigger};

/// Errors surfaced by the ad-account repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdAccountRepositoryError {
    /// Repository connection could not be established.
    #[error("ad account repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("ad account repository query failed: {message}")]
    Query { message: String },
}

impl AdAccountRepositoryError {
    /// Helper for connection oriented failures.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Helper for query failures.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the sync-log repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncLogRepositoryError {
    /// Repository connection could not be established.
    #[error("sync log repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("sync log repository query failed: {message}")]
    Query { message: String },
}

impl SyncLogRepositoryError {
    /// Helper for connection oriented failures.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Helper for query failures.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Errors surfaced when producing a decrypted platform credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessTokenError {
    /// No credential is stored for the account.
    #[error("no access token stored for ad account {ad_account_id}")]
    Missing { ad_account_id: Uuid },
    /// The stored blob could not be decrypted. Fatal for the whole sync;
    /// the message never contains key or token material.
    #[error("access token decryption failed: {message}")]
    Cipher { message: String },
    /// The credential store itself failed.
    #[error("access token lookup failed: {message}")]
    Storage { message: String },
}

impl AccessTokenError {
    /// Helper for a missing credential row.
    pub fn missing(ad_account_id: Uuid) -> Self {
        Self::Missing { ad_account_id }
    }

    /// Helper for decryption failures.
    pub fn cipher(message: impl Into<String>) -> Self {
        Self::Cipher {
            message: message.into(),
        }
    }

    /// Helper for storage failures.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Errors surfaced by platform adapters.
///
/// `Provider` messages have already been through the adapter's rewrite table
/// and truncation, so the orchestrator records them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformSyncError {
    /// The platform rejected the credential.
    #[error("platform rejected the access credential: {message}")]
    Auth { message: String },
    /// Connection-level failure reaching the platform.
    #[error("platform transport failure: {message}")]
    Transport { message: String },
    /// The bounded request timeout elapsed.
    #[error("platform request timed out: {message}")]
    Timeout { message: String },
    /// The platform answered with a payload we could not decode.
    #[error("platform response could not be decoded: {message}")]
    Decode { message: String },
    /// The platform reported an application-level error.
    #[error("{message}")]
    Provider { message: String },
}

impl PlatformSyncError {
    /// Helper for credential rejections.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Helper for transport failures.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Helper for timeouts.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Helper for decode failures.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Helper for provider-reported errors.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the metrics writer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncWriteError {
    /// Repository connection could not be established.
    #[error("metrics store connection failed: {message}")]
    Connection { message: String },
    /// A fatal write failed (campaign upsert or account stamp).
    #[error("metrics store write failed: {message}")]
    Write { message: String },
}

impl SyncWriteError {
    /// Helper for connection oriented failures.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Helper for write failures.
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }
}

/// Persistence port for connected ad accounts.
///
/// Read-only: the writer stamps `last_synced_at` itself as the final step
/// of its persistence pass.
#[async_trait]
pub trait AdAccountRepository: Send + Sync {
    /// Fetch an account by internal id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AdAccount>, AdAccountRepositoryError>;
}

/// Persistence port for the audit record of synchronization attempts.
///
/// Every invocation opens exactly one log; the orchestrator guarantees the
/// log reaches `completed` or `failed` before it returns.
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    /// Insert a new `in_progress` log and return its id.
    async fn open(
        &self,
        organization_id: Uuid,
        ad_account_id: Uuid,
        triggered_by: SyncTrigger,
    ) -> Result<Uuid, SyncLogRepositoryError>;

    /// Transition a log to `completed` and stamp `completed_at`.
    async fn mark_completed(&self, id: Uuid) -> Result<(), SyncLogRepositoryError>;

    /// Transition a log to `failed`, record the message, and stamp
    /// `completed_at`.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), SyncLogRepositoryError>;

    /// Mark this account's `in_progress` logs older than `older_than` as
    /// `failed`. Reconciles logs abandoned by a crashed or timed-out run.
    /// Returns the number of logs expired.
    async fn expire_stale(
        &self,
        ad_account_id: Uuid,
        older_than: Duration,
    ) -> Result<usize, SyncLogRepositoryError>;
}

/// Port producing a decrypted, ready-to-use platform credential.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Fetch and decrypt the stored credential for an account.
    async fn access_token(&self, ad_account_id: Uuid) -> Result<AccessToken, AccessTokenError>;
}

/// One platform's reporting API, normalized behind a single capability.
///
/// Implementations own pagination, provider enum mapping, money-unit
/// conversion, and the non-fatal wrapping of keyword/audience sub-fetches.
/// A returned error means the campaign or daily/hourly metric fetch failed
/// and the whole sync must fail.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform this adapter serves; used by the dispatch registry.
    fn platform(&self) -> Platform;

    /// Fetch and normalize everything for one account.
    async fn sync(
        &self,
        token: &AccessToken,
        external_account_id: &str,
        selected_child_id: Option<&str>,
    ) -> Result<SyncResult, PlatformSyncError>;
}

/// Summary returned by the writer after persisting one adapter result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncWriteSummary {
    /// Campaigns upserted in this run.
    pub campaigns_synced: usize,
    /// Keywords upserted in this run.
    pub keywords_synced: usize,
    /// Audiences upserted in this run.
    pub audiences_synced: usize,
}

/// Port persisting one adapter result idempotently.
#[async_trait]
pub trait SyncWriter: Send + Sync {
    /// Upsert entities and dated metrics, then stamp the account.
    async fn write(
        &self,
        account: &AdAccount,
        result: &SyncResult,
    ) -> Result<SyncWriteSummary, SyncWriteError>;
}

/// Port verifying a privileged service credential presented by a caller.
#[async_trait]
pub trait ServiceCredentialVerifier: Send + Sync {
    /// True when the bearer credential has privileged access. Any transport
    /// failure during verification counts as a rejection.
    async fn verify(&self, bearer: &str) -> bool;
}

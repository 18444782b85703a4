//! Orchestration service for one ad-account synchronization run.
//!
//! The service owns the invariant that every opened sync log reaches a
//! terminal state before `run` returns: any fatal error after the log insert
//! converges on [`SyncService::fail_sync`], which records the failure and
//! stamps completion exactly once. Transport-level success/failure is the
//! caller's concern; this service only ever reports outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{AdAccount, Platform, SyncTrigger};
use super::ports::{
    AccessTokenError, AccessTokenProvider, AdAccountRepository, PlatformAdapter, PlatformSyncError,
    SyncLogRepository, SyncWriteError, SyncWriteSummary, SyncWriter,
};

/// Failure messages recorded on a sync log are bounded so a provider cannot
/// flood the audit table with a megabyte of error body.
const MAX_FAILURE_MESSAGE_CHARS: usize = 500;

/// Default age after which an `in_progress` log is considered abandoned.
const DEFAULT_STALE_LOG_MINUTES: i64 = 30;

/// A request to synchronize one connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub ad_account_id: Uuid,
    pub triggered_by: SyncTrigger,
}

/// Terminal outcome of one invocation.
///
/// `Failed` carries the log id when the failure happened after the log was
/// opened; precondition failures (inactive account) report `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed {
        sync_log_id: Uuid,
        campaigns_synced: usize,
    },
    Failed {
        sync_log_id: Option<Uuid>,
        error: String,
    },
    AccountNotFound,
}

/// Fatal errors from the token/adapter/writer steps, unified so the
/// top-level catch can route them all through `fail_sync`.
#[derive(Debug, Error)]
enum SyncStepError {
    #[error(transparent)]
    Token(#[from] AccessTokenError),
    #[error(transparent)]
    Platform(#[from] PlatformSyncError),
    #[error(transparent)]
    Write(#[from] SyncWriteError),
    #[error("no adapter registered for platform {0}")]
    UnsupportedPlatform(Platform),
}

/// Tuning for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncServiceConfig {
    /// `in_progress` logs older than this are expired to `failed` before a
    /// new log is opened for the account.
    pub stale_log_cutoff: Duration,
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            stale_log_cutoff: Duration::minutes(DEFAULT_STALE_LOG_MINUTES),
        }
    }
}

/// The sync pipeline entry point.
///
/// Adapters are dispatched through a registry keyed on [`Platform`], so
/// supporting a fifth platform is one more registry entry, not another
/// branch.
pub struct SyncService {
    accounts: Arc<dyn AdAccountRepository>,
    sync_logs: Arc<dyn SyncLogRepository>,
    tokens: Arc<dyn AccessTokenProvider>,
    writer: Arc<dyn SyncWriter>,
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    config: SyncServiceConfig,
}

impl SyncService {
    pub fn new(
        accounts: Arc<dyn AdAccountRepository>,
        sync_logs: Arc<dyn SyncLogRepository>,
        tokens: Arc<dyn AccessTokenProvider>,
        writer: Arc<dyn SyncWriter>,
        adapters: impl IntoIterator<Item = Arc<dyn PlatformAdapter>>,
        config: SyncServiceConfig,
    ) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.platform(), adapter))
            .collect();
        Self {
            accounts,
            sync_logs,
            tokens,
            writer,
            adapters,
            config,
        }
    }

    /// Run one synchronization for `request.ad_account_id`.
    pub async fn run(&self, request: SyncRequest) -> SyncOutcome {
        let account = match self.accounts.find_by_id(request.ad_account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return SyncOutcome::AccountNotFound,
            Err(error) => {
                return SyncOutcome::Failed {
                    sync_log_id: None,
                    error: truncate_message(&error.to_string()),
                };
            }
        };

        if !account.is_active {
            return SyncOutcome::Failed {
                sync_log_id: None,
                error: format!("ad account {} is not active", account.id),
            };
        }

        // Reconcile logs abandoned by a crashed or timed-out earlier run.
        // Best effort: a failed sweep must not block a healthy sync.
        match self
            .sync_logs
            .expire_stale(account.id, self.config.stale_log_cutoff)
            .await
        {
            Ok(0) => {}
            Ok(expired) => {
                warn!(ad_account_id = %account.id, expired, "expired stale in_progress sync logs");
            }
            Err(error) => {
                warn!(ad_account_id = %account.id, %error, "stale sync log sweep failed");
            }
        }

        // No log, no sync: if the audit record cannot be opened the run
        // stops before touching any platform.
        let sync_log_id = match self
            .sync_logs
            .open(account.organization_id, account.id, request.triggered_by)
            .await
        {
            Ok(id) => id,
            Err(error) => {
                return SyncOutcome::Failed {
                    sync_log_id: None,
                    error: truncate_message(&error.to_string()),
                };
            }
        };

        info!(
            ad_account_id = %account.id,
            platform = %account.platform,
            sync_log_id = %sync_log_id,
            triggered_by = request.triggered_by.as_str(),
            "sync started"
        );

        match self.run_steps(&account).await {
            Ok(summary) => {
                if let Err(error) = self.sync_logs.mark_completed(sync_log_id).await {
                    return self
                        .fail_sync(sync_log_id, &format!("failed to finalize sync log: {error}"))
                        .await;
                }
                info!(
                    sync_log_id = %sync_log_id,
                    campaigns_synced = summary.campaigns_synced,
                    keywords_synced = summary.keywords_synced,
                    audiences_synced = summary.audiences_synced,
                    "sync completed"
                );
                SyncOutcome::Completed {
                    sync_log_id,
                    campaigns_synced: summary.campaigns_synced,
                }
            }
            Err(error) => self.fail_sync(sync_log_id, &error.to_string()).await,
        }
    }

    /// Token fetch, adapter dispatch, and write. Every `?` here is a fatal
    /// step the caller converts into a failed sync log.
    async fn run_steps(&self, account: &AdAccount) -> Result<SyncWriteSummary, SyncStepError> {
        let token = self.tokens.access_token(account.id).await?;

        let adapter = self
            .adapters
            .get(&account.platform)
            .ok_or(SyncStepError::UnsupportedPlatform(account.platform))?;

        let result = adapter
            .sync(
                &token,
                &account.external_account_id,
                account.selected_child_account_id.as_deref(),
            )
            .await?;

        Ok(self.writer.write(account, &result).await?)
    }

    /// Transition the log to `failed` and report the failure outcome.
    async fn fail_sync(&self, sync_log_id: Uuid, message: &str) -> SyncOutcome {
        let message = truncate_message(message);
        warn!(sync_log_id = %sync_log_id, error = %message, "sync failed");
        if let Err(error) = self.sync_logs.mark_failed(sync_log_id, &message).await {
            // The log may now be stuck in_progress; the stale sweep on the
            // next run for this account picks it up.
            warn!(sync_log_id = %sync_log_id, %error, "failed to record sync failure");
        }
        SyncOutcome::Failed {
            sync_log_id: Some(sync_log_id),
            error: message,
        }
    }
}

fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_FAILURE_MESSAGE_CHARS {
        message.to_owned()
    } else {
        let truncated: String = message.chars().take(MAX_FAILURE_MESSAGE_CHARS).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_kept_verbatim() {
        assert_eq!(truncate_message("boom"), "boom");
    }

    #[test]
    fn long_messages_are_truncated_with_ellipsis() {
        let long = "x".repeat(2 * MAX_FAILURE_MESSAGE_CHARS);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.chars().count(), MAX_FAILURE_MESSAGE_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }
}

//! Shared in-memory port implementations for behavioural tests.
//!
//! Each port keeps its state behind a `Mutex` so tests can assert on what
//! the orchestrator did without a database or network.

// Each test binary compiles this module separately and uses a different
// subset of it.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use backend::domain::model::{
    AccessToken, AdAccount, CampaignDraft, CampaignStatus, DailyMetricDraft, Platform, SyncResult,
    SyncStatus, SyncTrigger,
};
use backend::domain::ports::{
    AccessTokenError, AccessTokenProvider, AdAccountRepository, AdAccountRepositoryError,
    PlatformAdapter, PlatformSyncError, SyncLogRepository, SyncLogRepositoryError, SyncWriteError,
    SyncWriteSummary, SyncWriter,
};

pub fn sample_account(platform: Platform) -> AdAccount {
    AdAccount {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        platform,
        external_account_id: "1234567890".to_owned(),
        selected_child_account_id: None,
        is_active: true,
        last_synced_at: None,
    }
}

pub fn sample_result() -> SyncResult {
    let mut daily_metrics = BTreeMap::new();
    daily_metrics.insert(
        "c-1".to_owned(),
        vec![DailyMetricDraft {
            date: chrono::NaiveDate::from_ymd_opt(2026, 8, 1).expect("valid date"),
            spend: 12.5,
            impressions: 1000,
            clicks: 40,
            conversions: 3.0,
            revenue: 99.5,
        }],
    );
    SyncResult {
        campaigns: vec![CampaignDraft {
            external_id: "c-1".to_owned(),
            name: "Brand".to_owned(),
            status: CampaignStatus::Active,
            budget_limit: 100.0,
            budget_used: 40.0,
            currency: "USD".to_owned(),
        }],
        daily_metrics,
        ..SyncResult::default()
    }
}

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<HashMap<Uuid, AdAccount>>,
}

impl InMemoryAccounts {
    pub fn with(account: AdAccount) -> Arc<Self> {
        let store = Self::default();
        store
            .accounts
            .lock()
            .expect("accounts lock")
            .insert(account.id, account);
        Arc::new(store)
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl AdAccountRepository for InMemoryAccounts {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AdAccount>, AdAccountRepositoryError> {
        Ok(self
            .accounts
            .lock()
            .expect("accounts lock")
            .get(&id)
            .cloned())
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: Uuid,
    pub ad_account_id: Uuid,
    pub status: SyncStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryLogs {
    entries: Mutex<Vec<LogEntry>>,
}

impl InMemoryLogs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("logs lock").clone()
    }

    /// Seed an `in_progress` log started at the given instant.
    pub fn seed_in_progress(&self, ad_account_id: Uuid, started_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.entries.lock().expect("logs lock").push(LogEntry {
            id,
            ad_account_id,
            status: SyncStatus::InProgress,
            error: None,
            started_at,
        });
        id
    }
}

#[async_trait]
impl SyncLogRepository for InMemoryLogs {
    async fn open(
        &self,
        _organization_id: Uuid,
        ad_account_id: Uuid,
        _triggered_by: SyncTrigger,
    ) -> Result<Uuid, SyncLogRepositoryError> {
        let id = Uuid::new_v4();
        self.entries.lock().expect("logs lock").push(LogEntry {
            id,
            ad_account_id,
            status: SyncStatus::InProgress,
            error: None,
            started_at: Utc::now(),
        });
        Ok(id)
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), SyncLogRepositoryError> {
        for entry in self.entries.lock().expect("logs lock").iter_mut() {
            if entry.id == id {
                entry.status = SyncStatus::Completed;
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), SyncLogRepositoryError> {
        for entry in self.entries.lock().expect("logs lock").iter_mut() {
            if entry.id == id {
                entry.status = SyncStatus::Failed;
                entry.error = Some(error.to_owned());
            }
        }
        Ok(())
    }

    async fn expire_stale(
        &self,
        ad_account_id: Uuid,
        older_than: Duration,
    ) -> Result<usize, SyncLogRepositoryError> {
        let cutoff = Utc::now() - older_than;
        let mut expired = 0;
        for entry in self.entries.lock().expect("logs lock").iter_mut() {
            if entry.ad_account_id == ad_account_id
                && entry.status == SyncStatus::InProgress
                && entry.started_at < cutoff
            {
                entry.status = SyncStatus::Failed;
                entry.error = Some("sync did not finish; expired by a later run".to_owned());
                expired += 1;
            }
        }
        Ok(expired)
    }
}

/// Token provider with a fixed answer.
pub struct StaticTokens {
    token: Option<String>,
}

impl StaticTokens {
    pub fn valid() -> Arc<Self> {
        Arc::new(Self {
            token: Some("test-bearer".to_owned()),
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self { token: None })
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokens {
    async fn access_token(&self, ad_account_id: Uuid) -> Result<AccessToken, AccessTokenError> {
        self.token
            .as_deref()
            .map(AccessToken::new)
            .ok_or_else(|| AccessTokenError::missing(ad_account_id))
    }
}

type AdapterOutcome = dyn Fn() -> Result<SyncResult, PlatformSyncError> + Send + Sync;

/// Adapter whose outcome is decided by the test.
pub struct StubAdapter {
    platform: Platform,
    outcome: Box<AdapterOutcome>,
}

impl StubAdapter {
    pub fn succeeding(platform: Platform, result: SyncResult) -> Arc<Self> {
        Arc::new(Self {
            platform,
            outcome: Box::new(move || Ok(result.clone())),
        })
    }

    pub fn failing(platform: Platform, message: &str) -> Arc<Self> {
        let message = message.to_owned();
        Arc::new(Self {
            platform,
            outcome: Box::new(move || Err(PlatformSyncError::provider(message.clone()))),
        })
    }
}

#[async_trait]
impl PlatformAdapter for StubAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn sync(
        &self,
        _token: &AccessToken,
        _external_account_id: &str,
        _selected_child_id: Option<&str>,
    ) -> Result<SyncResult, PlatformSyncError> {
        (self.outcome)()
    }
}

/// Writer capturing everything it is asked to persist.
#[derive(Default)]
pub struct RecordingWriter {
    writes: Mutex<Vec<SyncResult>>,
}

impl RecordingWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> Vec<SyncResult> {
        self.writes.lock().expect("writer lock").clone()
    }
}

#[async_trait]
impl SyncWriter for RecordingWriter {
    async fn write(
        &self,
        _account: &AdAccount,
        result: &SyncResult,
    ) -> Result<SyncWriteSummary, SyncWriteError> {
        self.writes
            .lock()
            .expect("writer lock")
            .push(result.clone());
        Ok(SyncWriteSummary {
            campaigns_synced: result.campaigns.len(),
            keywords_synced: result.keywords.len(),
            audiences_synced: result.audiences.len(),
        })
    }
}

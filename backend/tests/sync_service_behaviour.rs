//! Behavioural tests for the sync orchestrator over in-memory ports.
//!
//! These cover the audit-trail invariant (every invocation that opens a log
//! leaves it terminal), precondition handling, and stale-log reconciliation.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use backend::domain::model::{Platform, SyncStatus, SyncTrigger};
use backend::domain::sync_service::{SyncOutcome, SyncRequest, SyncService, SyncServiceConfig};

use support::{
    InMemoryAccounts, InMemoryLogs, RecordingWriter, StaticTokens, StubAdapter, sample_account,
    sample_result,
};

struct Harness {
    service: SyncService,
    logs: Arc<InMemoryLogs>,
    writer: Arc<RecordingWriter>,
    account_id: Uuid,
}

impl Harness {
    fn request(&self) -> SyncRequest {
        SyncRequest {
            ad_account_id: self.account_id,
            triggered_by: SyncTrigger::Manual,
        }
    }
}

fn harness_with(
    accounts: Arc<InMemoryAccounts>,
    tokens: Arc<StaticTokens>,
    adapter: Arc<StubAdapter>,
    account_id: Uuid,
) -> Harness {
    let logs = InMemoryLogs::new();
    let writer = RecordingWriter::new();
    let service = SyncService::new(
        accounts,
        logs.clone(),
        tokens,
        writer.clone(),
        [adapter as Arc<dyn backend::domain::ports::PlatformAdapter>],
        SyncServiceConfig::default(),
    );
    Harness {
        service,
        logs,
        writer,
        account_id,
    }
}

fn healthy_harness() -> Harness {
    let account = sample_account(Platform::Google);
    let account_id = account.id;
    harness_with(
        InMemoryAccounts::with(account),
        StaticTokens::valid(),
        StubAdapter::succeeding(Platform::Google, sample_result()),
        account_id,
    )
}

#[tokio::test]
async fn successful_sync_completes_the_log_and_writes() {
    let harness = healthy_harness();

    let outcome = harness.service.run(harness.request()).await;

    let SyncOutcome::Completed {
        sync_log_id,
        campaigns_synced,
    } = outcome
    else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(campaigns_synced, 1);

    let entries = harness.logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, sync_log_id);
    assert_eq!(entries[0].status, SyncStatus::Completed);
    assert_eq!(harness.writer.writes().len(), 1);
}

#[tokio::test]
async fn repeated_runs_hand_the_writer_identical_results() {
    let harness = healthy_harness();

    let first = harness.service.run(harness.request()).await;
    let second = harness.service.run(harness.request()).await;

    assert!(matches!(first, SyncOutcome::Completed { .. }));
    assert!(matches!(second, SyncOutcome::Completed { .. }));

    // The upsert keys make the second write converge to the same rows: the
    // writer must have been handed byte-for-byte identical results.
    let writes = harness.writer.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], writes[1]);
}

#[tokio::test]
async fn adapter_failure_fails_the_log_and_skips_the_writer() {
    let account = sample_account(Platform::Meta);
    let account_id = account.id;
    let harness = harness_with(
        InMemoryAccounts::with(account),
        StaticTokens::valid(),
        StubAdapter::failing(Platform::Meta, "Meta Marketing API error: boom"),
        account_id,
    );

    let outcome = harness.service.run(harness.request()).await;

    let SyncOutcome::Failed { sync_log_id, error } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert!(error.contains("boom"));

    let entries = harness.logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, sync_log_id.expect("log was opened"));
    assert_eq!(entries[0].status, SyncStatus::Failed);
    assert!(entries[0].error.as_deref().expect("message recorded").contains("boom"));
    assert!(harness.writer.writes().is_empty());
}

#[tokio::test]
async fn missing_token_fails_the_log() {
    let account = sample_account(Platform::Google);
    let account_id = account.id;
    let harness = harness_with(
        InMemoryAccounts::with(account),
        StaticTokens::missing(),
        StubAdapter::succeeding(Platform::Google, sample_result()),
        account_id,
    );

    let outcome = harness.service.run(harness.request()).await;

    assert!(matches!(outcome, SyncOutcome::Failed { sync_log_id: Some(_), .. }));
    let entries = harness.logs.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, SyncStatus::Failed);
}

#[tokio::test]
async fn inactive_account_fails_without_opening_a_log() {
    let mut account = sample_account(Platform::Google);
    account.is_active = false;
    let account_id = account.id;
    let harness = harness_with(
        InMemoryAccounts::with(account),
        StaticTokens::valid(),
        StubAdapter::succeeding(Platform::Google, sample_result()),
        account_id,
    );

    let outcome = harness.service.run(harness.request()).await;

    assert!(matches!(outcome, SyncOutcome::Failed { sync_log_id: None, .. }));
    assert!(harness.logs.entries().is_empty());
}

#[tokio::test]
async fn unknown_account_reports_not_found() {
    let harness = harness_with(
        InMemoryAccounts::empty(),
        StaticTokens::valid(),
        StubAdapter::succeeding(Platform::Google, sample_result()),
        Uuid::new_v4(),
    );

    let outcome = harness.service.run(harness.request()).await;

    assert_eq!(outcome, SyncOutcome::AccountNotFound);
    assert!(harness.logs.entries().is_empty());
}

#[tokio::test]
async fn stale_in_progress_logs_are_expired_before_a_new_run() {
    let harness = healthy_harness();
    let stale_id = harness
        .logs
        .seed_in_progress(harness.account_id, Utc::now() - Duration::hours(2));
    let fresh_id = harness
        .logs
        .seed_in_progress(harness.account_id, Utc::now());

    let outcome = harness.service.run(harness.request()).await;
    assert!(matches!(outcome, SyncOutcome::Completed { .. }));

    let entries = harness.logs.entries();
    let stale = entries.iter().find(|e| e.id == stale_id).expect("stale log");
    assert_eq!(stale.status, SyncStatus::Failed);

    // A recent in_progress log is someone else's live run; leave it alone.
    let fresh = entries.iter().find(|e| e.id == fresh_id).expect("fresh log");
    assert_eq!(fresh.status, SyncStatus::InProgress);
}

#[tokio::test]
async fn failure_messages_are_truncated_to_a_bounded_length() {
    let account = sample_account(Platform::Google);
    let account_id = account.id;
    let long_message = "x".repeat(2000);
    let harness = harness_with(
        InMemoryAccounts::with(account),
        StaticTokens::valid(),
        StubAdapter::failing(Platform::Google, &long_message),
        account_id,
    );

    let outcome = harness.service.run(harness.request()).await;

    let SyncOutcome::Failed { error, .. } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert!(error.ends_with("..."));
    assert!(error.chars().count() < 600, "got {} chars", error.chars().count());

    let entries = harness.logs.entries();
    assert_eq!(
        entries[0].error.as_deref().expect("message recorded"),
        error
    );
}

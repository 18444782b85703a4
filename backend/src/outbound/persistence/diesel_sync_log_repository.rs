//! PostgreSQL-backed `SyncLogRepository` implementation using Diesel ORM.
//!
//! Logs are insert-then-update: one `in_progress` row per invocation,
//! transitioned to a terminal state exactly once. `expire_stale` reconciles
//! rows abandoned by a crashed run before a new log is opened for the same
//! account.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::model::{SyncStatus, SyncTrigger};
use crate::domain::ports::{SyncLogRepository, SyncLogRepositoryError};

use super::models::NewSyncLogRow;
use super::pool::{DbPool, PoolError};
use super::schema::sync_logs;

/// Message recorded on logs that were reconciled rather than finished.
const STALE_LOG_MESSAGE: &str = "sync did not finish; expired by a later run";

/// Diesel-backed implementation of the `SyncLogRepository` port.
#[derive(Clone)]
pub struct DieselSyncLogRepository {
    pool: DbPool,
}

impl DieselSyncLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SyncLogRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            SyncLogRepositoryError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> SyncLogRepositoryError {
    debug!(%error, "sync log operation failed");
    match error {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ClosedConnection,
            _,
        ) => SyncLogRepositoryError::connection("database connection error"),
        _ => SyncLogRepositoryError::query("database error"),
    }
}

#[async_trait]
impl SyncLogRepository for DieselSyncLogRepository {
    async fn open(
        &self,
        organization_id: Uuid,
        ad_account_id: Uuid,
        triggered_by: SyncTrigger,
    ) -> Result<Uuid, SyncLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_log = NewSyncLogRow {
            organization_id,
            ad_account_id,
            status: SyncStatus::InProgress.as_str(),
            triggered_by: triggered_by.as_str(),
        };

        diesel::insert_into(sync_logs::table)
            .values(&new_log)
            .returning(sync_logs::id)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), SyncLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(sync_logs::table.filter(sync_logs::id.eq(id)))
            .set((
                sync_logs::status.eq(SyncStatus::Completed.as_str()),
                sync_logs::completed_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), SyncLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(sync_logs::table.filter(sync_logs::id.eq(id)))
            .set((
                sync_logs::status.eq(SyncStatus::Failed.as_str()),
                sync_logs::error_message.eq(Some(error)),
                sync_logs::completed_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn expire_stale(
        &self,
        ad_account_id: Uuid,
        older_than: Duration,
    ) -> Result<usize, SyncLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let cutoff = Utc::now() - older_than;
        let expired = diesel::update(
            sync_logs::table.filter(
                sync_logs::ad_account_id
                    .eq(ad_account_id)
                    .and(sync_logs::status.eq(SyncStatus::InProgress.as_str()))
                    .and(sync_logs::started_at.lt(cutoff)),
            ),
        )
        .set((
            sync_logs::status.eq(SyncStatus::Failed.as_str()),
            sync_logs::error_message.eq(Some(STALE_LOG_MESSAGE)),
            sync_logs::completed_at.eq(Some(Utc::now())),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if expired > 0 {
            debug!(expired, %ad_account_id, "expired stale in_progress sync logs");
        }
        Ok(expired)
    }
}

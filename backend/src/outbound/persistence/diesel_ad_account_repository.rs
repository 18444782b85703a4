//! PostgreSQL-backed `AdAccountRepository` implementation using Diesel ORM.

use std::str::FromStr;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::model::{AdAccount, Platform};
use crate::domain::ports::{AdAccountRepository, AdAccountRepositoryError};

use super::models::AdAccountRow;
use super::pool::{DbPool, PoolError};
use super::schema::ad_accounts;

/// Diesel-backed implementation of the `AdAccountRepository` port.
#[derive(Clone)]
pub struct DieselAdAccountRepository {
    pool: DbPool,
}

impl DieselAdAccountRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> AdAccountRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            AdAccountRepositoryError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> AdAccountRepositoryError {
    debug!(%error, "ad account query failed");
    match error {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ClosedConnection,
            _,
        ) => AdAccountRepositoryError::connection("database connection error"),
        _ => AdAccountRepositoryError::query("database error"),
    }
}

/// Convert a database row to a domain `AdAccount`.
fn row_to_account(row: AdAccountRow) -> Result<AdAccount, AdAccountRepositoryError> {
    let platform = Platform::from_str(&row.platform).map_err(|err| {
        AdAccountRepositoryError::query(format!("invalid platform in database: {err}"))
    })?;
    Ok(AdAccount {
        id: row.id,
        organization_id: row.organization_id,
        platform,
        external_account_id: row.external_account_id,
        selected_child_account_id: row.selected_child_account_id,
        is_active: row.is_active,
        last_synced_at: row.last_synced_at,
    })
}

#[async_trait]
impl AdAccountRepository for DieselAdAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AdAccount>, AdAccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<AdAccountRow> = ad_accounts::table
            .filter(ad_accounts::id.eq(id))
            .select(AdAccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_account).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let repo_err = map_pool_error(PoolError::checkout("connection refused"));

        assert!(matches!(
            repo_err,
            AdAccountRepositoryError::Connection { .. }
        ));
        assert!(repo_err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn unknown_platform_is_a_query_error() {
        let row = AdAccountRow {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            platform: "myspace".to_owned(),
            external_account_id: "1".to_owned(),
            selected_child_account_id: None,
            is_active: true,
            last_synced_at: None,
        };
        let err = row_to_account(row).expect_err("unknown platform must not load");
        assert!(matches!(err, AdAccountRepositoryError::Query { .. }));
    }
}

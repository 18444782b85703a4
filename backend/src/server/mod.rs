//! Server construction and wiring.
//!
//! Builds every outbound adapter, assembles the domain service, and runs
//! the actix-web server. Migrations run at startup over an
//! `AsyncConnectionWrapper`, so no blocking libpq connection is needed.

mod config;

pub use config::{AppConfig, ConfigError};

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::domain::sync_service::{SyncService, SyncServiceConfig};
use crate::inbound::http::auth::AuthState;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::sync;
use crate::middleware::Trace;
use crate::outbound::persistence::{
    DbPool, DieselAdAccountRepository, DieselSyncLogRepository, DieselSyncWriter, PoolConfig,
    PoolError,
};
use crate::outbound::platforms::verifier::IntrospectionVerifier;
use crate::outbound::platforms::{PlatformEndpoints, build_adapters};
use crate::outbound::tokens::{CipherError, DieselTokenProvider, TokenCipher};

/// Embedded migrations, applied at startup.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Errors raised while bootstrapping the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("token encryption key rejected: {0}")]
    Cipher(#[from] CipherError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Run pending migrations against a fresh connection.
///
/// # Errors
///
/// Returns `ServerError::Migration` when the connection or any migration
/// fails.
pub async fn run_migrations(database_url: &str) -> Result<(), ServerError> {
    let conn = AsyncPgConnection::establish(database_url)
        .await
        .map_err(|err| ServerError::Migration(format!("connection failed: {err}")))?;
    let mut conn: AsyncConnectionWrapper<AsyncPgConnection> = AsyncConnectionWrapper::from(conn);

    tokio::task::spawn_blocking(move || {
        conn.run_pending_migrations(MIGRATIONS)
            .map(|applied| {
                if !applied.is_empty() {
                    info!(count = applied.len(), "applied pending migrations");
                }
            })
            .map_err(|err| ServerError::Migration(err.to_string()))
    })
    .await
    .map_err(|err| ServerError::Migration(format!("migration task panicked: {err}")))?
}

/// Assemble the sync service and serve the HTTP surface until shutdown.
///
/// # Errors
///
/// Returns an error when any adapter cannot be constructed or the listener
/// cannot bind.
pub async fn run(config: AppConfig) -> Result<(), ServerError> {
    run_migrations(&config.database_url).await?;
    let pool = DbPool::new(PoolConfig::new(&config.database_url)).await?;
    let cipher = TokenCipher::from_hex_key(&config.token_encryption_key)?;

    let adapters = build_adapters(PlatformEndpoints {
        google_base: config.google_api_base.clone(),
        google_developer_token: config.google_developer_token.clone(),
        meta_base: config.meta_api_base.clone(),
        tiktok_base: config.tiktok_api_base.clone(),
        pinterest_base: config.pinterest_api_base.clone(),
    })?;
    let verifier = Arc::new(IntrospectionVerifier::new(config.introspect_url.clone())?);

    let sync_service = Arc::new(SyncService::new(
        Arc::new(DieselAdAccountRepository::new(pool.clone())),
        Arc::new(DieselSyncLogRepository::new(pool.clone())),
        Arc::new(DieselTokenProvider::new(pool.clone(), cipher)),
        Arc::new(DieselSyncWriter::new(pool)),
        adapters,
        SyncServiceConfig {
            stale_log_cutoff: chrono::Duration::minutes(config.stale_log_minutes),
        },
    ));

    let state = web::Data::new(HttpState {
        sync_service,
        auth: AuthState {
            shared_secret: config.sync_shared_secret.clone(),
            verifier,
        },
    });

    info!(addr = %config.bind_addr, "starting ad-platform sync server");
    HttpServer::new(move || {
        App::new()
            .wrap(Trace)
            .app_data(state.clone())
            .configure(sync::configure)
    })
    .bind(config.bind_addr)?
    .run()
    .await?;
    Ok(())
}

//! PostgreSQL-backed `AccessTokenProvider`: loads the encrypted credential
//! row and decrypts it on demand. Tokens are never cached; a sync run is
//! infrequent enough that a fresh decrypt per run is the simpler invariant.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::model::AccessToken;
use crate::domain::ports::{AccessTokenError, AccessTokenProvider};

use super::cipher::{CipherError, TokenCipher};
use crate::outbound::persistence::pool::{DbPool, PoolError};
use crate::outbound::persistence::schema::ad_account_credentials;

/// Decrypting credential provider over the credentials table.
pub struct DieselTokenProvider {
    pool: DbPool,
    cipher: TokenCipher,
}

impl DieselTokenProvider {
    /// Create a provider with the given pool and token cipher.
    pub fn new(pool: DbPool, cipher: TokenCipher) -> Self {
        Self { pool, cipher }
    }
}

fn map_pool_error(error: PoolError) -> AccessTokenError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            AccessTokenError::storage(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> AccessTokenError {
    debug!(%error, "credential lookup failed");
    AccessTokenError::storage("database error")
}

fn map_cipher_error(error: &CipherError) -> AccessTokenError {
    AccessTokenError::cipher(error.to_string())
}

#[async_trait]
impl AccessTokenProvider for DieselTokenProvider {
    async fn access_token(&self, ad_account_id: Uuid) -> Result<AccessToken, AccessTokenError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let blob: Option<String> = ad_account_credentials::table
            .filter(ad_account_credentials::ad_account_id.eq(ad_account_id))
            .select(ad_account_credentials::encrypted_access_token)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        let blob = blob.ok_or_else(|| AccessTokenError::missing(ad_account_id))?;
        self.cipher
            .decrypt(&blob)
            .map_err(|error| map_cipher_error(&error))
    }
}

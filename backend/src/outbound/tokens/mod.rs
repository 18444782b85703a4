//! Credential storage and decryption for platform access tokens.

mod cipher;
mod diesel_token_provider;

pub use cipher::{CipherError, TokenCipher};
pub use diesel_token_provider::DieselTokenProvider;
